/// Dispatcher lifecycle for one batch call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Validating matrices, date range and formulas
    Idle,
    /// Stock range split into partitions
    Partitioned,
    /// One kernel task submitted per partition
    Dispatched,
    /// Collecting partition results as they complete
    Merging,
    /// Top-K per end date
    Selecting,
    Done,
}

impl DispatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchState::Idle => "IDLE",
            DispatchState::Partitioned => "PARTITIONED",
            DispatchState::Dispatched => "DISPATCHED",
            DispatchState::Merging => "MERGING",
            DispatchState::Selecting => "SELECTING",
            DispatchState::Done => "DONE",
        }
    }
}

impl std::fmt::Display for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
