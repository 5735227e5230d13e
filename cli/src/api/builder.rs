//! Builder pattern for configuring window-scan runs

use crate::api::analyzer::WindowAnalyzer;
use crate::models::{
    EngineParams, ExitRule, NewExtremeParams, SelectionConfig, SelectionMode, StartOption,
    WindowParameters,
};

/// Builder for [`EngineParams`]
///
/// Provides a fluent interface for setting up a batch.
///
/// # Example
/// ```rust
/// use windowscan::api::EngineParamsBuilder;
/// use windowscan::models::{SelectionMode, StartOption};
///
/// let params = EngineParamsBuilder::new()
///     .with_width(20)
///     .with_start_option(StartOption::MaxValue)
///     .with_formula("if continuous_sum > 0: result = continuous_sum else: result = 0")
///     .with_selection(10, SelectionMode::Max)
///     .with_n_proc(4)
///     .build();
/// assert_eq!(params.window.width, 20);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EngineParamsBuilder {
    params: EngineParams,
}

impl EngineParamsBuilder {
    /// Create a builder with default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing parameter bundle
    pub fn from_params(params: EngineParams) -> Self {
        Self { params }
    }

    /// Replace the whole window configuration
    pub fn with_window(mut self, window: WindowParameters) -> Self {
        self.params.window = window;
        self
    }

    /// Set the window width in trailing days
    pub fn with_width(mut self, width: usize) -> Self {
        self.params.window.width = width;
        self
    }

    pub fn with_start_option(mut self, option: StartOption) -> Self {
        self.params.window.start_option = option;
        self
    }

    pub fn with_shift_days(mut self, shift_days: i64) -> Self {
        self.params.window.shift_days = shift_days;
        self
    }

    /// Enable forward-max / forward-min sequences
    pub fn with_forward(mut self, is_forward: bool) -> Self {
        self.params.window.is_forward = is_forward;
        self
    }

    /// Enable the forward N-day max from the window start
    pub fn with_n_days(mut self, n_days: usize) -> Self {
        self.params.window.n_days = n_days;
        self
    }

    pub fn with_take_profit(mut self, rule: ExitRule) -> Self {
        self.params.take_profit = rule;
        self
    }

    /// Stop-loss rule; positive rates are clamped to 0 at preflight
    pub fn with_stop_loss(mut self, rule: ExitRule) -> Self {
        self.params.stop_loss = rule;
        self
    }

    /// Configure new-extreme set 1 or 2
    pub fn with_new_extreme(mut self, set: usize, params: NewExtremeParams) -> Self {
        if let Some(slot) = set.checked_sub(1).and_then(|i| self.params.new_extreme.get_mut(i)) {
            *slot = params;
        }
        self
    }

    /// Set the score formula text
    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.params.formula = formula.into();
        self
    }

    /// Set the number of partitions
    pub fn with_n_proc(mut self, n_proc: usize) -> Self {
        self.params.n_proc = n_proc;
        self
    }

    /// Keep only the top `count` records per end date
    pub fn with_selection(mut self, count: usize, mode: SelectionMode) -> Self {
        self.params.selection = Some(SelectionConfig { count, mode });
        self
    }

    pub fn without_selection(mut self) -> Self {
        self.params.selection = None;
        self
    }

    pub fn build(self) -> EngineParams {
        self.params
    }

    /// Build a [`WindowAnalyzer`] with the configured parameters
    pub fn build_analyzer(self) -> WindowAnalyzer {
        WindowAnalyzer::new(self.params)
    }
}
