use super::DispatchState;
use crate::models::{SelectionConfig, SelectionMode, StockRecord};
use crate::utils::is_scoreable;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::ops::Range;

/// Per-date record buckets keyed by end-date label.
pub type DateBuckets = BTreeMap<String, Vec<StockRecord>>;

/// Dispatcher transition rules and the pure steps each state performs
pub struct DispatchTransitions;

impl DispatchTransitions {
    /// Validate dispatcher transition
    pub fn is_valid_transition(from: DispatchState, to: DispatchState) -> bool {
        use DispatchState::*;
        matches!(
            (from, to),
            (Idle, Partitioned)
                | (Partitioned, Dispatched)
                | (Dispatched, Merging)
                | (Merging, Selecting)
                | (Merging, Done)
                | (Selecting, Done)
        )
    }
}

/// Split `0..stocks` into `k` contiguous partitions; the last absorbs the
/// remainder.
pub fn partition_ranges(stocks: usize, k: usize) -> Vec<Range<usize>> {
    if stocks == 0 {
        return Vec::new();
    }
    let k = k.clamp(1, stocks);
    (0..k)
        .map(|i| {
            let start = i * stocks / k;
            let end = if i == k - 1 { stocks } else { (i + 1) * stocks / k };
            start..end
        })
        .collect()
}

/// Append one partition's buckets into the shared accumulator.
pub fn merge_partition(accumulator: &mut DateBuckets, partial: DateBuckets) -> usize {
    let mut merged = 0;
    for (date, records) in partial {
        merged += records.len();
        accumulator.entry(date).or_default().extend(records);
    }
    merged
}

/// Drop unscoreable records, sort by score and truncate to `count`.
pub fn select_top(records: &mut Vec<StockRecord>, selection: &SelectionConfig) {
    records.retain(|r| is_scoreable(r.score));
    match selection.mode {
        SelectionMode::Max => records.sort_by(|a, b| b.score.total_cmp(&a.score)),
        SelectionMode::Min => records.sort_by(|a, b| a.score.total_cmp(&b.score)),
    }
    records.truncate(selection.count);
}

/// Apply [`select_top`] to every bucket in parallel.
pub fn select_all(buckets: &mut DateBuckets, selection: &SelectionConfig) {
    buckets
        .par_iter_mut()
        .for_each(|(_, records)| select_top(records, selection));
}
