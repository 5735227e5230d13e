//! Maximal same-sign run accumulation over a diff row.
//!
//! Rows are newest-first, so a window `start_index >= end_index` is walked from
//! `start_index` down to `end_index`, i.e. chronologically forward. The sign test
//! is `value >= 0`. Missing cells are skipped. Run sums are held in integer
//! cents so sliding updates stay exact.

use crate::models::Cell;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Run {
    cents: i64,
    count: usize,
    non_negative: bool,
}

impl Run {
    fn start(value: f64) -> Self {
        Self {
            cents: to_cents(value),
            count: 1,
            non_negative: value >= 0.0,
        }
    }
}

/// Collapse a chronological series into the sums of its maximal same-sign runs.
pub fn accumulate_runs<I>(series: I) -> Vec<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut runs = VecDeque::new();
    for value in series {
        push_back(&mut runs, value);
    }
    emit(&runs)
}

/// Runs over the window `[end_index, start_index]` of a newest-first diff row.
///
/// `start_index < end_index` or an index past the row is a contract error:
/// a warning is logged and the result is empty.
pub fn compute_runs(diff_row: &[Cell], start_index: usize, end_index: usize) -> Vec<f64> {
    match build_runs(diff_row, start_index, end_index) {
        Some(runs) => emit(&runs),
        None => Vec::new(),
    }
}

/// Previous window state for one stock, reused when consecutive windows
/// overlap. Owned by whoever iterates the windows; never shared.
#[derive(Debug, Clone, Default)]
pub struct SlidingWindowCache {
    bounds: Option<(usize, usize)>,
    runs: VecDeque<Run>,
}

impl SlidingWindowCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.bounds = None;
        self.runs.clear();
    }

    /// Bounds `(start_index, end_index)` of the cached window.
    pub fn bounds(&self) -> Option<(usize, usize)> {
        self.bounds
    }
}

/// Same result as [`compute_runs`], reusing the cached runs when the window
/// slid by exactly one column in either direction.
pub fn compute_runs_cached(
    diff_row: &[Cell],
    start_index: usize,
    end_index: usize,
    cache: &mut SlidingWindowCache,
) -> Vec<f64> {
    if start_index < end_index || start_index >= diff_row.len() {
        cache.clear();
        return compute_runs(diff_row, start_index, end_index);
    }

    match cache.bounds {
        Some((prev_start, prev_end)) if prev_start == start_index && prev_end == end_index => {}
        // One column newer: the oldest element leaves, a newer one arrives
        Some((prev_start, prev_end))
            if prev_start == start_index + 1 && prev_end == end_index + 1 =>
        {
            if let Some(old) = diff_row[prev_start] {
                pop_front(&mut cache.runs, old);
            }
            if let Some(new) = diff_row[end_index] {
                push_back(&mut cache.runs, new);
            }
        }
        // One column older: the newest element leaves, an older one arrives
        Some((prev_start, prev_end))
            if start_index == prev_start + 1 && end_index == prev_end + 1 =>
        {
            if let Some(old) = diff_row[prev_end] {
                pop_back(&mut cache.runs, old);
            }
            if let Some(new) = diff_row[start_index] {
                push_front(&mut cache.runs, new);
            }
        }
        _ => match build_runs(diff_row, start_index, end_index) {
            Some(runs) => cache.runs = runs,
            None => {
                cache.clear();
                return Vec::new();
            }
        },
    }

    cache.bounds = Some((start_index, end_index));
    emit(&cache.runs)
}

fn build_runs(diff_row: &[Cell], start_index: usize, end_index: usize) -> Option<VecDeque<Run>> {
    if start_index < end_index {
        tracing::warn!(
            "RUNS: window start {} precedes end {}; returning no runs",
            start_index,
            end_index
        );
        return None;
    }
    if start_index >= diff_row.len() {
        tracing::warn!(
            "RUNS: window start {} outside row of {} columns",
            start_index,
            diff_row.len()
        );
        return None;
    }

    let mut runs = VecDeque::new();
    for position in (end_index..=start_index).rev() {
        if let Some(value) = diff_row[position] {
            push_back(&mut runs, value);
        }
    }
    Some(runs)
}

fn push_back(runs: &mut VecDeque<Run>, value: f64) {
    match runs.back_mut() {
        Some(last) if last.non_negative == (value >= 0.0) => {
            last.cents += to_cents(value);
            last.count += 1;
        }
        _ => runs.push_back(Run::start(value)),
    }
}

fn push_front(runs: &mut VecDeque<Run>, value: f64) {
    match runs.front_mut() {
        Some(first) if first.non_negative == (value >= 0.0) => {
            first.cents += to_cents(value);
            first.count += 1;
        }
        _ => runs.push_front(Run::start(value)),
    }
}

fn pop_front(runs: &mut VecDeque<Run>, value: f64) {
    if let Some(first) = runs.front_mut() {
        first.cents -= to_cents(value);
        first.count -= 1;
        if first.count == 0 {
            runs.pop_front();
        }
    }
}

fn pop_back(runs: &mut VecDeque<Run>, value: f64) {
    if let Some(last) = runs.back_mut() {
        last.cents -= to_cents(value);
        last.count -= 1;
        if last.count == 0 {
            runs.pop_back();
        }
    }
}

fn to_cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

fn emit(runs: &VecDeque<Run>) -> Vec<f64> {
    runs.iter().map(|run| run.cents as f64 / 100.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Newest-first row from a chronological series.
    fn row(chronological: &[f64]) -> Vec<Cell> {
        chronological.iter().rev().map(|v| Some(*v)).collect()
    }

    #[test]
    fn test_example_series() {
        assert_eq!(accumulate_runs([1.0, 2.0, -1.0, -3.0, 4.0]), vec![3.0, -4.0, 4.0]);

        let r = row(&[1.0, 2.0, -1.0, -3.0, 4.0]);
        assert_eq!(compute_runs(&r, 4, 0), vec![3.0, -4.0, 4.0]);
    }

    #[test]
    fn test_zero_counts_as_non_negative() {
        assert_eq!(accumulate_runs([0.0, 1.5, -0.5, 0.0]), vec![1.5, -0.5, 0.0]);
    }

    #[test]
    fn test_sum_is_preserved() {
        let series = [0.12, -0.4, -0.33, 1.01, 0.0, 2.5, -7.25, 3.3, 3.3, -0.01];
        let runs = accumulate_runs(series);
        let total: f64 = series.iter().sum();
        assert!((runs.iter().sum::<f64>() - total).abs() < 1e-9);
        // Adjacent runs alternate sign
        for pair in runs.windows(2) {
            assert_ne!(pair[0] >= 0.0, pair[1] >= 0.0);
        }
    }

    #[test]
    fn test_single_element_and_empty() {
        let r = row(&[-2.0]);
        assert_eq!(compute_runs(&r, 0, 0), vec![-2.0]);
        assert!(accumulate_runs(Vec::<f64>::new()).is_empty());
    }

    #[test]
    fn test_reversed_bounds_yield_empty() {
        let r = row(&[1.0, 2.0, 3.0]);
        assert!(compute_runs(&r, 0, 2).is_empty());
        assert!(compute_runs(&r, 5, 0).is_empty());
    }

    #[test]
    fn test_missing_cells_are_skipped() {
        let r: Vec<Cell> = vec![Some(1.0), None, Some(2.0), Some(-1.0)];
        // chronological: -1, 2, None, 1
        assert_eq!(compute_runs(&r, 3, 0), vec![-1.0, 3.0]);
    }

    #[test]
    fn test_cached_matches_full_recompute_sliding_newer() {
        let chronological = [
            0.5, -0.25, -0.25, 1.0, 2.0, -3.0, 0.0, 0.75, -0.1, -0.2, 4.0, 0.3, -0.3, 0.01,
        ];
        let r = row(&chronological);
        let width = 5;
        let mut cache = SlidingWindowCache::new();

        // oldest window first, then slide toward newer columns
        for end in (0..r.len() - width).rev() {
            let start = end + width;
            let cached = compute_runs_cached(&r, start, end, &mut cache);
            assert_eq!(cached, compute_runs(&r, start, end), "end={}", end);
        }
    }

    #[test]
    fn test_cached_matches_full_recompute_sliding_older() {
        let r: Vec<Cell> = vec![
            Some(1.0),
            Some(-2.0),
            None,
            Some(-0.5),
            Some(3.0),
            Some(3.0),
            Some(-1.0),
            Some(0.0),
            Some(2.25),
        ];
        let width = 3;
        let mut cache = SlidingWindowCache::new();
        for end in 0..r.len() - width {
            let start = end + width;
            let cached = compute_runs_cached(&r, start, end, &mut cache);
            assert_eq!(cached, compute_runs(&r, start, end), "end={}", end);
        }
    }

    #[test]
    fn test_cached_matches_full_recompute_with_sub_cent_diffs() {
        // three-decimal steps
        let chronological: Vec<f64> = (0..60)
            .map(|i| (((i * 37 + 11) % 23) as f64 - 11.0) * 0.137 + 0.001 * (i % 7) as f64)
            .collect();
        let r = row(&chronological);
        let width = 7;
        let mut cache = SlidingWindowCache::new();
        for end in (0..r.len() - width).rev() {
            let start = end + width;
            let cached = compute_runs_cached(&r, start, end, &mut cache);
            assert_eq!(cached, compute_runs(&r, start, end), "end={}", end);
        }
    }

    #[test]
    fn test_cached_recomputes_on_jump() {
        let r = row(&[1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0]);
        let mut cache = SlidingWindowCache::new();
        compute_runs_cached(&r, 6, 4, &mut cache);
        let jumped = compute_runs_cached(&r, 3, 0, &mut cache);
        assert_eq!(jumped, compute_runs(&r, 3, 0));
        assert_eq!(cache.bounds(), Some((3, 0)));
    }
}
