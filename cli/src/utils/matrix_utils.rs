//! Per-partition kernel: every (stock, end date) pair of a stock range.

use crate::error::{EngineError, FormulaError};
use crate::formula::record_namespace;
use crate::models::{Cell, ExitOutcome, SequenceAnalysis, StockRecord};
use crate::state_machine::{BatchInputs, DateBuckets};
use crate::utils::{
    analyze_sequence, compute_runs, compute_runs_cached, detect_all, evaluate_exit, forward_n_max,
    resolve, ExitDirection, SlidingWindowCache, WindowBounds,
};
use std::ops::Range;

/// Result of one partition call.
#[derive(Debug, Default)]
pub struct PartitionOutput {
    pub buckets: DateBuckets,
    pub record_count: usize,
    pub formula_errors: usize,
    /// First formula error met, reported once by the dispatcher
    pub first_formula_error: Option<FormulaError>,
}

impl PartitionOutput {
    fn note_formula_error(&mut self, error: FormulaError) {
        self.formula_errors += 1;
        if self.first_formula_error.is_none() {
            self.first_formula_error = Some(error);
        }
    }
}

/// Evaluate one stock at one end position.
///
/// `cache` carries the previous window of the same stock; pass a fresh cache
/// for a different stock.
pub fn evaluate_stock(
    inputs: &BatchInputs,
    stock: usize,
    end: usize,
    cache: &mut SlidingWindowCache,
    errors: &mut Vec<FormulaError>,
) -> StockRecord {
    let price = &inputs.pair.price;
    let price_row = price.row(stock);
    let diff_row = inputs.pair.diff.row(stock);
    let window = &inputs.params.window;
    let bounds = WindowBounds::new(end, window.width);

    let references = resolve(price_row, &price.dates, bounds, window);
    let sequences = analyze_sequence(compute_runs_cached(diff_row, bounds.start, bounds.end, cache));

    let (forward_max, forward_min) = if window.is_forward {
        let variant = |position: Option<usize>| -> SequenceAnalysis {
            match position {
                Some(p) if p > end => analyze_sequence(compute_runs(diff_row, p, end)),
                _ => SequenceAnalysis::default(),
            }
        };
        (
            Some(variant(references.max.as_ref().map(|p| p.position))),
            Some(variant(references.min.as_ref().map(|p| p.position))),
        )
    } else {
        (None, None)
    };

    let n_max = forward_n_max(price_row, &price.dates, bounds, window.n_days);
    let n_max_is_window_max = match (&n_max, &references.max) {
        (Some(n), Some(max)) => Some(n.value == max.value),
        _ => None,
    };

    let take_profit = exit_outcome(price_row, end, inputs, ExitDirection::TakeProfit, errors);
    let stop_loss = exit_outcome(price_row, end, inputs, ExitDirection::StopLoss, errors);

    let new_extremes = detect_all(price_row, bounds.start, &inputs.params.new_extreme);

    let mut record = StockRecord {
        identity: price.identity(stock),
        end_date: price.dates[end].clone(),
        references,
        sequences,
        forward_max,
        forward_min,
        forward_n_max: n_max,
        n_max_is_window_max,
        take_profit,
        stop_loss,
        new_extremes,
        score: 0.0,
    };

    if !inputs.formula.is_empty() {
        match inputs.formula.score(&record_namespace(&record)) {
            Ok(score) => record.score = score,
            Err(e) => errors.push(e),
        }
    }
    record
}

fn exit_outcome(
    row: &[Cell],
    end: usize,
    inputs: &BatchInputs,
    direction: ExitDirection,
    errors: &mut Vec<FormulaError>,
) -> ExitOutcome {
    let (rule, selector) = match direction {
        ExitDirection::TakeProfit => (&inputs.params.take_profit, &inputs.take_profit_selector),
        ExitDirection::StopLoss => (&inputs.params.stop_loss, &inputs.stop_loss_selector),
    };
    match evaluate_exit(row, end, rule, direction, selector) {
        Ok(outcome) => outcome,
        Err(e) => {
            errors.push(e);
            ExitOutcome::default()
        }
    }
}

/// Run the kernel over `stocks` for every selected end position.
///
/// Stocks are visited in order; for each stock the end positions go from
/// oldest to newest so consecutive windows reuse the sliding cache.
pub fn run_partition(inputs: &BatchInputs, stocks: Range<usize>) -> Result<PartitionOutput, EngineError> {
    if stocks.end > inputs.num_stocks() || stocks.start > stocks.end {
        return Err(EngineError::invalid(
            "partition",
            format!("{:?} outside 0..{}", stocks, inputs.num_stocks()),
        ));
    }

    let mut output = PartitionOutput::default();
    let labels = inputs.end_labels();
    for label in &labels {
        output.buckets.insert(label.clone(), Vec::with_capacity(stocks.len()));
    }

    let mut errors = Vec::new();
    for stock in stocks {
        let mut cache = SlidingWindowCache::new();
        for (end, label) in inputs.end_positions.iter().zip(&labels) {
            let record = evaluate_stock(inputs, stock, *end, &mut cache, &mut errors);
            if let Some(bucket) = output.buckets.get_mut(label) {
                bucket.push(record);
                output.record_count += 1;
            }
        }
        for e in errors.drain(..) {
            output.note_formula_error(e);
        }
    }

    Ok(output)
}

/// Every stock at one end position, in stock order, each with a fresh cache.
/// The end position is not checked against the available history.
pub fn evaluate_end_position(inputs: &BatchInputs, end: usize) -> (Vec<StockRecord>, Vec<FormulaError>) {
    let mut errors = Vec::new();
    let records: Vec<StockRecord> = (0..inputs.num_stocks())
        .map(|stock| evaluate_stock(inputs, stock, end, &mut SlidingWindowCache::new(), &mut errors))
        .collect();
    (records, errors)
}

/// Sequential evaluation of every stock, in stock order.
pub fn evaluate_all_stocks(inputs: &BatchInputs) -> Result<PartitionOutput, EngineError> {
    run_partition(inputs, 0..inputs.num_stocks())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EngineParams, MatrixPair, NewExtremeParams, StockMatrix};

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("2024-05-{:02}", 30 - i)).collect()
    }

    /// Prices and diffs from chronological rows.
    fn pair(chronological: &[Vec<f64>]) -> MatrixPair {
        let n = chronological[0].len();
        let codes: Vec<String> = (0..chronological.len()).map(|i| format!("S{}", i)).collect();
        let price_rows: Vec<Vec<Cell>> = chronological
            .iter()
            .map(|row| row.iter().rev().map(|v| Some(*v)).collect())
            .collect();
        let diff_rows: Vec<Vec<Cell>> = chronological
            .iter()
            .map(|row| {
                let mut diffs = vec![Some(0.0)];
                diffs.extend(row.windows(2).map(|w| Some(((w[1] - w[0]) * 100.0).round() / 100.0)));
                diffs.reverse();
                diffs
            })
            .collect();
        let price = StockMatrix::new(codes.clone(), codes.clone(), labels(n), price_rows).unwrap();
        let diff = StockMatrix::new(codes.clone(), codes, labels(n), diff_rows).unwrap();
        MatrixPair::new(price, diff).unwrap()
    }

    fn inputs(pair: MatrixPair, params: EngineParams, first: &str, second: &str) -> BatchInputs {
        BatchInputs::compile(pair, params)
            .unwrap()
            .with_end_range(first, second)
            .unwrap()
    }

    #[test]
    fn test_record_for_known_series() {
        // chronological 10, 11, 13, 12, 9, 14: diffs 0, 1, 2, -1, -3, 5
        let p = pair(&[vec![10.0, 11.0, 13.0, 12.0, 9.0, 14.0]]);
        let mut params = EngineParams::default();
        params.window.width = 4;
        params.n_proc = 1;
        let inputs = inputs(p, params, "2024-05-30", "2024-05-30");

        let mut cache = SlidingWindowCache::new();
        let mut errors = Vec::new();
        let record = evaluate_stock(&inputs, 0, 0, &mut cache, &mut errors);

        // window positions 4..=0 carry diffs 1, 2, -1, -3, 5
        assert_eq!(record.sequences.continuous, vec![3.0, -4.0, 5.0]);
        assert_eq!(record.sequences.valid, vec![3.0, -4.0, 0.0]);
        assert_eq!(record.references.max.as_ref().map(|p| p.value), Some(14.0));
        assert_eq!(record.references.min.as_ref().map(|p| p.value), Some(9.0));
        assert_eq!(record.references.start.as_ref().map(|p| p.value), Some(11.0));
        assert!(record.forward_max.is_none());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_forward_variants_and_n_days() {
        let p = pair(&[vec![10.0, 15.0, 13.0, 12.0, 9.0, 11.0]]);
        let mut params = EngineParams::default();
        params.window.width = 4;
        params.window.is_forward = true;
        params.window.n_days = 2;
        let inputs = inputs(p, params, "2024-05-30", "2024-05-30");

        let record = evaluate_stock(&inputs, 0, 0, &mut SlidingWindowCache::new(), &mut Vec::new());
        // max 15 at position 4: runs over diffs at 4..=0 = 5, -2, -1, -3, 2
        let forward_max = record.forward_max.unwrap();
        assert_eq!(forward_max.continuous, vec![5.0, -6.0, 2.0]);
        // min 9 at position 1: diffs -3, 2
        assert_eq!(record.forward_min.unwrap().continuous, vec![-3.0, 2.0]);
        // first two columns from the start: 15, 13
        assert_eq!(record.forward_n_max.unwrap().value, 15.0);
        assert_eq!(record.n_max_is_window_max, Some(true));
    }

    #[test]
    fn test_partition_buckets_and_scores() {
        let p = pair(&[
            vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0],
            vec![20.0, 19.0, 18.0, 17.0, 16.0, 15.0, 14.0],
            vec![5.0, 6.0, 5.0, 6.0, 5.0, 6.0, 5.0],
        ]);
        let mut params = EngineParams::default();
        params.window.width = 3;
        params.formula = "if continuous_sum > 0: result = continuous_sum else: result = 0".into();
        let inputs = inputs(p, params, "2024-05-28", "2024-05-30");

        let output = run_partition(&inputs, 0..3).unwrap();
        assert_eq!(output.buckets.len(), 3);
        assert_eq!(output.record_count, 9);
        assert_eq!(output.formula_errors, 0);
        for records in output.buckets.values() {
            let codes: Vec<_> = records.iter().map(|r| r.identity.code.as_str()).collect();
            assert_eq!(codes, vec!["S0", "S1", "S2"]);
            // four daily gains of 1 inside the window, the falling stock scores 0
            assert_eq!(records[0].score, 4.0);
            assert_eq!(records[1].score, 0.0);
        }
    }

    #[test]
    fn test_cached_and_uncached_runs_agree_across_dates() {
        let p = pair(&[vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0, 5.0, 3.0, 5.0, 8.0]]);
        let mut params = EngineParams::default();
        params.window.width = 5;
        let inputs = inputs(p, params, "2024-05-24", "2024-05-30");

        let output = evaluate_all_stocks(&inputs).unwrap();
        for (label, records) in &output.buckets {
            let end = inputs.pair.price.position(label).unwrap();
            let expected = compute_runs(inputs.pair.diff.row(0), end + 5, end);
            assert_eq!(records[0].sequences.continuous, expected, "{}", label);
        }
    }

    #[test]
    fn test_new_extreme_flags_in_record() {
        let p = pair(&[vec![1.0, 2.0, 3.0, 9.0, 4.0, 5.0, 6.0]]);
        let mut params = EngineParams::default();
        params.window.width = 3;
        params.new_extreme[0] = NewExtremeParams {
            start_offset: 0,
            range_span: 3,
            before_high: true,
            ..NewExtremeParams::default()
        };
        params.formula = "if new_before_high_1: result = 1 else: result = 0".into();
        let inputs = inputs(p, params, "2024-05-30", "2024-05-30");

        let output = evaluate_all_stocks(&inputs).unwrap();
        let record = &output.buckets["2024-05-30"][0];
        // start 9 above 3, 2
        assert_eq!(record.new_extremes.len(), 1);
        assert_eq!(record.new_extremes[0].hit, Some(true));
        assert_eq!(record.score, 1.0);
    }

    #[test]
    fn test_partition_out_of_range_is_error() {
        let p = pair(&[vec![1.0, 2.0, 3.0]]);
        let mut params = EngineParams::default();
        params.window.width = 1;
        let inputs = inputs(p, params, "2024-05-30", "2024-05-30");
        assert!(run_partition(&inputs, 0..2).is_err());
    }
}
