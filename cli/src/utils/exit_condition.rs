//! Forward exit search over a newest-first price row.
//!
//! From end position `e` the search visits `e-1, e-2, ..., e-op_days`, i.e.
//! forward in time, and keeps the first position satisfying each rule.

use crate::error::FormulaError;
use crate::formula::{ExitCandidates, ExitSelector};
use crate::models::{Cell, ExitCandidate, ExitKind, ExitOutcome, ExitRule};
use crate::utils::{round2, safe_div};

/// Take-profit searches upward, stop-loss downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDirection {
    TakeProfit,
    StopLoss,
}

impl ExitDirection {
    fn beyond(&self, value: f64, threshold: f64) -> bool {
        match self {
            ExitDirection::TakeProfit => value > threshold,
            ExitDirection::StopLoss => value < threshold,
        }
    }
}

/// Raw rule results before selection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExitSearch {
    pub candidates: ExitCandidates,
    pub increment_steps: usize,
}

fn cell(row: &[Cell], position: usize) -> Option<f64> {
    row.get(position).copied().flatten()
}

/// Run the three rules with fallback to the value `op_days` back.
pub fn search_exits(
    row: &[Cell],
    end: usize,
    rule: &ExitRule,
    direction: ExitDirection,
) -> ExitSearch {
    let end_value = cell(row, end);
    let mut increment = None;
    let mut after_gt_end = None;
    let mut after_gt_start = None;
    let mut steps = 0usize;

    let last = end.saturating_sub(rule.op_days);
    for position in (last..end).rev() {
        let Some(value) = cell(row, position) else {
            continue;
        };
        let days = end - position;

        if let Some(base) = end_value {
            let bar = base + base * rule.inc_rate * (steps + 1) as f64;
            if direction.beyond(value, bar) {
                if increment.is_none() {
                    increment = Some(ExitCandidate::new(ExitKind::Increment, value, days));
                }
                steps += 1;
            }

            if after_gt_end.is_none() {
                let threshold = base + base * rule.after_gt_end_ratio;
                if direction.beyond(value, threshold) {
                    after_gt_end = Some(ExitCandidate::new(ExitKind::AbsoluteRatio, value, days));
                }
            }
        }

        if after_gt_start.is_none() {
            if let Some(previous) = cell(row, position + 1) {
                if direction.beyond(value - previous, previous * rule.after_gt_start_ratio) {
                    after_gt_start = Some(ExitCandidate::new(ExitKind::RelativeRatio, value, days));
                }
            }
        }
    }

    let fallback = |kind: ExitKind| -> Option<ExitCandidate> {
        if rule.op_days == 0 || rule.op_days > end {
            return None;
        }
        cell(row, end - rule.op_days).map(|value| ExitCandidate::new(kind, value, rule.op_days))
    };

    ExitSearch {
        candidates: ExitCandidates {
            increment: increment.or_else(|| fallback(ExitKind::Increment)),
            after_gt_end: after_gt_end.or_else(|| fallback(ExitKind::AbsoluteRatio)),
            after_gt_start: after_gt_start.or_else(|| fallback(ExitKind::RelativeRatio)),
        },
        increment_steps: steps,
    }
}

/// Search, select the realized exit and derive change and rate.
pub fn evaluate_exit(
    row: &[Cell],
    end: usize,
    rule: &ExitRule,
    direction: ExitDirection,
    selector: &ExitSelector,
) -> Result<ExitOutcome, FormulaError> {
    let search = search_exits(row, end, rule, direction);
    let selected = selector.select(&search.candidates)?;
    let realized = selected.and_then(|kind| search.candidates.get(kind));

    let end_value = cell(row, end).filter(|v| *v != 0.0);
    let ops_value = realized.map(|c| c.value());
    let hold_days = realized.map(|c| c.days());

    let ops_change = match (ops_value, end_value) {
        (Some(ops), Some(base)) => safe_div(Some(ops - base), Some(base)).map(|r| round2(r * 100.0)),
        _ => None,
    };

    let adjust_days = hold_days.map(|hold| {
        let triggered = rule.ops_change_input != 0.0
            && hold == 1
            && ops_change.is_some_and(|change| change > rule.ops_change_input);
        if triggered {
            rule.op_days as f64 / 3.0
        } else {
            (hold + 1) as f64
        }
    });

    let ops_incre_rate = safe_div(ops_change, adjust_days).map(round2);

    Ok(ExitOutcome {
        increment: search.candidates.increment,
        increment_steps: search.increment_steps,
        after_gt_end: search.candidates.after_gt_end,
        after_gt_start: search.candidates.after_gt_start,
        selected,
        ops_value,
        hold_days,
        ops_change,
        adjust_days,
        ops_incre_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Newest-first row from a chronological series.
    fn row(chronological: &[f64]) -> Vec<Cell> {
        chronological.iter().rev().map(|v| Some(*v)).collect()
    }

    fn rule(op_days: usize, inc: f64, end_ratio: f64, start_ratio: f64) -> ExitRule {
        ExitRule {
            op_days,
            inc_rate: inc,
            after_gt_end_ratio: end_ratio,
            after_gt_start_ratio: start_ratio,
            ops_change_input: 0.0,
            expr: String::new(),
        }
    }

    #[test]
    fn test_first_qualifying_candidates() {
        // chronological: end=100 then 101, 104, 103, 110
        let r = row(&[100.0, 101.0, 104.0, 103.0, 110.0]);
        let end = 4;
        let search = search_exits(&r, end, &rule(4, 0.03, 0.05, 0.02), ExitDirection::TakeProfit);

        // 104 > 103 (n=1), then 110 > 106 (n=2)
        assert_eq!(search.candidates.increment, Some(ExitCandidate::new(ExitKind::Increment, 104.0, 2)));
        assert_eq!(search.increment_steps, 2);
        // 110 > 105
        assert_eq!(search.candidates.after_gt_end.map(|c| (c.value(), c.days())), Some((110.0, 4)));
        // 101 -> 104 is +2.97%
        assert_eq!(search.candidates.after_gt_start.map(|c| (c.value(), c.days())), Some((104.0, 2)));
    }

    #[test]
    fn test_fallback_to_op_days_back() {
        let r = row(&[100.0, 99.0, 98.0, 97.5]);
        let search = search_exits(&r, 3, &rule(3, 0.03, 0.05, 0.02), ExitDirection::TakeProfit);
        for candidate in [
            search.candidates.increment,
            search.candidates.after_gt_end,
            search.candidates.after_gt_start,
        ] {
            let c = candidate.unwrap();
            assert_eq!(c.value(), 97.5);
            assert_eq!(c.days(), 3);
        }
        assert_eq!(search.increment_steps, 0);
    }

    #[test]
    fn test_no_fallback_without_op_days_or_history() {
        let r = row(&[100.0, 99.0]);
        let search = search_exits(&r, 1, &rule(0, 0.03, 0.05, 0.02), ExitDirection::TakeProfit);
        assert_eq!(search.candidates.increment, None);

        // op_days reaches past the newest column
        let search = search_exits(&r, 1, &rule(5, 0.03, 0.05, 0.02), ExitDirection::TakeProfit);
        assert_eq!(search.candidates.after_gt_end, None);
    }

    #[test]
    fn test_stop_loss_mirrors_comparisons() {
        let r = row(&[100.0, 99.0, 96.0, 90.0]);
        let search = search_exits(&r, 3, &rule(3, -0.03, -0.05, -0.02), ExitDirection::StopLoss);
        // 96 < 97 first
        assert_eq!(search.candidates.increment.map(|c| c.days()), Some(2));
        // 90 < 95
        assert_eq!(search.candidates.after_gt_end.map(|c| c.value()), Some(90.0));
        // 99 -> 96 is -3.03%
        assert_eq!(search.candidates.after_gt_start.map(|c| c.value()), Some(96.0));
    }

    #[test]
    fn test_evaluate_exit_derivations() {
        let r = row(&[100.0, 101.0, 104.0, 103.0, 110.0]);
        let outcome = evaluate_exit(
            &r,
            4,
            &rule(4, 0.03, 0.05, 0.02),
            ExitDirection::TakeProfit,
            &ExitSelector::default(),
        )
        .unwrap();

        assert_eq!(outcome.selected, Some(ExitKind::Increment));
        assert_eq!(outcome.ops_value, Some(104.0));
        assert_eq!(outcome.hold_days, Some(2));
        assert_eq!(outcome.ops_change, Some(4.0));
        assert_eq!(outcome.adjust_days, Some(3.0));
        assert_eq!(outcome.ops_incre_rate, Some(1.33));
    }

    #[test]
    fn test_adjust_days_shortcut() {
        let r = row(&[100.0, 106.0, 90.0, 90.0]);
        let mut exit_rule = rule(3, 0.03, 0.05, 0.02);
        exit_rule.ops_change_input = 5.0;
        let outcome = evaluate_exit(&r, 3, &exit_rule, ExitDirection::TakeProfit, &ExitSelector::default())
            .unwrap();
        assert_eq!(outcome.hold_days, Some(1));
        assert_eq!(outcome.ops_change, Some(6.0));
        assert_eq!(outcome.adjust_days, Some(1.0));
        assert_eq!(outcome.ops_incre_rate, Some(6.0));
    }

    #[test]
    fn test_stop_loss_adjust_days_uses_same_trigger() {
        // chronological: end=100 then 92, 91, 90
        let r = row(&[100.0, 92.0, 91.0, 90.0]);
        let mut exit_rule = rule(3, -0.03, -0.05, -0.02);
        exit_rule.ops_change_input = -5.0;
        let outcome = evaluate_exit(&r, 3, &exit_rule, ExitDirection::StopLoss, &ExitSelector::default())
            .unwrap();
        assert_eq!(outcome.hold_days, Some(1));
        assert_eq!(outcome.ops_change, Some(-8.0));
        // -8 > -5 is false
        assert_eq!(outcome.adjust_days, Some(2.0));
        assert_eq!(outcome.ops_incre_rate, Some(-4.0));

        exit_rule.ops_change_input = -10.0;
        let outcome = evaluate_exit(&r, 3, &exit_rule, ExitDirection::StopLoss, &ExitSelector::default())
            .unwrap();
        assert_eq!(outcome.adjust_days, Some(1.0));
        assert_eq!(outcome.ops_incre_rate, Some(-8.0));
    }

    #[test]
    fn test_zero_end_value_is_degenerate() {
        let r = row(&[0.0, 1.0, 2.0]);
        let outcome = evaluate_exit(
            &r,
            2,
            &rule(2, 0.03, 0.05, 0.02),
            ExitDirection::TakeProfit,
            &ExitSelector::compile("result = AGS").unwrap(),
        )
        .unwrap();
        assert_eq!(outcome.ops_value, Some(1.0));
        assert_eq!(outcome.ops_change, None);
        assert_eq!(outcome.ops_incre_rate, None);
    }
}
