//! New-high / new-low check of the window start against a nearby interval.

use crate::formula::exported_flag;
use crate::models::{Cell, ExtremeKind, NewExtremeFlag, NewExtremeParams};
use std::ops::RangeInclusive;

/// Older-side interval: `[s + offset - widen, s + offset + span + widen)`,
/// never reaching the start column itself.
pub fn before_interval(start: usize, params: &NewExtremeParams, columns: usize) -> Option<RangeInclusive<usize>> {
    let lo = (start + params.start_offset)
        .saturating_sub(params.widen_span)
        .max(start + 1);
    let hi_exclusive = (start + params.required_history()).min(columns);
    (lo < hi_exclusive).then(|| lo..=hi_exclusive - 1)
}

/// Newer-side interval: `(s - offset - span - widen, s - offset + widen]`,
/// clamped to `[0, s - 1]`.
pub fn after_interval(start: usize, params: &NewExtremeParams) -> Option<RangeInclusive<usize>> {
    if start == 0 {
        return None;
    }
    let s = start as i64;
    let lo = (s - params.required_history() as i64 + 1).max(0);
    let hi = (s - params.start_offset as i64 + params.widen_span as i64).min(s - 1);
    (lo <= hi).then(|| lo as usize..=hi as usize)
}

/// Evaluate the first enabled flag of one set. `None` when every flag of
/// the set is disabled.
pub fn detect(row: &[Cell], start: usize, params: &NewExtremeParams, set: usize) -> Option<NewExtremeFlag> {
    let kind = exported_flag(params)?;

    let interval = if kind.is_before() {
        before_interval(start, params, row.len())
    } else {
        after_interval(start, params)
    };

    let hit = row.get(start).copied().flatten().and_then(|start_value| {
        let values = interval?.filter_map(|p| row.get(p).copied().flatten());
        if kind.is_high() {
            let max = values.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))?;
            Some(start_value > max)
        } else {
            let min = values.fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))?;
            Some(start_value < min)
        }
    });

    Some(NewExtremeFlag { set, kind, hit })
}

/// Both sets, in set order, skipping sets with nothing enabled.
pub fn detect_all(row: &[Cell], start: usize, sets: &[NewExtremeParams; 2]) -> Vec<NewExtremeFlag> {
    sets.iter()
        .enumerate()
        .filter_map(|(i, params)| detect(row, start, params, i + 1))
        .collect()
}

/// Group-order name list, for diagnostics.
pub fn enabled_kinds(params: &NewExtremeParams) -> Vec<ExtremeKind> {
    ExtremeKind::GROUP_ORDER
        .into_iter()
        .filter(|kind| match kind {
            ExtremeKind::BeforeHigh => params.before_high,
            ExtremeKind::BeforeLow => params.before_low,
            ExtremeKind::AfterHigh => params.after_high,
            ExtremeKind::AfterLow => params.after_low,
        })
        .collect()
}
