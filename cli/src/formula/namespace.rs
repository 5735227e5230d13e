//! Flat variable namespace exported by a [`StockRecord`].

use super::expression::{Namespace, Value};
use crate::models::{
    ExitCandidate, ExitKind, ExitOutcome, ExtremeKind, NewExtremeParams, ReferencePoint,
    SequenceAnalysis, SequenceStats, StockRecord,
};
use crate::utils::bool_value;
use std::collections::{BTreeSet, HashMap};

const SEQUENCE_PREFIXES: [&str; 6] = [
    "continuous",
    "valid",
    "forward_max_continuous",
    "forward_max_valid",
    "forward_min_continuous",
    "forward_min_valid",
];

const STAT_SUFFIXES: [&str; 11] = [
    "len",
    "sum",
    "abs_sum",
    "pos_sum",
    "neg_sum",
    "first_half",
    "second_half",
    "block1",
    "block2",
    "block3",
    "block4",
];

const REFERENCE_NAMES: [&str; 10] = [
    "end_value",
    "start_value",
    "max_value",
    "min_value",
    "closest_value",
    "actual_value",
    "max_offset",
    "min_offset",
    "closest_offset",
    "actual_offset",
];

const EXIT_NAMES: [&str; 12] = [
    "increment_value",
    "increment_days",
    "increment_steps",
    "after_gt_end_value",
    "after_gt_end_days",
    "after_gt_start_value",
    "after_gt_start_days",
    "ops_value",
    "hold_days",
    "ops_change",
    "adjust_days",
    "ops_incre_rate",
];

/// Flags exported for one set: the first enabled one in group order.
pub fn exported_flag(params: &NewExtremeParams) -> Option<ExtremeKind> {
    ExtremeKind::GROUP_ORDER.into_iter().find(|kind| match kind {
        ExtremeKind::BeforeHigh => params.before_high,
        ExtremeKind::BeforeLow => params.before_low,
        ExtremeKind::AfterHigh => params.after_high,
        ExtremeKind::AfterLow => params.after_low,
    })
}

/// Every name a score formula may reference under these new-extreme settings.
pub fn known_variables(new_extreme: &[NewExtremeParams; 2]) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = REFERENCE_NAMES.iter().map(|s| s.to_string()).collect();

    for prefix in SEQUENCE_PREFIXES {
        for suffix in STAT_SUFFIXES {
            names.insert(format!("{}_{}", prefix, suffix));
        }
    }
    for name in EXIT_NAMES {
        names.insert(name.to_string());
        names.insert(format!("stop_{}", name));
    }
    names.insert("forward_n_max".to_string());
    names.insert("n_max_is_window_max".to_string());

    for (i, set) in new_extreme.iter().enumerate() {
        if let Some(kind) = exported_flag(set) {
            names.insert(kind.variable_name(i + 1));
        }
    }
    names
}

fn offset(point: &Option<ReferencePoint>, end: Option<usize>) -> Option<f64> {
    let position = point.as_ref()?.position;
    Some(position as f64 - end? as f64)
}

fn insert_stats(ns: &mut HashMap<String, Option<f64>>, prefix: &str, stats: Option<&SequenceStats>) {
    let values = stats.map(|s| {
        [
            s.len as f64,
            s.sum,
            s.abs_sum,
            s.pos_sum,
            s.neg_sum,
            s.first_half,
            s.second_half,
            s.block1,
            s.block2,
            s.block3,
            s.block4,
        ]
    });
    for (i, suffix) in STAT_SUFFIXES.iter().enumerate() {
        ns.insert(format!("{}_{}", prefix, suffix), values.map(|v| v[i]));
    }
}

fn insert_analysis(ns: &mut HashMap<String, Option<f64>>, prefix: &str, analysis: Option<&SequenceAnalysis>) {
    let (continuous, valid) = if prefix.is_empty() {
        ("continuous".to_string(), "valid".to_string())
    } else {
        (format!("{}_continuous", prefix), format!("{}_valid", prefix))
    };
    insert_stats(ns, &continuous, analysis.map(|a| &a.continuous_stats));
    insert_stats(ns, &valid, analysis.map(|a| &a.valid_stats));
}

fn insert_exit(ns: &mut HashMap<String, Option<f64>>, prefix: &str, exit: &ExitOutcome) {
    let value = |c: &Option<ExitCandidate>| c.map(|c| c.value());
    let days = |c: &Option<ExitCandidate>| c.map(|c| c.days() as f64);
    let values: [Option<f64>; 12] = [
        value(&exit.increment),
        days(&exit.increment),
        Some(exit.increment_steps as f64),
        value(&exit.after_gt_end),
        days(&exit.after_gt_end),
        value(&exit.after_gt_start),
        days(&exit.after_gt_start),
        exit.ops_value,
        exit.hold_days.map(|d| d as f64),
        exit.ops_change,
        exit.adjust_days,
        exit.ops_incre_rate,
    ];
    for (name, v) in EXIT_NAMES.iter().zip(values) {
        ns.insert(format!("{}{}", prefix, name), v);
    }
}

/// Build the score namespace of one record.
pub fn record_namespace(record: &StockRecord) -> HashMap<String, Option<f64>> {
    let mut ns = HashMap::with_capacity(128);
    let refs = &record.references;
    let end_pos = refs.end.as_ref().map(|p| p.position);
    let value = |p: &Option<ReferencePoint>| p.as_ref().map(|p| p.value);

    ns.insert("end_value".to_string(), value(&refs.end));
    ns.insert("start_value".to_string(), value(&refs.start));
    ns.insert("max_value".to_string(), value(&refs.max));
    ns.insert("min_value".to_string(), value(&refs.min));
    ns.insert("closest_value".to_string(), value(&refs.closest));
    ns.insert("actual_value".to_string(), value(&refs.actual));
    ns.insert("max_offset".to_string(), offset(&refs.max, end_pos));
    ns.insert("min_offset".to_string(), offset(&refs.min, end_pos));
    ns.insert("closest_offset".to_string(), offset(&refs.closest, end_pos));
    ns.insert("actual_offset".to_string(), offset(&refs.actual, end_pos));

    insert_analysis(&mut ns, "", Some(&record.sequences));
    insert_analysis(&mut ns, "forward_max", record.forward_max.as_ref());
    insert_analysis(&mut ns, "forward_min", record.forward_min.as_ref());

    insert_exit(&mut ns, "", &record.take_profit);
    insert_exit(&mut ns, "stop_", &record.stop_loss);

    ns.insert("forward_n_max".to_string(), value(&record.forward_n_max));
    ns.insert(
        "n_max_is_window_max".to_string(),
        record.n_max_is_window_max.map(bool_value),
    );

    for flag in &record.new_extremes {
        ns.insert(flag.kind.variable_name(flag.set), flag.hit.map(bool_value));
    }
    ns
}

/// The three exit candidates bound as `INC`, `AGE`, `AGS`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExitCandidates {
    pub increment: Option<ExitCandidate>,
    pub after_gt_end: Option<ExitCandidate>,
    pub after_gt_start: Option<ExitCandidate>,
}

impl ExitCandidates {
    pub fn get(&self, kind: ExitKind) -> Option<ExitCandidate> {
        match kind {
            ExitKind::Increment => self.increment,
            ExitKind::AbsoluteRatio => self.after_gt_end,
            ExitKind::RelativeRatio => self.after_gt_start,
        }
    }
}

impl Namespace for ExitCandidates {
    fn lookup(&self, name: &str) -> Option<Value> {
        let kind = ExitKind::from_dsl_name(name)?;
        Some(Value::Handle {
            id: kind.dsl_name(),
            value: self.get(kind).map(|c| c.value()),
        })
    }

    fn attribute(&self, name: &str, attr: &str) -> Option<Value> {
        let candidate = self.get(ExitKind::from_dsl_name(name)?);
        match attr {
            "value" => Some(Value::Number(candidate.map(|c| c.value()))),
            "days" => Some(Value::Number(candidate.map(|c| c.days() as f64))),
            _ => None,
        }
    }
}
