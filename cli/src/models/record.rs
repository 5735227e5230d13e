use crate::models::StockIdentity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A resolved (date, value) point inside a price row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub position: usize,
    pub date: String,
    pub value: f64,
}

/// Reference points of one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowReferences {
    pub end: Option<ReferencePoint>,
    pub start: Option<ReferencePoint>,
    pub max: Option<ReferencePoint>,
    pub min: Option<ReferencePoint>,
    pub closest: Option<ReferencePoint>,
    /// Reference selected by the start option before shifting
    pub base: Option<ReferencePoint>,
    /// Reference after applying `shift_days`
    pub actual: Option<ReferencePoint>,
}

/// Positional and signed aggregates over one sequence. Sums are rounded to
/// 2 decimals. The empty sequence yields all zeros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceStats {
    pub len: usize,
    pub sum: f64,
    pub abs_sum: f64,
    pub pos_sum: f64,
    pub neg_sum: f64,
    pub first_half: f64,
    pub second_half: f64,
    pub block1: f64,
    pub block2: f64,
    pub block3: f64,
    pub block4: f64,
}

/// Runs, valid sequence and their aggregates for one sub-window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceAnalysis {
    pub continuous: Vec<f64>,
    pub continuous_stats: SequenceStats,
    pub valid: Vec<f64>,
    pub valid_stats: SequenceStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitKind {
    Increment,
    AbsoluteRatio,
    RelativeRatio,
}

impl ExitKind {
    /// Name the selection DSL binds this rule to.
    pub fn dsl_name(&self) -> &'static str {
        match self {
            ExitKind::Increment => "INC",
            ExitKind::AbsoluteRatio => "AGE",
            ExitKind::RelativeRatio => "AGS",
        }
    }

    pub fn from_dsl_name(name: &str) -> Option<Self> {
        match name {
            "INC" => Some(ExitKind::Increment),
            "AGE" => Some(ExitKind::AbsoluteRatio),
            "AGS" => Some(ExitKind::RelativeRatio),
            _ => None,
        }
    }
}

/// Exit price found by one of the three rules, with its distance in days
/// from the end date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExitCandidate {
    Increment { value: f64, days: usize },
    AbsoluteRatio { value: f64, days: usize },
    RelativeRatio { value: f64, days: usize },
}

impl ExitCandidate {
    pub fn new(kind: ExitKind, value: f64, days: usize) -> Self {
        match kind {
            ExitKind::Increment => ExitCandidate::Increment { value, days },
            ExitKind::AbsoluteRatio => ExitCandidate::AbsoluteRatio { value, days },
            ExitKind::RelativeRatio => ExitCandidate::RelativeRatio { value, days },
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            ExitCandidate::Increment { value, .. }
            | ExitCandidate::AbsoluteRatio { value, .. }
            | ExitCandidate::RelativeRatio { value, .. } => value,
        }
    }

    pub fn days(&self) -> usize {
        match *self {
            ExitCandidate::Increment { days, .. }
            | ExitCandidate::AbsoluteRatio { days, .. }
            | ExitCandidate::RelativeRatio { days, .. } => days,
        }
    }
}

/// Outcome of one exit rule set (take-profit or stop-loss).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExitOutcome {
    pub increment: Option<ExitCandidate>,
    pub increment_steps: usize,
    pub after_gt_end: Option<ExitCandidate>,
    pub after_gt_start: Option<ExitCandidate>,
    pub selected: Option<ExitKind>,
    pub ops_value: Option<f64>,
    pub hold_days: Option<usize>,
    pub ops_change: Option<f64>,
    pub adjust_days: Option<f64>,
    pub ops_incre_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtremeKind {
    BeforeHigh,
    BeforeLow,
    AfterHigh,
    AfterLow,
}

impl ExtremeKind {
    pub const GROUP_ORDER: [ExtremeKind; 4] = [
        ExtremeKind::BeforeHigh,
        ExtremeKind::BeforeLow,
        ExtremeKind::AfterHigh,
        ExtremeKind::AfterLow,
    ];

    pub fn variable_name(&self, set: usize) -> String {
        let base = match self {
            ExtremeKind::BeforeHigh => "new_before_high",
            ExtremeKind::BeforeLow => "new_before_low",
            ExtremeKind::AfterHigh => "new_after_high",
            ExtremeKind::AfterLow => "new_after_low",
        };
        format!("{}_{}", base, set)
    }

    pub fn is_high(&self) -> bool {
        matches!(self, ExtremeKind::BeforeHigh | ExtremeKind::AfterHigh)
    }

    pub fn is_before(&self) -> bool {
        matches!(self, ExtremeKind::BeforeHigh | ExtremeKind::BeforeLow)
    }
}

/// Result of the first enabled flag of one new-extreme set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewExtremeFlag {
    /// 1 or 2
    pub set: usize,
    pub kind: ExtremeKind,
    /// `None` when the interval or the start value is unavailable
    pub hit: Option<bool>,
}

/// One output record per (stock, end date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    #[serde(flatten)]
    pub identity: StockIdentity,
    pub end_date: String,
    pub references: WindowReferences,
    pub sequences: SequenceAnalysis,
    pub forward_max: Option<SequenceAnalysis>,
    pub forward_min: Option<SequenceAnalysis>,
    pub forward_n_max: Option<ReferencePoint>,
    pub n_max_is_window_max: Option<bool>,
    pub take_profit: ExitOutcome,
    pub stop_loss: ExitOutcome,
    pub new_extremes: Vec<NewExtremeFlag>,
    pub score: f64,
}

/// Per-batch counters and timings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchMetrics {
    pub batch_id: String,
    pub calculation_time_ms: f64,
    pub stock_count: usize,
    pub date_count: usize,
    pub record_count: usize,
    pub partition_count: usize,
    pub failed_partitions: usize,
    pub formula_errors: usize,
}

/// Result bundle of one batch call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub records: BTreeMap<String, Vec<StockRecord>>,
    pub shift_days: i64,
    pub is_forward: bool,
    pub start_date: String,
    pub end_date: String,
    pub metrics: BatchMetrics,
}

impl BatchResult {
    /// Short textual summary: per end date, record count and the leading
    /// codes with their scores.
    pub fn summary_lines(&self, top: usize) -> Vec<String> {
        self.records
            .iter()
            .rev()
            .map(|(date, records)| {
                let leaders = records
                    .iter()
                    .take(top)
                    .map(|r| format!("{}({:.2})", r.identity.code, r.score))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}: {} records [{}]", date, records.len(), leaders)
            })
            .collect()
    }
}
