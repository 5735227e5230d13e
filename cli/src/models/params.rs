use serde::{Deserialize, Serialize};

/// Which window point anchors the shifted "actual" comparison date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StartOption {
    #[default]
    StartValue,
    MaxValue,
    MinValue,
    ClosestValue,
}

impl std::str::FromStr for StartOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "start" | "startvalue" | "start_value" => Ok(StartOption::StartValue),
            "max" | "maxvalue" | "max_value" => Ok(StartOption::MaxValue),
            "min" | "minvalue" | "min_value" => Ok(StartOption::MinValue),
            "closest" | "closestvalue" | "closest_value" => Ok(StartOption::ClosestValue),
            other => Err(format!("unknown start option: {}", other)),
        }
    }
}

/// Sliding window configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowParameters {
    /// Trailing days behind the end date; the window holds `width + 1` columns
    pub width: usize,
    pub start_option: StartOption,
    /// Subtracted from the reference position (positive moves toward newer dates)
    pub shift_days: i64,
    pub is_forward: bool,
    pub n_days: usize,
}

impl Default for WindowParameters {
    fn default() -> Self {
        Self {
            width: 20,
            start_option: StartOption::StartValue,
            shift_days: 0,
            is_forward: false,
            n_days: 0,
        }
    }
}

/// Forward exit search rule. Used twice: take-profit (positive rates) and
/// stop-loss (non-positive rates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitRule {
    pub op_days: usize,
    pub inc_rate: f64,
    pub after_gt_end_ratio: f64,
    pub after_gt_start_ratio: f64,
    pub ops_change_input: f64,
    /// Selection snippet choosing among INC / AGE / AGS
    pub expr: String,
}

impl ExitRule {
    pub fn take_profit_default() -> Self {
        Self {
            op_days: 5,
            inc_rate: 0.03,
            after_gt_end_ratio: 0.05,
            after_gt_start_ratio: 0.02,
            ops_change_input: 0.0,
            expr: "result = INC".to_string(),
        }
    }

    pub fn stop_loss_default() -> Self {
        Self {
            op_days: 5,
            inc_rate: -0.03,
            after_gt_end_ratio: -0.05,
            after_gt_start_ratio: -0.02,
            ops_change_input: 0.0,
            expr: "result = INC".to_string(),
        }
    }

    /// Stop-loss rates must not be positive; offending rates are clamped to 0.
    /// Returns the clamped rule and the names of the rates that were clamped.
    pub fn clamped_for_stop_loss(&self) -> (Self, Vec<&'static str>) {
        let mut rule = self.clone();
        let mut clamped = Vec::new();
        if rule.inc_rate > 0.0 {
            rule.inc_rate = 0.0;
            clamped.push("inc_rate");
        }
        if rule.after_gt_end_ratio > 0.0 {
            rule.after_gt_end_ratio = 0.0;
            clamped.push("after_gt_end_ratio");
        }
        if rule.after_gt_start_ratio > 0.0 {
            rule.after_gt_start_ratio = 0.0;
            clamped.push("after_gt_start_ratio");
        }
        (rule, clamped)
    }
}

impl Default for ExitRule {
    fn default() -> Self {
        Self::take_profit_default()
    }
}

/// One new-high / new-low parameter set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewExtremeParams {
    pub start_offset: usize,
    pub range_span: usize,
    pub widen_span: usize,
    pub before_high: bool,
    pub before_low: bool,
    pub after_high: bool,
    pub after_low: bool,
}

impl NewExtremeParams {
    /// Columns needed behind the window start for the look-back interval.
    pub fn required_history(&self) -> usize {
        self.start_offset + self.range_span + self.widen_span
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionMode {
    #[default]
    Max,
    Min,
}

impl std::str::FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "max" => Ok(SelectionMode::Max),
            "min" => Ok(SelectionMode::Min),
            other => Err(format!("unknown selection mode: {}", other)),
        }
    }
}

/// Top-K cap applied per end date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    pub count: usize,
    pub mode: SelectionMode,
}

/// Full parameter bundle for one batch or single-date call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    pub window: WindowParameters,
    pub take_profit: ExitRule,
    pub stop_loss: ExitRule,
    pub new_extreme: [NewExtremeParams; 2],
    pub formula: String,
    pub n_proc: usize,
    pub selection: Option<SelectionConfig>,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            window: WindowParameters::default(),
            take_profit: ExitRule::take_profit_default(),
            stop_loss: ExitRule::stop_loss_default(),
            new_extreme: [NewExtremeParams::default(), NewExtremeParams::default()],
            formula: String::new(),
            n_proc: num_cpus::get(),
            selection: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_loss_clamps_positive_rates() {
        let rule = ExitRule {
            inc_rate: 0.02,
            after_gt_end_ratio: -0.05,
            after_gt_start_ratio: 0.01,
            ..ExitRule::stop_loss_default()
        };
        let (clamped, names) = rule.clamped_for_stop_loss();
        assert_eq!(clamped.inc_rate, 0.0);
        assert_eq!(clamped.after_gt_end_ratio, -0.05);
        assert_eq!(clamped.after_gt_start_ratio, 0.0);
        assert_eq!(names, vec!["inc_rate", "after_gt_start_ratio"]);
    }

    #[test]
    fn test_params_deserialize_with_defaults() {
        let params: EngineParams =
            serde_yaml::from_str("window:\n  width: 10\n  start_option: MaxValue\nn_proc: 2\n").unwrap();
        assert_eq!(params.window.width, 10);
        assert_eq!(params.window.start_option, StartOption::MaxValue);
        assert_eq!(params.n_proc, 2);
        assert_eq!(params.take_profit, ExitRule::take_profit_default());
    }

    #[test]
    fn test_start_option_from_str() {
        assert_eq!("closest".parse::<StartOption>().unwrap(), StartOption::ClosestValue);
        assert!("middle".parse::<StartOption>().is_err());
    }
}
