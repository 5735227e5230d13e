use crate::error::EngineError;
use crate::formula::{exported_flag, known_variables, ExitSelector, ScoreFormula};
use crate::models::{EngineParams, MatrixPair, SelectionConfig};
use crate::utils::{log_preflight, new_extreme::enabled_kinds, Logger};

/// Read-only inputs shared by every partition of one batch.
///
/// Built by preflight: parameters are validated, stop-loss rates clamped and
/// every formula compiled before any partition runs.
#[derive(Debug, Clone)]
pub struct BatchInputs {
    pub pair: MatrixPair,
    pub params: EngineParams,
    pub formula: ScoreFormula,
    pub take_profit_selector: ExitSelector,
    pub stop_loss_selector: ExitSelector,
    /// End positions to evaluate, oldest first
    pub end_positions: Vec<usize>,
}

impl BatchInputs {
    /// Validate matrices and parameters and compile formulas. No end dates
    /// are selected yet.
    pub fn compile(pair: MatrixPair, mut params: EngineParams) -> Result<Self, EngineError> {
        let logger = Logger::new("PREFLIGHT");

        if pair.price.shape != pair.diff.shape {
            return Err(EngineError::MatrixMisaligned {
                price_rows: pair.price.shape.0,
                price_cols: pair.price.shape.1,
                diff_rows: pair.diff.shape.0,
                diff_cols: pair.diff.shape.1,
            });
        }
        if pair.price.num_dates() == 0 {
            return Err(EngineError::invalid("matrix", "no date columns"));
        }
        if let Some(SelectionConfig { count: 0, .. }) = params.selection {
            return Err(EngineError::invalid("selection.count", "must be at least 1"));
        }
        if params.n_proc == 0 {
            logger.warn("n_proc is 0, using 1");
            params.n_proc = 1;
        }

        let (stop_loss, clamped) = params.stop_loss.clamped_for_stop_loss();
        if !clamped.is_empty() {
            logger.warn(&format!(
                "Stop-loss rates must not be positive, clamped to 0: {}",
                clamped.join(", ")
            ));
        }
        params.stop_loss = stop_loss;

        let known = known_variables(&params.new_extreme);
        let formula = ScoreFormula::compile(&params.formula, &known)
            .map_err(|source| EngineError::Formula { field: "formula", source })?;
        let take_profit_selector = ExitSelector::compile(&params.take_profit.expr)
            .map_err(|source| EngineError::Formula {
                field: "take_profit.expr",
                source,
            })?;
        let stop_loss_selector = ExitSelector::compile(&params.stop_loss.expr)
            .map_err(|source| EngineError::Formula {
                field: "stop_loss.expr",
                source,
            })?;

        for (i, set) in params.new_extreme.iter().enumerate() {
            let kinds = enabled_kinds(set);
            if kinds.len() > 1 {
                logger.info(&format!(
                    "new_extreme[{}]: {} flags enabled, only {:?} is scored",
                    i + 1,
                    kinds.len(),
                    kinds[0]
                ));
            }
        }

        log_preflight(&format!(
            "{} stocks x {} dates, width {}, formula {}",
            pair.price.num_stocks(),
            pair.price.num_dates(),
            params.window.width,
            if formula.is_empty() { "<none>" } else { formula.source() }
        ));

        Ok(Self {
            pair,
            params,
            formula,
            take_profit_selector,
            stop_loss_selector,
            end_positions: Vec::new(),
        })
    }

    /// Select the inclusive end-date range. Labels may come in either order.
    pub fn with_end_range(mut self, first: &str, second: &str) -> Result<Self, EngineError> {
        let a = self.position_of(first)?;
        let b = self.position_of(second)?;
        let (newest, oldest) = (a.min(b), a.max(b));

        self.check_history(oldest)?;
        self.end_positions = (newest..=oldest).rev().collect();
        Ok(self)
    }

    /// Select a single end date.
    pub fn with_end_date(self, label: &str) -> Result<Self, EngineError> {
        self.with_end_range(label, label)
    }

    pub fn position_of(&self, label: &str) -> Result<usize, EngineError> {
        self.pair
            .price
            .position(label)
            .ok_or_else(|| EngineError::UnknownDate(label.to_string()))
    }

    /// The window and every look-back interval in use must fit inside the
    /// row for the oldest requested end position. Sets whose scored flag is
    /// an `after_*` kind only read newer columns and need no extra history.
    pub fn check_history(&self, end_position: usize) -> Result<(), EngineError> {
        let available = self.pair.price.num_dates();
        let end_date = self.pair.price.dates[end_position].clone();
        let start = end_position + self.params.window.width;

        if start >= available {
            return Err(EngineError::InsufficientHistory {
                parameter: "window.width".to_string(),
                end_date,
                required: self.params.window.width + 1,
                available: available - end_position,
            });
        }

        for (i, set) in self.params.new_extreme.iter().enumerate() {
            if !exported_flag(set).is_some_and(|kind| kind.is_before()) {
                continue;
            }
            if start + set.required_history() > available {
                return Err(EngineError::InsufficientHistory {
                    parameter: format!("new_extreme[{}]", i + 1),
                    end_date,
                    required: self.params.window.width + set.required_history(),
                    available: available - end_position,
                });
            }
        }
        Ok(())
    }

    pub fn num_stocks(&self) -> usize {
        self.pair.price.num_stocks()
    }

    /// Labels of the selected end dates, oldest first.
    pub fn end_labels(&self) -> Vec<String> {
        self.end_positions
            .iter()
            .map(|p| self.pair.price.dates[*p].clone())
            .collect()
    }

    /// Partition count after clamping to cores and stocks.
    pub fn partition_count(&self) -> usize {
        let stocks = self.num_stocks();
        let ceiling = num_cpus::get().min(stocks).max(1);
        self.params.n_proc.clamp(1, ceiling)
    }
}

/// One recorded dispatcher transition.
#[derive(Debug, Clone)]
pub struct TransitionLog {
    pub from: String,
    pub to: String,
    pub reason: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl TransitionLog {
    pub fn new(from: &str, to: &str, reason: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
            timestamp: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormulaError;
    use crate::models::{NewExtremeParams, StockMatrix};

    fn pair(dates: usize) -> MatrixPair {
        let labels: Vec<String> = (0..dates).map(|i| format!("2024-03-{:02}", 28 - i)).collect();
        let row: Vec<Option<f64>> = (0..dates).map(|i| Some(10.0 + i as f64)).collect();
        let price = StockMatrix::new(vec!["AAA".into()], vec!["Alpha".into()], labels.clone(), vec![row.clone()]).unwrap();
        let diff = StockMatrix::new(vec!["AAA".into()], vec!["Alpha".into()], labels, vec![row]).unwrap();
        MatrixPair::new(price, diff).unwrap()
    }

    fn params(width: usize) -> EngineParams {
        let mut p = EngineParams::default();
        p.window.width = width;
        p
    }

    #[test]
    fn test_end_range_either_order() {
        let inputs = BatchInputs::compile(pair(10), params(3)).unwrap();
        let inputs = inputs.with_end_range("2024-03-26", "2024-03-28").unwrap();
        assert_eq!(inputs.end_positions, vec![2, 1, 0]);
        assert_eq!(inputs.end_labels(), vec!["2024-03-26", "2024-03-27", "2024-03-28"]);
    }

    #[test]
    fn test_unknown_date() {
        let inputs = BatchInputs::compile(pair(5), params(1)).unwrap();
        assert!(matches!(
            inputs.with_end_date("2020-01-01"),
            Err(EngineError::UnknownDate(_))
        ));
    }

    #[test]
    fn test_window_exceeding_history() {
        let inputs = BatchInputs::compile(pair(5), params(4)).unwrap();
        // position 0 + 4 = 4 fits
        assert!(inputs.clone().with_end_date("2024-03-28").is_ok());
        match inputs.with_end_date("2024-03-27") {
            Err(EngineError::InsufficientHistory { parameter, .. }) => assert_eq!(parameter, "window.width"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_new_extreme_history_check() {
        let mut p = params(2);
        p.new_extreme[1] = NewExtremeParams {
            start_offset: 1,
            range_span: 3,
            widen_span: 1,
            before_high: true,
            ..NewExtremeParams::default()
        };
        let inputs = BatchInputs::compile(pair(8), p).unwrap();
        // start 3 needs 3 + 5 <= 8, start 4 does not fit
        assert!(inputs.clone().with_end_date("2024-03-27").is_ok());
        match inputs.with_end_date("2024-03-26") {
            Err(EngineError::InsufficientHistory { parameter, .. }) => assert_eq!(parameter, "new_extreme[2]"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_after_flags_need_no_look_back() {
        let mut p = params(2);
        p.new_extreme[0] = NewExtremeParams {
            start_offset: 1,
            range_span: 3,
            widen_span: 1,
            after_low: true,
            ..NewExtremeParams::default()
        };
        let inputs = BatchInputs::compile(pair(8), p).unwrap();
        // start 5 leaves 2 older columns, enough for the window alone
        assert!(inputs.with_end_date("2024-03-25").is_ok());
    }

    #[test]
    fn test_formula_errors_abort_preflight() {
        let mut p = params(1);
        p.formula = "if nope > 1: result = 1".into();
        match BatchInputs::compile(pair(4), p) {
            Err(EngineError::Formula { field, source }) => {
                assert_eq!(field, "formula");
                assert_eq!(source, FormulaError::UnknownVariable("nope".into()));
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut p = params(1);
        p.take_profit.expr = "result = INC * 2".into();
        assert!(matches!(
            BatchInputs::compile(pair(4), p),
            Err(EngineError::Formula { field: "take_profit.expr", .. })
        ));
    }

    #[test]
    fn test_stop_loss_clamped_and_partitions_bounded() {
        let mut p = params(1);
        p.stop_loss.inc_rate = 0.5;
        p.n_proc = 64;
        let inputs = BatchInputs::compile(pair(4), p).unwrap();
        assert_eq!(inputs.params.stop_loss.inc_rate, 0.0);
        // a single stock never gets more than one partition
        assert_eq!(inputs.partition_count(), 1);
    }
}
