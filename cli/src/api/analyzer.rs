//! High-level window analyzer for easy library usage

use crate::error::{EngineError, FormulaError};
use crate::formula::{known_variables, ExitSelector, ScoreFormula};
use crate::models::{BatchResult, EngineParams, MatrixPair, StockRecord};
use crate::state_machine::{evaluate_single_date, BatchDispatcher, BatchInputs};
use crate::utils::Logger;

/// High-level interface over the batch dispatcher
///
/// Holds one parameter bundle and runs it against any matrix pair.
#[derive(Debug, Clone)]
pub struct WindowAnalyzer {
    params: EngineParams,
    logger: Logger,
}

impl WindowAnalyzer {
    pub fn new(params: EngineParams) -> Self {
        Self {
            params,
            logger: Logger::new("ANALYZER"),
        }
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Run a batch over the inclusive end-date range
    ///
    /// # Arguments
    /// * `pair` - Row-aligned price and diff matrices
    /// * `start_label`, `end_label` - End-date range, either order
    ///
    /// # Returns
    /// Records per end date plus echoed window settings and batch metrics
    pub async fn run_batch(
        &self,
        pair: MatrixPair,
        start_label: &str,
        end_label: &str,
    ) -> Result<BatchResult, EngineError> {
        let mut dispatcher = BatchDispatcher::new();
        let result = dispatcher
            .dispatch(pair, self.params.clone(), start_label, end_label)
            .await?;
        self.logger.info(&format!(
            "Batch {} done: {} records over {} dates",
            result.metrics.batch_id, result.metrics.record_count, result.metrics.date_count
        ));
        Ok(result)
    }

    /// Recompute every stock at one end date on the calling thread
    pub fn evaluate_single_date(&self, pair: MatrixPair, end_label: &str) -> Result<Vec<StockRecord>, EngineError> {
        let inputs = BatchInputs::compile(pair, self.params.clone())?;
        evaluate_single_date(&inputs, end_label)
    }

    /// Compile the score formula and both exit selectors without running anything
    pub fn check_formula(&self) -> Result<(), FormulaError> {
        ScoreFormula::compile(&self.params.formula, &known_variables(&self.params.new_extreme))?;
        ExitSelector::compile(&self.params.take_profit.expr)?;
        ExitSelector::compile(&self.params.stop_loss.expr)?;
        Ok(())
    }
}

impl Default for WindowAnalyzer {
    fn default() -> Self {
        Self::new(EngineParams::default())
    }
}
