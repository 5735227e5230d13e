pub mod context;
pub mod states;
pub mod transitions;

pub use context::*;
pub use states::*;
pub use transitions::*;

use crate::{
    error::{EngineError, FormulaError},
    models::{BatchMetrics, BatchResult, EngineParams, MatrixPair, StockRecord},
    utils::{
        evaluate_end_position, log_partition, log_state_transition, run_partition, Logger, PartitionOutput, Timer,
    },
};
use futures::stream::{FuturesUnordered, StreamExt};
use std::{ops::Range, sync::Arc};

/// Kernel invoked once per partition on the blocking pool.
pub type PartitionRunner =
    Arc<dyn Fn(&BatchInputs, Range<usize>) -> Result<PartitionOutput, EngineError> + Send + Sync>;

/// Batch dispatcher: preflight, partitioning, fan-out, merge and selection
/// for one batch call.
pub struct BatchDispatcher {
    state: DispatchState,
    transition_history: Vec<TransitionLog>,
    runner: PartitionRunner,
    logger: Logger,
}

impl BatchDispatcher {
    pub fn new() -> Self {
        Self::with_runner(Arc::new(run_partition))
    }

    /// Dispatcher with a custom partition kernel.
    pub fn with_runner(runner: PartitionRunner) -> Self {
        Self {
            state: DispatchState::Idle,
            transition_history: Vec::new(),
            runner,
            logger: Logger::new("DISPATCHER"),
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn transition_history(&self) -> &[TransitionLog] {
        &self.transition_history
    }

    /// Validate inputs, select the inclusive end-date range and run the batch.
    pub async fn dispatch(
        &mut self,
        pair: MatrixPair,
        params: EngineParams,
        start_label: &str,
        end_label: &str,
    ) -> Result<BatchResult, EngineError> {
        self.reset();
        let inputs = BatchInputs::compile(pair, params)?.with_end_range(start_label, end_label)?;
        self.dispatch_prepared(Arc::new(inputs)).await
    }

    /// Run a batch over inputs that already passed preflight.
    pub async fn dispatch_prepared(&mut self, inputs: Arc<BatchInputs>) -> Result<BatchResult, EngineError> {
        self.reset();
        let timer = Timer::start("batch");
        let batch_id = uuid::Uuid::new_v4().to_string();

        let ranges = partition_ranges(inputs.num_stocks(), inputs.partition_count());
        self.transition(
            DispatchState::Partitioned,
            &format!(
                "{} stocks into {} partitions, {} end dates",
                inputs.num_stocks(),
                ranges.len(),
                inputs.end_positions.len()
            ),
        );

        let mut pending = FuturesUnordered::new();
        for range in ranges.iter().cloned() {
            let inputs = Arc::clone(&inputs);
            let runner = Arc::clone(&self.runner);
            let bounds = range.clone();
            pending.push(async move {
                let joined = tokio::task::spawn_blocking(move || runner(&inputs, range)).await;
                (bounds, joined)
            });
        }
        self.transition(
            DispatchState::Dispatched,
            &format!("{} partition tasks submitted", ranges.len()),
        );

        self.transition(DispatchState::Merging, "collecting partitions in completion order");
        let mut records = DateBuckets::new();
        for label in inputs.end_labels() {
            records.insert(label, Vec::new());
        }

        let mut failed_partitions = 0;
        let mut formula_errors = 0;
        let mut first_formula_error: Option<FormulaError> = None;
        let mut record_count = 0;

        while let Some((bounds, joined)) = pending.next().await {
            match joined {
                Ok(Ok(output)) => {
                    formula_errors += output.formula_errors;
                    if first_formula_error.is_none() {
                        first_formula_error = output.first_formula_error;
                    }
                    let merged = merge_partition(&mut records, output.buckets);
                    record_count += merged;
                    log_partition(&format!("{:?} merged {} records", bounds, merged));
                }
                Ok(Err(e)) => {
                    failed_partitions += 1;
                    self.logger
                        .error_with_error(&format!("Partition {:?} failed, contributing no records", bounds), &e);
                }
                Err(join_error) => {
                    failed_partitions += 1;
                    self.logger.error(&format!(
                        "Partition {:?} aborted ({}), contributing no records",
                        bounds, join_error
                    ));
                }
            }
        }

        if let Some(e) = &first_formula_error {
            self.logger.warn(&format!(
                "{} records scored 0 after formula errors, first: {}",
                formula_errors, e
            ));
        }

        if let Some(selection) = &inputs.params.selection {
            self.transition(
                DispatchState::Selecting,
                &format!("top {} by {:?} per end date", selection.count, selection.mode),
            );
            select_all(&mut records, selection);
        }

        let calculation_time_ms = timer.elapsed_ms();
        self.transition(
            DispatchState::Done,
            &format!("{} records in {:.1}ms", record_count, calculation_time_ms),
        );

        let labels = inputs.end_labels();
        Ok(BatchResult {
            shift_days: inputs.params.window.shift_days,
            is_forward: inputs.params.window.is_forward,
            start_date: labels.first().cloned().unwrap_or_default(),
            end_date: labels.last().cloned().unwrap_or_default(),
            metrics: BatchMetrics {
                batch_id,
                calculation_time_ms,
                stock_count: inputs.num_stocks(),
                date_count: labels.len(),
                record_count,
                partition_count: ranges.len(),
                failed_partitions,
                formula_errors,
            },
            records,
        })
    }

    fn reset(&mut self) {
        self.state = DispatchState::Idle;
        self.transition_history.clear();
    }

    fn transition(&mut self, to: DispatchState, reason: &str) {
        let from = self.state;
        if !DispatchTransitions::is_valid_transition(from, to) {
            self.logger
                .warn(&format!("Unexpected transition {} -> {}", from, to));
        }
        log_state_transition(from.as_str(), to.as_str(), reason);
        self.transition_history
            .push(TransitionLog::new(from.as_str(), to.as_str(), reason));
        self.state = to;
    }
}

impl Default for BatchDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate every stock at one end date on the calling thread, in stock
/// order. Formula errors degrade the affected scores to 0.
pub fn evaluate_single_date(inputs: &BatchInputs, end_label: &str) -> Result<Vec<StockRecord>, EngineError> {
    let end = inputs.position_of(end_label)?;
    inputs.check_history(end)?;

    let (records, errors) = evaluate_end_position(inputs, end);
    if let Some(e) = errors.first() {
        Logger::new("SINGLE_DATE").warn(&format!(
            "{} records scored 0 after formula errors, first: {}",
            errors.len(),
            e
        ));
    }
    Ok(records)
}
