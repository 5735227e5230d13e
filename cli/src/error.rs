//! Error types for the engine, the formula DSL and the CSV loader.

use thiserror::Error;

/// Pre-flight and configuration failures. These abort a batch before any
/// partition is dispatched.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Price and diff matrices are not aligned: price {price_rows}x{price_cols}, diff {diff_rows}x{diff_cols}")]
    MatrixMisaligned {
        price_rows: usize,
        price_cols: usize,
        diff_rows: usize,
        diff_cols: usize,
    },
    #[error("Matrix row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("Unknown end date: {0}")]
    UnknownDate(String),
    #[error("Insufficient history for {parameter}: needs {required} columns from end date {end_date}, only {available} available")]
    InsufficientHistory {
        parameter: String,
        end_date: String,
        required: usize,
        available: usize,
    },
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("Formula error in {field}: {source}")]
    Formula {
        field: &'static str,
        #[source]
        source: FormulaError,
    },
}

impl EngineError {
    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while parsing or evaluating formula text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("Formula syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Invalid exit selection: {0}")]
    InvalidSelection(String),
}

impl FormulaError {
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        FormulaError::Syntax {
            position,
            message: message.into(),
        }
    }
}

/// Errors raised while reading matrices from CSV files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("No blank sentinel column separating price and diff blocks")]
    MissingSentinel,
    #[error("Bad header: {0}")]
    BadHeader(String),
    #[error("Bad cell at row {row}, column {column}: {value:?}")]
    BadCell {
        row: usize,
        column: String,
        value: String,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
}
