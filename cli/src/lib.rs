//! # windowscan - sliding-window signed-run analytics over stock matrices
//!
//! A Rust library for screening a universe of stocks over a range of end
//! dates:
//! - Signed-run accumulation and valid-sequence derivation per window
//! - Window reference points (start, max, min, closest, shifted actual)
//! - Take-profit / stop-loss exit search with a small selection DSL
//! - New-high / new-low detection against a look-back interval
//! - Score formulas evaluated per record and top-K selection per date
//! - A partitioned batch dispatcher running on the blocking thread pool
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use windowscan::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pair = CsvMatrixService::new().load("matrices.csv")?;
//!     let analyzer = EngineParamsBuilder::new()
//!         .with_width(20)
//!         .with_formula("if continuous_sum > 0: result = continuous_sum else: result = 0")
//!         .with_selection(10, SelectionMode::Max)
//!         .build_analyzer();
//!     let result = analyzer.run_batch(pair, "2024-03-01", "2024-03-29").await?;
//!     for line in result.summary_lines(5) {
//!         println!("{}", line);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod formula;
pub mod models;
pub mod services;
pub mod utils;

// Public API for easy library usage
pub mod api;

pub mod state_machine;

// Prelude for convenient imports
pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! ```rust
    //! use windowscan::prelude::*;
    //! ```

    pub use crate::api::{EngineParamsBuilder, WindowAnalyzer};
    pub use crate::error::{EngineError, FormulaError, LoadError};
    pub use crate::models::{
        BatchResult, EngineParams, ExitRule, MatrixPair, NewExtremeParams, SelectionConfig,
        SelectionMode, StartOption, StockMatrix, StockRecord, WindowParameters,
    };
    pub use crate::services::CsvMatrixService;
    pub use crate::state_machine::{evaluate_single_date, BatchDispatcher, BatchInputs};
}

// Re-export some commonly used utilities
pub use utils::{init_logger, Logger, Timer};
