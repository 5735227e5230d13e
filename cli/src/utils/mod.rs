pub mod date;
pub mod exit_condition;
pub mod logger;
pub mod matrix_utils;
pub mod new_extreme;
pub mod numeric;
pub mod run_accumulation;
pub mod valid_sequence;
pub mod window_reference;

pub use date::*;
pub use exit_condition::*;
pub use logger::*;
pub use matrix_utils::*;
pub use new_extreme::{detect_all, enabled_kinds};
pub use numeric::*;
pub use run_accumulation::*;
pub use valid_sequence::*;
pub use window_reference::*;
