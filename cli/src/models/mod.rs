pub mod matrix;
pub mod params;
pub mod record;

pub use matrix::*;
pub use params::*;
pub use record::*;
