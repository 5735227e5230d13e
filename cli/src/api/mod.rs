//! High-level API for easy library usage
//!
//! This module provides simplified interfaces for configuring and running
//! window scans.

pub mod analyzer;
pub mod builder;

pub use analyzer::WindowAnalyzer;
pub use builder::EngineParamsBuilder;
