//! Common types and utilities for netgauge
//!
//! This crate provides the shared vocabulary of the toolkit:
//! - Unit enumerations with string-keyed construction
//! - Result records and the classified `MeasurementError`
//! - Configuration management
//! - Logging infrastructure
//! - Validation error types

pub mod config;
pub mod error;
pub mod logging;
pub mod results;
pub mod units;

pub use config::*;
pub use error::{Error, Result};
pub use results::*;
pub use units::*;

/// Version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
