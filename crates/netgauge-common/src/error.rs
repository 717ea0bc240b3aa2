//! Error types for netgauge

use thiserror::Error;

/// Construction-time validation failures.
///
/// These are the only errors a plugin surfaces as a plain `Result`:
/// everything that goes wrong during `measure()` is converted into a
/// `MeasurementError` inside the returned record instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("`{0}` is not a valid url")]
    InvalidUrl(String),

    #[error("`{0}` is not a valid host")]
    InvalidHost(String),

    #[error("at least one candidate host is required")]
    NoCandidates,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, Error>;
