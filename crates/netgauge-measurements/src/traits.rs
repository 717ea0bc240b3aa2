//! Measurement traits

use async_trait::async_trait;
use netgauge_common::results::Record;

/// A measurement that can be executed.
///
/// `measure` never fails at the language level: every probe failure is
/// classified into a `MeasurementError` inside one of the returned
/// records.
#[async_trait]
pub trait Measurement: Send + Sync {
    /// Execute the measurement and return the batch of result records.
    async fn measure(&self) -> Vec<Record>;
}
