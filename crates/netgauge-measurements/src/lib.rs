//! Measurement plugins for netgauge

pub mod download_speed;
pub mod internet_availability;
pub mod ip_route;
pub mod latency;
pub mod parser;
pub mod race;
pub mod runner;
pub mod traits;
pub mod validate;
pub mod webpage;
pub mod wifi;

#[cfg(test)]
pub(crate) mod testing;

pub use download_speed::DownloadSpeedMeasurement;
pub use internet_availability::InternetAvailabilityMeasurement;
pub use ip_route::IpRouteMeasurement;
pub use latency::LatencyMeasurement;
pub use traits::Measurement;
pub use webpage::WebpageMeasurement;
pub use wifi::AccessPointMeasurement;
