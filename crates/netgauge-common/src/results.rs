//! Typed measurement result records.
//!
//! Every record carries the caller-supplied `id` and an `errors` list.
//! The invariant across the whole toolkit: `errors` is non-empty exactly
//! when every domain field is `None`. Failure constructors (`failed`)
//! are the only way an error enters a record, which keeps the invariant
//! by construction.

use crate::units::{
    Availability, NetworkUnit, RatioUnit, SignalFrequencyUnit, SignalPowerUnit, StorageUnit,
    TimeUnit,
};
use serde::{Deserialize, Serialize};

/// A classified measurement failure.
///
/// `key` is a stable hyphenated identifier namespaced per plugin
/// ("wget-timeout", "scan-regex", ...). `description` is looked up from
/// the plugin's static table and defaults to empty for unknown keys.
/// `traceback` carries the offending raw output, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementError {
    pub key: String,
    pub description: String,
    pub traceback: Option<String>,
}

impl MeasurementError {
    /// Build an error, resolving the description from a `(key, text)` table.
    pub fn from_table(
        key: &str,
        table: &[(&str, &str)],
        traceback: Option<String>,
    ) -> Self {
        let description = table
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, d)| (*d).to_string())
            .unwrap_or_default();
        Self {
            key: key.to_string(),
            description,
            traceback,
        }
    }
}

/// Download-speed probe outcome (wget summary line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadSpeedResult {
    pub id: String,
    pub url: Option<String>,
    pub download_rate: Option<f64>,
    pub download_rate_unit: Option<NetworkUnit>,
    pub download_size: Option<f64>,
    pub download_size_unit: Option<StorageUnit>,
    pub errors: Vec<MeasurementError>,
}

impl DownloadSpeedResult {
    pub fn failed(id: &str, url: Option<&str>, error: MeasurementError) -> Self {
        Self {
            id: id.to_string(),
            url: url.map(str::to_string),
            download_rate: None,
            download_rate_unit: None,
            download_size: None,
            download_size_unit: None,
            errors: vec![error],
        }
    }
}

/// Round-trip latency probe outcome (ping summary lines).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyResult {
    pub id: String,
    pub host: Option<String>,
    pub minimum_latency: Option<f64>,
    pub average_latency: Option<f64>,
    pub maximum_latency: Option<f64>,
    pub median_deviation: Option<f64>,
    pub packets_transmitted: Option<u32>,
    pub packets_received: Option<u32>,
    pub packet_loss: Option<f64>,
    pub packet_loss_unit: Option<RatioUnit>,
    pub elapsed_time: Option<f64>,
    pub elapsed_time_unit: Option<TimeUnit>,
    pub errors: Vec<MeasurementError>,
}

impl LatencyResult {
    pub fn failed(id: &str, host: Option<&str>, error: MeasurementError) -> Self {
        Self {
            id: id.to_string(),
            host: host.map(str::to_string),
            minimum_latency: None,
            average_latency: None,
            maximum_latency: None,
            median_deviation: None,
            packets_transmitted: None,
            packets_received: None,
            packet_loss: None,
            packet_loss_unit: None,
            elapsed_time: None,
            elapsed_time_unit: None,
            errors: vec![error],
        }
    }
}

/// Layered reachability outcome: device, router, raw internet, internet
/// via DNS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternetAvailabilityResult {
    pub id: String,
    pub internet_with_dns: Option<Availability>,
    pub internet: Option<Availability>,
    pub router: Option<Availability>,
    pub device: Option<Availability>,
    pub errors: Vec<MeasurementError>,
}

impl InternetAvailabilityResult {
    pub fn failed(id: &str, error: MeasurementError) -> Self {
        Self {
            id: id.to_string(),
            internet_with_dns: None,
            internet: None,
            router: None,
            device: None,
            errors: vec![error],
        }
    }
}

/// One wireless cell from an iwlist scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPointResult {
    pub id: String,
    pub channel: Option<i64>,
    pub frequency: Option<f64>,
    pub frequency_unit: Option<SignalFrequencyUnit>,
    pub quality: Option<String>,
    pub signal_level: Option<f64>,
    pub signal_level_unit: Option<SignalPowerUnit>,
    pub essid: Option<String>,
    pub bssid: Option<String>,
    pub standard: Option<String>,
    pub bitrates: Option<Vec<String>>,
    pub last_beacon: Option<i64>,
    pub errors: Vec<MeasurementError>,
}

impl AccessPointResult {
    pub fn failed(id: &str, error: MeasurementError) -> Self {
        Self {
            id: id.to_string(),
            channel: None,
            frequency: None,
            frequency_unit: None,
            quality: None,
            signal_level: None,
            signal_level_unit: None,
            essid: None,
            bssid: None,
            standard: None,
            bitrates: None,
            last_beacon: None,
            errors: vec![error],
        }
    }
}

/// The currently associated access point, from iwconfig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedAccessPointResult {
    pub id: String,
    pub essid: Option<String>,
    pub bssid: Option<String>,
    pub frequency: Option<f64>,
    pub frequency_unit: Option<SignalFrequencyUnit>,
    pub bitrate: Option<f64>,
    pub bitrate_unit: Option<NetworkUnit>,
    pub tx_power: Option<f64>,
    pub tx_power_unit: Option<SignalPowerUnit>,
    pub link_quality: Option<String>,
    pub signal_level: Option<f64>,
    pub signal_level_unit: Option<SignalPowerUnit>,
    pub errors: Vec<MeasurementError>,
}

impl ConnectedAccessPointResult {
    pub fn failed(id: &str, error: MeasurementError) -> Self {
        Self {
            id: id.to_string(),
            essid: None,
            bssid: None,
            frequency: None,
            frequency_unit: None,
            bitrate: None,
            bitrate_unit: None,
            tx_power: None,
            tx_power_unit: None,
            link_quality: None,
            signal_level: None,
            signal_level_unit: None,
            errors: vec![error],
        }
    }
}

/// Webpage fetch outcome: the page plus its static assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebpageResult {
    pub id: String,
    pub url: Option<String>,
    pub download_rate: Option<f64>,
    pub download_rate_unit: Option<NetworkUnit>,
    pub download_size: Option<f64>,
    pub download_size_unit: Option<StorageUnit>,
    pub asset_count: Option<u32>,
    pub failed_asset_downloads: Option<u32>,
    pub elapsed_time: Option<f64>,
    pub elapsed_time_unit: Option<TimeUnit>,
    pub errors: Vec<MeasurementError>,
}

impl WebpageResult {
    pub fn failed(id: &str, url: Option<&str>, error: MeasurementError) -> Self {
        Self {
            id: id.to_string(),
            url: url.map(str::to_string),
            download_rate: None,
            download_rate_unit: None,
            download_size: None,
            download_size_unit: None,
            asset_count: None,
            failed_asset_downloads: None,
            elapsed_time: None,
            elapsed_time_unit: None,
            errors: vec![error],
        }
    }
}

/// One hop of a traced route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteHop {
    pub hop: u32,
    /// Responding address, `None` when the hop only answered with `*`.
    pub address: Option<String>,
}

/// Traceroute outcome against the winning candidate host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpRouteResult {
    pub id: String,
    pub host: Option<String>,
    pub ip: Option<String>,
    pub hop_count: Option<u32>,
    pub trace: Option<Vec<RouteHop>>,
    pub errors: Vec<MeasurementError>,
}

impl IpRouteResult {
    pub fn failed(id: &str, host: Option<&str>, error: MeasurementError) -> Self {
        Self {
            id: id.to_string(),
            host: host.map(str::to_string),
            ip: None,
            hop_count: None,
            trace: None,
            errors: vec![error],
        }
    }
}

/// A heterogeneous batch entry: plugins return mixed record kinds from a
/// single `measure()` call (e.g. a download result followed by the
/// latency probes that ranked the candidates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    DownloadSpeed(DownloadSpeedResult),
    Latency(LatencyResult),
    InternetAvailability(InternetAvailabilityResult),
    AccessPoint(AccessPointResult),
    ConnectedAccessPoint(ConnectedAccessPointResult),
    Webpage(WebpageResult),
    IpRoute(IpRouteResult),
}

impl Record {
    /// The errors attached to the inner record, whatever its kind.
    pub fn errors(&self) -> &[MeasurementError] {
        match self {
            Record::DownloadSpeed(r) => &r.errors,
            Record::Latency(r) => &r.errors,
            Record::InternetAvailability(r) => &r.errors,
            Record::AccessPoint(r) => &r.errors,
            Record::ConnectedAccessPoint(r) => &r.errors,
            Record::Webpage(r) => &r.errors,
            Record::IpRoute(r) => &r.errors,
        }
    }
}
