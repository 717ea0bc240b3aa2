//! Access point measurements via the wireless-tools text interfaces.
//!
//! `iwlist {interface} scan` enumerates visible access points, one
//! record per cell. `iwconfig` reports the currently connected access
//! point. Both blobs are mined with independent per-field regexes, so
//! a cell missing a metric still yields a partial record; only a field
//! that matches but refuses its declared type fails the record.

use crate::parser::{scan_fields, FieldKind, FieldSpec};
use crate::runner::{CommandRunner, RunOutcome, SystemRunner};
use crate::traits::Measurement;
use async_trait::async_trait;
use netgauge_common::results::{
    AccessPointResult, ConnectedAccessPointResult, MeasurementError, Record,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const WIRELESS_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

static IWCONFIG_ESSID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"ESSID:"(?P<essid>.*)""#).expect("essid pattern"));
static IWCONFIG_BSSID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Access Point: (?P<bssid>\S*)").expect("bssid pattern"));
static IWCONFIG_FREQUENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Frequency:(?P<frequency>\d*.\d*)").expect("frequency pattern"));
static IWCONFIG_FREQUENCY_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Frequency:\d*.\d* (?P<frequency_unit>\w*)").expect("frequency unit pattern")
});
static IWCONFIG_BITRATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Bit Rate=(?P<bitrate>\d*.\d*)").expect("bitrate pattern"));
static IWCONFIG_BITRATE_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Bit Rate=\d*.\d* (?P<bitrate_unit>\w*/\w*)").expect("bitrate unit pattern")
});
static IWCONFIG_TX_POWER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Tx-Power=(?P<tx_power>\d*\.*\d*)").expect("tx power pattern"));
static IWCONFIG_TX_POWER_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Tx-Power=\d*\.*\d* (?P<tx_power_unit>\w*)").expect("tx power unit pattern")
});
static IWCONFIG_LINK_QUALITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Link Quality=(?P<link_quality>\d*/\d*)").expect("link quality pattern")
});
static IWCONFIG_SIGNAL_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Signal level=(?P<signal_level>-?\d*)").expect("signal level pattern")
});
static IWCONFIG_SIGNAL_LEVEL_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Signal level=-?\d* (?P<signal_level_unit>\w*)")
        .expect("signal level unit pattern")
});

static SCAN_CHANNEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Channel:(?P<channel>\d*)").expect("channel pattern"));
static SCAN_FREQUENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Frequency:(?P<frequency>\d*\.\d*) (?P<frequency_unit>\w*)")
        .expect("scan frequency pattern")
});
static SCAN_FREQUENCY_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Frequency:\d*\.\d* (?P<frequency_unit>\w*)").expect("scan frequency unit pattern")
});
static SCAN_QUALITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Quality=(?P<quality>\d*/\d*)").expect("quality pattern"));
static SCAN_SIGNAL_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Signal level=(?P<signal_level>-?\d*) (?P<signal_level_unit>\w*)")
        .expect("scan signal level pattern")
});
static SCAN_SIGNAL_LEVEL_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Signal level=-?\d* (?P<signal_level_unit>\w*)")
        .expect("scan signal level unit pattern")
});
static SCAN_ESSID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"ESSID:"(?P<essid>.*)""#).expect("scan essid pattern"));
static SCAN_BSSID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Address: (?P<bssid>\S*)").expect("scan bssid pattern"));
static SCAN_STANDARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<standard>IEEE .*)").expect("standard pattern"));
static SCAN_BITRATES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<bitrates>Bit Rates:.*(?:\n.*)*)Mode").expect("bitrates pattern")
});
static SCAN_LAST_BEACON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Last beacon: (?P<last_beacon>\d*)").expect("last beacon pattern"));

// Order decides which malformed field gets reported first.
static IWCONFIG_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "essid", pattern: &IWCONFIG_ESSID, kind: FieldKind::Text },
    FieldSpec { name: "bssid", pattern: &IWCONFIG_BSSID, kind: FieldKind::Text },
    FieldSpec { name: "frequency", pattern: &IWCONFIG_FREQUENCY, kind: FieldKind::Float },
    FieldSpec {
        name: "frequency_unit",
        pattern: &IWCONFIG_FREQUENCY_UNIT,
        kind: FieldKind::SignalFrequencyUnit,
    },
    FieldSpec { name: "bitrate", pattern: &IWCONFIG_BITRATE, kind: FieldKind::Float },
    FieldSpec {
        name: "bitrate_unit",
        pattern: &IWCONFIG_BITRATE_UNIT,
        kind: FieldKind::NetworkUnit,
    },
    FieldSpec { name: "tx_power", pattern: &IWCONFIG_TX_POWER, kind: FieldKind::Float },
    FieldSpec {
        name: "tx_power_unit",
        pattern: &IWCONFIG_TX_POWER_UNIT,
        kind: FieldKind::SignalPowerUnit,
    },
    FieldSpec { name: "link_quality", pattern: &IWCONFIG_LINK_QUALITY, kind: FieldKind::Text },
    FieldSpec { name: "signal_level", pattern: &IWCONFIG_SIGNAL_LEVEL, kind: FieldKind::Float },
    FieldSpec {
        name: "signal_level_unit",
        pattern: &IWCONFIG_SIGNAL_LEVEL_UNIT,
        kind: FieldKind::SignalPowerUnit,
    },
];

static SCAN_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "channel", pattern: &SCAN_CHANNEL, kind: FieldKind::Int },
    FieldSpec { name: "frequency", pattern: &SCAN_FREQUENCY, kind: FieldKind::Float },
    FieldSpec {
        name: "frequency_unit",
        pattern: &SCAN_FREQUENCY_UNIT,
        kind: FieldKind::SignalFrequencyUnit,
    },
    FieldSpec { name: "quality", pattern: &SCAN_QUALITY, kind: FieldKind::Text },
    FieldSpec { name: "signal_level", pattern: &SCAN_SIGNAL_LEVEL, kind: FieldKind::Float },
    FieldSpec {
        name: "signal_level_unit",
        pattern: &SCAN_SIGNAL_LEVEL_UNIT,
        kind: FieldKind::SignalPowerUnit,
    },
    FieldSpec { name: "essid", pattern: &SCAN_ESSID, kind: FieldKind::Text },
    FieldSpec { name: "bssid", pattern: &SCAN_BSSID, kind: FieldKind::Text },
    FieldSpec { name: "standard", pattern: &SCAN_STANDARD, kind: FieldKind::Text },
    FieldSpec { name: "bitrates", pattern: &SCAN_BITRATES, kind: FieldKind::BitrateList },
    FieldSpec { name: "last_beacon", pattern: &SCAN_LAST_BEACON, kind: FieldKind::Int },
];

pub(crate) const IWCONFIG_ERRORS: &[(&str, &str)] = &[
    ("iwconfig-err", "iwconfig had an unknown error."),
    ("iwconfig-none", "No valid metrics could be parsed from the iwconfig output"),
    ("iwconfig-regex", "Attempted to get the known regex format and failed."),
    ("iwconfig-timeout", "Measurement request timed out."),
    ("iwconfig-essid", "Could not process the essid regex."),
    ("iwconfig-bssid", "Could not process the bssid regex."),
    ("iwconfig-frequency", "Could not process the frequency regex."),
    ("iwconfig-frequency_unit", "Could not process the frequency unit regex."),
    ("iwconfig-bitrate", "Could not process the bitrate regex."),
    ("iwconfig-bitrate_unit", "Could not process the bitrate unit regex."),
    ("iwconfig-tx_power", "Could not process the tx_power regex."),
    ("iwconfig-tx_power_unit", "Could not process the tx_power unit regex."),
    ("iwconfig-link_quality", "Could not process the link_quality regex."),
    ("iwconfig-signal_level", "Could not process the signal_level regex."),
    ("iwconfig-signal_level_unit", "Could not process the signal_level unit regex."),
];

pub(crate) const SCAN_ERRORS: &[(&str, &str)] = &[
    ("scan-err", "scan had an unknown error."),
    ("scan-none", "No interfaces were able to find access points"),
    ("scan-split", "Attempted to split the result but it was in an unknown format."),
    ("scan-regex", "Attempted to get the known regex format and failed."),
    ("scan-timeout", "Measurement request timed out."),
    ("scan-channel", "Could not process the channel regex."),
    ("scan-frequency", "Could not process the frequency regex."),
    ("scan-frequency_unit", "Could not process the frequency unit regex."),
    ("scan-quality", "Could not process the quality regex."),
    ("scan-signal_level", "Could not process the signal level regex."),
    ("scan-signal_level_unit", "Could not process the signal level unit regex."),
    ("scan-essid", "Could not process the essid regex"),
    ("scan-bssid", "Could not process the bssid regex"),
    ("scan-standard", "Could not process the standard regex."),
    ("scan-bitrates", "Could not process the bitrates regex."),
    ("scan-last_beacon", "Could not process the last beacon regex."),
];

/// Measures attributes of visible and connected access points.
pub struct AccessPointMeasurement {
    id: String,
    check_connected: bool,
    interfaces: Option<Vec<String>>,
    runner: Arc<dyn CommandRunner>,
}

impl AccessPointMeasurement {
    pub fn new(id: &str, check_connected: bool) -> Self {
        Self {
            id: id.to_string(),
            check_connected,
            interfaces: None,
            runner: Arc::new(SystemRunner),
        }
    }

    /// Scan only the given interfaces instead of enumerating the host's.
    pub fn with_interfaces(mut self, interfaces: Vec<String>) -> Self {
        self.interfaces = Some(interfaces);
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    fn interfaces(&self) -> Vec<String> {
        if let Some(interfaces) = &self.interfaces {
            return interfaces.clone();
        }
        host_interfaces()
    }

    async fn scan_results(&self) -> Vec<AccessPointResult> {
        let mut results = Vec::new();
        // Per-interface failures, surfaced only if nothing scanned.
        let mut failures = Vec::new();

        for interface in self.interfaces() {
            let args = vec![interface.clone(), "scan".to_string()];
            let outcome = self
                .runner
                .run("iwlist", &args, Some(WIRELESS_TOOL_TIMEOUT))
                .await;

            // One interface failing, timing out included, does not
            // stop the remaining interfaces from scanning.
            let (stdout, stderr) = match outcome {
                RunOutcome::TimedOut => {
                    failures.push(self.scan_failure("scan-timeout", None));
                    continue;
                }
                RunOutcome::Failed(message) => {
                    failures.push(self.scan_failure("scan-err", Some(message)));
                    continue;
                }
                RunOutcome::Completed { stdout, stderr, .. } => (stdout, stderr),
            };

            // iwlist reports per-interface refusals on stderr.
            if !stderr.is_empty() {
                debug!(interface, "iwlist refused to scan");
                failures.push(self.scan_failure("scan-err", Some(stderr)));
                continue;
            }

            let cells: Vec<&str> = stdout.split("Cell").collect();
            if cells.len() < 2 {
                failures.push(self.scan_failure("scan-err", Some(stdout.clone())));
                continue;
            }
            for cell in &cells[1..] {
                results.push(self.cell_result(cell));
            }
        }

        if results.is_empty() {
            if failures.is_empty() {
                return vec![self.scan_failure("scan-none", None)];
            }
            return failures;
        }
        results
    }

    fn cell_result(&self, cell: &str) -> AccessPointResult {
        let fields = match scan_fields(cell, SCAN_FIELDS, "scan") {
            Ok(fields) => fields,
            Err(failure) => return self.scan_failure(&failure.key, failure.traceback),
        };
        if fields.all_none() {
            return self.scan_failure("scan-regex", Some(cell.to_string()));
        }
        AccessPointResult {
            id: self.id.clone(),
            channel: fields.int("channel"),
            frequency: fields.float("frequency"),
            frequency_unit: fields.signal_frequency_unit("frequency_unit"),
            quality: fields.text("quality"),
            signal_level: fields.float("signal_level"),
            signal_level_unit: fields.signal_power_unit("signal_level_unit"),
            essid: fields.text("essid"),
            bssid: fields.text("bssid"),
            standard: fields.text("standard"),
            bitrates: fields.list("bitrates"),
            last_beacon: fields.int("last_beacon"),
            errors: vec![],
        }
    }

    async fn iwconfig_result(&self) -> ConnectedAccessPointResult {
        let outcome = self
            .runner
            .run("iwconfig", &[], Some(WIRELESS_TOOL_TIMEOUT))
            .await;

        // iwconfig writes to stderr for every interface that cannot
        // scan, so only the timeout and spawn paths are fatal here.
        let stdout = match outcome {
            RunOutcome::TimedOut => return self.iwconfig_failure("iwconfig-timeout", None),
            RunOutcome::Failed(message) => {
                return self.iwconfig_failure("iwconfig-err", Some(message))
            }
            RunOutcome::Completed { stdout, .. } => stdout,
        };

        let fields = match scan_fields(&stdout, IWCONFIG_FIELDS, "iwconfig") {
            Ok(fields) => fields,
            Err(failure) => return self.iwconfig_failure(&failure.key, failure.traceback),
        };
        if fields.all_none() {
            return self.iwconfig_failure("iwconfig-none", Some(stdout));
        }
        ConnectedAccessPointResult {
            id: self.id.clone(),
            essid: fields.text("essid"),
            bssid: fields.text("bssid"),
            frequency: fields.float("frequency"),
            frequency_unit: fields.signal_frequency_unit("frequency_unit"),
            bitrate: fields.float("bitrate"),
            bitrate_unit: fields.network_unit("bitrate_unit"),
            tx_power: fields.float("tx_power"),
            tx_power_unit: fields.signal_power_unit("tx_power_unit"),
            link_quality: fields.text("link_quality"),
            signal_level: fields.float("signal_level"),
            signal_level_unit: fields.signal_power_unit("signal_level_unit"),
            errors: vec![],
        }
    }

    fn scan_failure(&self, key: &str, traceback: Option<String>) -> AccessPointResult {
        AccessPointResult::failed(
            &self.id,
            MeasurementError::from_table(key, SCAN_ERRORS, traceback),
        )
    }

    fn iwconfig_failure(&self, key: &str, traceback: Option<String>) -> ConnectedAccessPointResult {
        ConnectedAccessPointResult::failed(
            &self.id,
            MeasurementError::from_table(key, IWCONFIG_ERRORS, traceback),
        )
    }
}

#[async_trait]
impl Measurement for AccessPointMeasurement {
    async fn measure(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .scan_results()
            .await
            .into_iter()
            .map(Record::AccessPoint)
            .collect();
        if self.check_connected {
            records.push(Record::ConnectedAccessPoint(self.iwconfig_result().await));
        }
        records
    }
}

/// Interface names from sysfs, sorted so scan order is stable.
fn host_interfaces() -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir("/sys/class/net") {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect(),
        Err(err) => {
            warn!(%err, "could not enumerate network interfaces");
            Vec::new()
        }
    };
    names.sort();
    names
}
