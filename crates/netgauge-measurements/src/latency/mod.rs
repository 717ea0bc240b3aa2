//! Latency measurement: wraps `ping` and parses its trailing summary
//! lines. Also the cheap probe behind the racing plugins.

use crate::parser::{line_from_end, match_summary, ParseFailure};
use crate::runner::{CommandRunner, RunOutcome, SystemRunner};
use crate::traits::Measurement;
use crate::validate::validate_host;
use async_trait::async_trait;
use netgauge_common::error::Result;
use netgauge_common::results::{LatencyResult, MeasurementError, Record};
use netgauge_common::units::{RatioUnit, TimeUnit};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Matches the rtt summary ping prints on its final line:
/// `rtt min/avg/max/mdev = 20.038/20.134/20.252/0.158 ms`.
static RTT_SUMMARY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"= (?P<minimum_latency>[\d.].*)/(?P<average_latency>[\d.].*)/(?P<maximum_latency>[\d.].*)/(?P<median_deviation>[\d.].*) ",
    )
    .expect("rtt summary pattern")
});

/// Matches the transmit summary on the line above it:
/// `4 packets transmitted, 4 received, 0% packet loss, time 3004ms`.
static TRANSMIT_SUMMARY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<packets_transmitted>\d+) packets transmitted, (?P<packets_received>\d+) received, (?P<packet_loss>[\d.]+)% packet loss, time (?P<elapsed_time>\d+)ms",
    )
    .expect("transmit summary pattern")
});

pub(crate) const LATENCY_ERRORS: &[(&str, &str)] = &[
    ("ping-err", "ping had an unknown error."),
    (
        "ping-split",
        "ping attempted to split the result but it was in an unanticipated format.",
    ),
    (
        "ping-regex",
        "ping attempted to get the known regex format and failed.",
    ),
    (
        "ping-minimum-latency",
        "ping could not process the minimum latency.",
    ),
    (
        "ping-maximum-latency",
        "ping could not process the maximum latency.",
    ),
    (
        "ping-average-latency",
        "ping could not process the average latency.",
    ),
    (
        "ping-median-deviation",
        "ping could not process the median deviation.",
    ),
    (
        "ping-packets-transmitted",
        "ping could not process the transmitted packet count.",
    ),
    (
        "ping-packets-received",
        "ping could not process the received packet count.",
    ),
    (
        "ping-packet-loss",
        "ping could not process the packet loss ratio.",
    ),
    (
        "ping-elapsed-time",
        "ping could not process the elapsed time.",
    ),
    ("ping-no-server", "No closest server could be resolved."),
    ("ping-timeout", "Measurement request timed out."),
];

fn latency_error(id: &str, host: Option<&str>, key: &str, traceback: Option<String>) -> LatencyResult {
    LatencyResult::failed(
        id,
        host,
        MeasurementError::from_table(key, LATENCY_ERRORS, traceback),
    )
}

/// One latency probe: run ping, parse, classify. Never panics, never
/// returns a language error.
pub(crate) async fn probe(
    runner: &dyn CommandRunner,
    id: &str,
    host: &str,
    count: u32,
) -> LatencyResult {
    if host.is_empty() {
        return latency_error(id, None, "ping-no-server", None);
    }

    let args = vec!["-c".to_string(), count.to_string(), host.to_string()];
    let outcome = runner.run("ping", &args, None).await;

    match outcome {
        RunOutcome::TimedOut => latency_error(id, Some(host), "ping-timeout", None),
        RunOutcome::Failed(msg) => latency_error(id, Some(host), "ping-err", Some(msg)),
        RunOutcome::Completed { success: false, .. } => {
            latency_error(id, Some(host), "ping-err", outcome.error_payload())
        }
        RunOutcome::Completed { stdout, .. } => parse_ping_output(id, host, &stdout),
    }
}

/// Parse a complete ping stdout into a latency record.
pub(crate) fn parse_ping_output(id: &str, host: &str, raw: &str) -> LatencyResult {
    match parse_ping_fields(id, host, raw) {
        Ok(result) => result,
        Err(failure) => latency_error(id, Some(host), &failure.key, failure.traceback),
    }
}

fn parse_ping_fields(id: &str, host: &str, raw: &str) -> std::result::Result<LatencyResult, ParseFailure> {
    let summary_line =
        line_from_end(raw, 0).ok_or_else(|| ParseFailure::new("ping-split", Some(raw)))?;

    let rtt = match_summary(&RTT_SUMMARY_REGEX, summary_line, raw, "ping")?;
    // Field check order is fixed: max, min, avg, mdev. With several
    // malformed fields the first in this order names the error.
    let maximum_latency = rtt.float("maximum_latency", "ping-maximum-latency")?;
    let minimum_latency = rtt.float("minimum_latency", "ping-minimum-latency")?;
    let average_latency = rtt.float("average_latency", "ping-average-latency")?;
    let median_deviation = rtt.float("median_deviation", "ping-median-deviation")?;

    let transmit = match_summary(&TRANSMIT_SUMMARY_REGEX, raw, raw, "ping")?;
    let packets_transmitted = transmit.uint("packets_transmitted", "ping-packets-transmitted")?;
    let packets_received = transmit.uint("packets_received", "ping-packets-received")?;
    let packet_loss = transmit.float("packet_loss", "ping-packet-loss")?;
    let elapsed_time = transmit.float("elapsed_time", "ping-elapsed-time")?;

    Ok(LatencyResult {
        id: id.to_string(),
        host: Some(host.to_string()),
        minimum_latency: Some(minimum_latency),
        average_latency: Some(average_latency),
        maximum_latency: Some(maximum_latency),
        median_deviation: Some(median_deviation),
        packets_transmitted: Some(packets_transmitted),
        packets_received: Some(packets_received),
        packet_loss: Some(packet_loss),
        packet_loss_unit: Some(RatioUnit::Percentage),
        elapsed_time: Some(elapsed_time),
        elapsed_time_unit: Some(TimeUnit::Millisecond),
        errors: vec![],
    })
}

/// A measurement designed to test round-trip latency to one host.
pub struct LatencyMeasurement {
    id: String,
    host: String,
    count: u32,
    runner: Arc<dyn CommandRunner>,
}

impl LatencyMeasurement {
    /// `count` pings against `host`. The host is validated here, once.
    pub fn new(id: &str, host: &str, count: u32) -> Result<Self> {
        Self::with_runner(id, host, count, Arc::new(SystemRunner))
    }

    pub fn with_runner(
        id: &str,
        host: &str,
        count: u32,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        validate_host(host)?;
        Ok(Self {
            id: id.to_string(),
            host: host.to_string(),
            count,
            runner,
        })
    }
}

#[async_trait]
impl Measurement for LatencyMeasurement {
    async fn measure(&self) -> Vec<Record> {
        vec![Record::Latency(
            probe(&*self.runner, &self.id, &self.host, self.count).await,
        )]
    }
}
