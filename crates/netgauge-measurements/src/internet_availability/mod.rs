//! Internet availability measurement.
//!
//! Layered reachability checks, each backed by `ping`: internet via DNS
//! names, internet via raw addresses, the default-gateway router, and
//! the device itself (which is trivially available if the test runs).
//! Any response at all, even intermittent, counts as available.

use crate::runner::{CommandRunner, RunOutcome, SystemRunner};
use crate::traits::Measurement;
use async_trait::async_trait;
use netgauge_common::results::{InternetAvailabilityResult, MeasurementError, Record};
use netgauge_common::units::Availability;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

static PING_AVAILABILITY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"packets transmitted, (?P<number_of_available>\d+) received")
        .expect("availability pattern")
});

static DEFAULT_GATEWAY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"default via (?P<gateway>\S+)").expect("gateway pattern"));

const DNS_TARGETS: &[&str] = &["www.google.com", "www.bing.com"];
const IP_TARGETS: &[&str] = &["8.8.8.8", "1.1.1.1", "1.0.0.1"];

/// Failure strings that mean "service unreachable", not "test broken".
const DNS_KNOWN_FAILURES: &[&str] = &[
    "Temporary failure in name resolution",
    "Destination Net Unreachable",
];
const IP_KNOWN_FAILURES: &[&str] = &["Network is unreachable", "Destination Net Unreachable"];
const ROUTER_KNOWN_FAILURES: &[&str] = &["Network is unreachable"];

pub(crate) const INTERNET_ERRORS: &[(&str, &str)] = &[(
    "internet-available-ping",
    "Internet available ping result could not be parsed by regex.",
)];

/// A ping-based check that could not be classified as available or
/// unavailable: the raw payload decides whether it is a known
/// unreachability string or an unknown failure that aborts the run.
struct UnclassifiedPing(String);

/// Measures if the internet and associated services are available.
pub struct InternetAvailabilityMeasurement {
    id: String,
    count: u32,
    runner: Arc<dyn CommandRunner>,
}

impl InternetAvailabilityMeasurement {
    pub fn new(id: &str) -> Self {
        Self::with_runner(id, Arc::new(SystemRunner))
    }

    pub fn with_runner(id: &str, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            id: id.to_string(),
            count: 4,
            runner,
        }
    }

    async fn check_all(&self) -> Result<InternetAvailabilityResult, UnclassifiedPing> {
        Ok(InternetAvailabilityResult {
            id: self.id.clone(),
            internet_with_dns: Some(self.any_available(DNS_TARGETS, DNS_KNOWN_FAILURES).await?),
            internet: Some(self.any_available(IP_TARGETS, IP_KNOWN_FAILURES).await?),
            router: Some(self.router_availability().await?),
            device: Some(Availability::Available),
            errors: vec![],
        })
    }

    /// Available as soon as any target answers. A known failure string
    /// just means that target is unreachable; an unknown one aborts.
    async fn any_available(
        &self,
        targets: &[&str],
        known_failures: &[&str],
    ) -> Result<Availability, UnclassifiedPing> {
        for target in targets {
            match self.ping_check(target).await {
                Ok(Availability::Available) => return Ok(Availability::Available),
                Ok(Availability::Unavailable) => {}
                Err(UnclassifiedPing(payload)) => {
                    if !known_failures.iter().any(|k| payload.contains(k)) {
                        return Err(UnclassifiedPing(payload));
                    }
                    debug!(target, "known unreachability, treating as unavailable");
                }
            }
        }
        Ok(Availability::Unavailable)
    }

    /// The router is the default gateway. No resolvable gateway means
    /// the router is considered down, not a broken test.
    async fn router_availability(&self) -> Result<Availability, UnclassifiedPing> {
        let outcome = self
            .runner
            .run(
                "ip",
                &["route".to_string(), "show".to_string(), "default".to_string()],
                None,
            )
            .await;

        let stdout = match outcome {
            RunOutcome::Completed {
                success: true,
                stdout,
                ..
            } => stdout,
            _ => return Ok(Availability::Unavailable),
        };

        let gateway = match DEFAULT_GATEWAY_REGEX
            .captures(&stdout)
            .and_then(|caps| caps.name("gateway"))
        {
            Some(m) => m.as_str().to_string(),
            None => return Ok(Availability::Unavailable),
        };

        match self.ping_check(&gateway).await {
            Ok(availability) => Ok(availability),
            Err(UnclassifiedPing(payload)) => {
                if ROUTER_KNOWN_FAILURES.iter().any(|k| payload.contains(k)) {
                    Ok(Availability::Unavailable)
                } else {
                    Err(UnclassifiedPing(payload))
                }
            }
        }
    }

    /// One ping against one address; any received packet is enough.
    async fn ping_check(&self, address: &str) -> Result<Availability, UnclassifiedPing> {
        let args = vec![
            "-c".to_string(),
            self.count.to_string(),
            address.to_string(),
        ];
        let outcome = self.runner.run("ping", &args, None).await;

        let stdout = match outcome {
            RunOutcome::Completed {
                success: true,
                stdout,
                ..
            } => stdout,
            other => {
                return Err(UnclassifiedPing(
                    other.error_payload().unwrap_or_default(),
                ))
            }
        };

        let received = PING_AVAILABILITY_REGEX
            .captures(&stdout)
            .and_then(|caps| caps.name("number_of_available"))
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .ok_or_else(|| UnclassifiedPing(stdout.clone()))?;

        if received > 0 {
            Ok(Availability::Available)
        } else {
            Ok(Availability::Unavailable)
        }
    }
}

#[async_trait]
impl Measurement for InternetAvailabilityMeasurement {
    async fn measure(&self) -> Vec<Record> {
        let result = match self.check_all().await {
            Ok(result) => result,
            Err(UnclassifiedPing(payload)) => InternetAvailabilityResult::failed(
                &self.id,
                MeasurementError::from_table(
                    "internet-available-ping",
                    INTERNET_ERRORS,
                    Some(payload),
                ),
            ),
        };
        vec![Record::InternetAvailability(result)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{completed, failed_exit, FakeRunner};

    fn ping_summary(transmitted: u32, received: u32) -> String {
        format!(
            "--- ping statistics ---\n{transmitted} packets transmitted, {received} received, 0% packet loss, time 3004ms\n"
        )
    }

    fn runner_with_gateway(gateway_stdout: &str) -> Arc<FakeRunner> {
        let runner = Arc::new(FakeRunner::new());
        runner.enqueue("ip", completed(gateway_stdout, ""));
        runner
    }

    #[tokio::test]
    async fn all_layers_available() {
        let runner = runner_with_gateway("default via 192.168.1.1 dev wlan0\n");
        // dns: first target answers; ip: first target answers; router.
        runner.enqueue("ping", completed(&ping_summary(4, 4), ""));
        runner.enqueue("ping", completed(&ping_summary(4, 4), ""));
        runner.enqueue("ping", completed(&ping_summary(4, 4), ""));

        let measurement = InternetAvailabilityMeasurement::with_runner("test", runner.clone());
        let records = measurement.measure().await;
        match &records[0] {
            Record::InternetAvailability(r) => {
                assert!(r.errors.is_empty());
                assert_eq!(r.internet_with_dns, Some(Availability::Available));
                assert_eq!(r.internet, Some(Availability::Available));
                assert_eq!(r.router, Some(Availability::Available));
                assert_eq!(r.device, Some(Availability::Available));
            }
            other => panic!("unexpected record: {other:?}"),
        }
        // One ping per layer since each first target answered.
        assert_eq!(runner.call_count("ping"), 3);
    }

    #[tokio::test]
    async fn zero_received_packets_is_unavailable() {
        let runner = runner_with_gateway("default via 192.168.1.1 dev wlan0\n");
        // Both dns targets: transmitted but nothing received.
        runner.enqueue("ping", completed(&ping_summary(1, 0), ""));
        runner.enqueue("ping", completed(&ping_summary(1, 0), ""));
        // ip and router targets answer.
        runner.enqueue("ping", completed(&ping_summary(4, 4), ""));
        runner.enqueue("ping", completed(&ping_summary(4, 4), ""));

        let measurement = InternetAvailabilityMeasurement::with_runner("test", runner.clone());
        let records = measurement.measure().await;
        match &records[0] {
            Record::InternetAvailability(r) => {
                assert_eq!(r.internet_with_dns, Some(Availability::Unavailable));
                assert_eq!(r.internet, Some(Availability::Available));
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[tokio::test]
    async fn known_failure_strings_mean_unavailable() {
        let runner = runner_with_gateway("");
        // Both dns targets fail with a known resolution error.
        runner.enqueue(
            "ping",
            failed_exit("", "ping: www.google.com: Temporary failure in name resolution"),
        );
        runner.enqueue(
            "ping",
            failed_exit("", "ping: www.bing.com: Temporary failure in name resolution"),
        );
        // ip targets all unreachable via known string.
        runner.enqueue("ping", failed_exit("", "connect: Network is unreachable"));
        runner.enqueue("ping", failed_exit("", "connect: Network is unreachable"));
        runner.enqueue("ping", failed_exit("", "connect: Network is unreachable"));

        let measurement = InternetAvailabilityMeasurement::with_runner("test", runner.clone());
        let records = measurement.measure().await;
        match &records[0] {
            Record::InternetAvailability(r) => {
                assert!(r.errors.is_empty());
                assert_eq!(r.internet_with_dns, Some(Availability::Unavailable));
                assert_eq!(r.internet, Some(Availability::Unavailable));
                // Empty gateway table: router down, no ping attempted.
                assert_eq!(r.router, Some(Availability::Unavailable));
                assert_eq!(r.device, Some(Availability::Available));
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_ping_failure_aborts_with_classified_error() {
        let runner = Arc::new(FakeRunner::new());
        runner.enqueue("ping", failed_exit("", "ping: something deeply unexpected"));

        let measurement = InternetAvailabilityMeasurement::with_runner("test", runner.clone());
        let records = measurement.measure().await;
        match &records[0] {
            Record::InternetAvailability(r) => {
                assert_eq!(r.errors[0].key, "internet-available-ping");
                assert_eq!(
                    r.errors[0].traceback.as_deref(),
                    Some("ping: something deeply unexpected")
                );
                assert!(r.internet_with_dns.is_none());
                assert!(r.internet.is_none());
                assert!(r.router.is_none());
                assert!(r.device.is_none());
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_payload_falls_back_to_stdout() {
        let runner = Arc::new(FakeRunner::new());
        // Some ping builds report errors on stdout with an empty stderr.
        runner.enqueue("ping", failed_exit("stdout-side failure text", ""));

        let measurement = InternetAvailabilityMeasurement::with_runner("test", runner.clone());
        let records = measurement.measure().await;
        match &records[0] {
            Record::InternetAvailability(r) => {
                assert_eq!(
                    r.errors[0].traceback.as_deref(),
                    Some("stdout-side failure text")
                );
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }
}
