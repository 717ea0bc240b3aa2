//! Route measurement against the least latent of several hosts.
//!
//! Candidates are raced with cheap latency probes, the winner gets a
//! `traceroute`, and the ranked latency results are returned alongside
//! as diagnostics, mirroring the download speed plugin.

use crate::latency;
use crate::race::{probe_candidates, rank_by_latency, RANKING_PING_COUNT};
use crate::runner::{CommandRunner, RunOutcome, SystemRunner};
use crate::traits::Measurement;
use crate::validate::validate_host;
use async_trait::async_trait;
use netgauge_common::error::{Error, Result};
use netgauge_common::results::{IpRouteResult, MeasurementError, Record, RouteHop};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

static TRACEROUTE_HEADER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"traceroute to (?P<host>\S+) \((?P<ip>[^)]+)\)").expect("traceroute header pattern")
});

static TRACEROUTE_HOP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?P<hop>\d+)\s+(?P<address>\S+)").expect("traceroute hop pattern")
});

pub(crate) const ROUTE_ERRORS: &[(&str, &str)] = &[
    ("route-err", "traceroute had an unknown error."),
    ("route-split", "Attempted to split the result but it was in an unknown format."),
    ("route-regex", "Attempted to get the known regex format and failed."),
    ("route-timeout", "Measurement request timed out."),
    ("route-no-server", "No server specified."),
];

fn route_failure(id: &str, host: Option<&str>, key: &str, traceback: Option<String>) -> IpRouteResult {
    IpRouteResult::failed(id, host, MeasurementError::from_table(key, ROUTE_ERRORS, traceback))
}

/// Runs `traceroute {host}` and parses the resolved address plus the
/// ordered hop list out of its stdout.
async fn traceroute_probe(
    runner: &dyn CommandRunner,
    id: &str,
    host: &str,
    timeout: Option<Duration>,
) -> IpRouteResult {
    if host.is_empty() {
        return route_failure(id, None, "route-no-server", None);
    }

    let outcome = runner.run("traceroute", &[host.to_string()], timeout).await;
    let stdout = match outcome {
        RunOutcome::TimedOut => return route_failure(id, Some(host), "route-timeout", None),
        RunOutcome::Completed {
            success: true,
            stdout,
            ..
        } => stdout,
        other => {
            return route_failure(id, Some(host), "route-err", other.error_payload());
        }
    };

    parse_traceroute_output(id, host, &stdout)
}

fn parse_traceroute_output(id: &str, host: &str, raw: &str) -> IpRouteResult {
    let header = match raw.lines().find(|line| !line.trim().is_empty()) {
        Some(line) => line,
        None => return route_failure(id, Some(host), "route-split", Some(raw.to_string())),
    };

    let ip = match TRACEROUTE_HEADER_REGEX
        .captures(header)
        .and_then(|caps| caps.name("ip"))
    {
        Some(m) => m.as_str().to_string(),
        None => return route_failure(id, Some(host), "route-regex", Some(raw.to_string())),
    };

    let trace: Vec<RouteHop> = TRACEROUTE_HOP_REGEX
        .captures_iter(raw)
        .filter_map(|caps| {
            let hop = caps.name("hop")?.as_str().parse::<u32>().ok()?;
            let address = match caps.name("address")?.as_str() {
                "*" => None,
                addr => Some(addr.to_string()),
            };
            Some(RouteHop { hop, address })
        })
        .collect();

    if trace.is_empty() {
        return route_failure(id, Some(host), "route-regex", Some(raw.to_string()));
    }

    IpRouteResult {
        id: id.to_string(),
        host: Some(host.to_string()),
        ip: Some(ip),
        hop_count: Some(trace.len() as u32),
        trace: Some(trace),
        errors: vec![],
    }
}

/// A measurement that traces the route to the least latent host.
pub struct IpRouteMeasurement {
    id: String,
    hosts: Vec<String>,
    count: u32,
    route_timeout: Option<Duration>,
    runner: Arc<dyn CommandRunner>,
}

impl IpRouteMeasurement {
    /// `count` sizes the confirmatory latency probe (0 skips it);
    /// `route_timeout_secs` bounds the traceroute (0 means no bound).
    pub fn new(id: &str, hosts: &[String], count: u32, route_timeout_secs: u64) -> Result<Self> {
        Self::with_runner(id, hosts, count, route_timeout_secs, Arc::new(SystemRunner))
    }

    pub fn with_runner(
        id: &str,
        hosts: &[String],
        count: u32,
        route_timeout_secs: u64,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        if hosts.is_empty() {
            return Err(Error::NoCandidates);
        }
        for host in hosts {
            validate_host(host)?;
        }
        Ok(Self {
            id: id.to_string(),
            hosts: hosts.to_vec(),
            count,
            route_timeout: match route_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            runner,
        })
    }
}

#[async_trait]
impl Measurement for IpRouteMeasurement {
    async fn measure(&self) -> Vec<Record> {
        let candidates: Vec<(String, String)> = self
            .hosts
            .iter()
            .map(|host| (host.clone(), host.clone()))
            .collect();

        let probed =
            probe_candidates(&*self.runner, &self.id, &candidates, RANKING_PING_COUNT).await;
        let ranked = rank_by_latency(probed);

        // Candidate list is non-empty by construction.
        let winner = ranked[0].0.clone();
        debug!(host = %winner, "tracing route to winning candidate");

        let route =
            traceroute_probe(&*self.runner, &self.id, &winner, self.route_timeout).await;

        let mut records = vec![Record::IpRoute(route)];
        if self.count > 0 {
            records.push(Record::Latency(
                latency::probe(&*self.runner, &self.id, &winner, self.count).await,
            ));
        }
        records.extend(ranked.into_iter().map(|(_, r)| Record::Latency(r)));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{completed, failed_exit, ping_output, FakeRunner};

    const TRACEROUTE_OUT: &str = "traceroute to validfakehost.com (93.184.216.34), 30 hops max, 60 byte packets\n 1  192.168.1.1  0.517 ms  0.634 ms  0.713 ms\n 2  *  * *\n 3  93.184.216.34  11.254 ms  11.292 ms  11.274 ms\n";

    #[test]
    fn parses_a_traceroute() {
        let result = parse_traceroute_output("test", "validfakehost.com", TRACEROUTE_OUT);
        assert!(result.errors.is_empty());
        assert_eq!(result.host.as_deref(), Some("validfakehost.com"));
        assert_eq!(result.ip.as_deref(), Some("93.184.216.34"));
        assert_eq!(result.hop_count, Some(3));
        let trace = result.trace.unwrap();
        assert_eq!(trace[0], RouteHop { hop: 1, address: Some("192.168.1.1".to_string()) });
        assert_eq!(trace[1], RouteHop { hop: 2, address: None });
        assert_eq!(trace[2], RouteHop { hop: 3, address: Some("93.184.216.34".to_string()) });
    }

    #[test]
    fn unmatched_header_is_a_regex_error() {
        let result =
            parse_traceroute_output("test", "validfakehost.com", "some unrelated text\n");
        assert_eq!(result.errors[0].key, "route-regex");
        assert!(result.ip.is_none());
        assert!(result.trace.is_none());
    }

    #[test]
    fn empty_output_is_a_split_error() {
        let result = parse_traceroute_output("test", "validfakehost.com", "\n\n");
        assert_eq!(result.errors[0].key, "route-split");
    }

    #[test]
    fn header_without_hops_is_a_regex_error() {
        let raw = "traceroute to validfakehost.com (93.184.216.34), 30 hops max\n";
        let result = parse_traceroute_output("test", "validfakehost.com", raw);
        assert_eq!(result.errors[0].key, "route-regex");
    }

    #[tokio::test]
    async fn races_hosts_and_traces_the_winner() {
        let runner = Arc::new(FakeRunner::new());
        // Ranking probes in candidate order, then the confirmatory probe.
        runner.enqueue("ping", completed(&ping_output(30.0, 2, 2), ""));
        runner.enqueue("ping", completed(&ping_output(5.0, 2, 2), ""));
        runner.enqueue("ping", completed(&ping_output(5.1, 4, 4), ""));
        runner.enqueue("traceroute", completed(TRACEROUTE_OUT, ""));

        let hosts = vec!["slowhost.com".to_string(), "validfakehost.com".to_string()];
        let measurement =
            IpRouteMeasurement::with_runner("test", &hosts, 4, 10, runner.clone()).unwrap();
        let records = measurement.measure().await;

        assert_eq!(records.len(), 4);
        match &records[0] {
            Record::IpRoute(r) => {
                assert!(r.errors.is_empty());
                assert_eq!(r.hop_count, Some(3));
            }
            other => panic!("unexpected record: {other:?}"),
        }
        // Traceroute targeted the faster candidate.
        let calls = runner.calls.lock().unwrap();
        let trace_call = calls.iter().find(|(p, _, _)| p == "traceroute").unwrap();
        assert_eq!(trace_call.1, vec!["validfakehost.com".to_string()]);
        assert_eq!(trace_call.2, Some(Duration::from_secs(10)));
        drop(calls);

        // Confirmatory probe then ranked diagnostics, fastest first.
        match (&records[1], &records[2]) {
            (Record::Latency(confirm), Record::Latency(fastest)) => {
                assert_eq!(confirm.packets_transmitted, Some(4));
                assert_eq!(fastest.average_latency, Some(5.0));
            }
            other => panic!("unexpected records: {other:?}"),
        }
    }

    #[tokio::test]
    async fn traceroute_timeout_is_classified() {
        let runner = Arc::new(FakeRunner::new());
        runner.enqueue("ping", completed(&ping_output(5.0, 2, 2), ""));
        runner.enqueue("traceroute", RunOutcome::TimedOut);

        let hosts = vec!["validfakehost.com".to_string()];
        let measurement =
            IpRouteMeasurement::with_runner("test", &hosts, 0, 10, runner.clone()).unwrap();
        let records = measurement.measure().await;
        match &records[0] {
            Record::IpRoute(r) => {
                assert_eq!(r.errors[0].key, "route-timeout");
                assert!(r.errors[0].traceback.is_none());
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[tokio::test]
    async fn traceroute_failure_carries_stderr() {
        let runner = Arc::new(FakeRunner::new());
        runner.enqueue("ping", completed(&ping_output(5.0, 2, 2), ""));
        runner.enqueue(
            "traceroute",
            failed_exit("", "validfakehost.com: Name or service not known\n"),
        );

        let hosts = vec!["validfakehost.com".to_string()];
        let measurement =
            IpRouteMeasurement::with_runner("test", &hosts, 0, 10, runner.clone()).unwrap();
        let records = measurement.measure().await;
        match &records[0] {
            Record::IpRoute(r) => {
                assert_eq!(r.errors[0].key, "route-err");
                assert_eq!(
                    r.errors[0].traceback.as_deref(),
                    Some("validfakehost.com: Name or service not known\n")
                );
            }
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[test]
    fn rejects_an_empty_candidate_list() {
        assert!(IpRouteMeasurement::new("test", &[], 4, 10).is_err());
    }
}
