//! Download speed measurement: races candidate URLs by latency, then
//! wraps `wget` against the winner and parses its summary line.

use crate::latency;
use crate::parser::{line_from_end, match_summary, ParseFailure};
use crate::race::{probe_candidates, rank_by_latency, RANKING_PING_COUNT};
use crate::runner::{CommandRunner, RunOutcome, SystemRunner};
use crate::traits::Measurement;
use crate::validate::validate_url;
use async_trait::async_trait;
use netgauge_common::error::{Error, Result};
use netgauge_common::results::{DownloadSpeedResult, MeasurementError, Record};
use netgauge_common::units::{NetworkUnit, StorageUnit, DOWNLOAD_RATE_REMAPS};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Matches the rate/size summary wget prints near the end of its
/// diagnostic stream:
/// `2019-08-07 09:12:08 (16.7 MB/s) - '/dev/null' saved [11376]`.
static WGET_OUTPUT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\((?P<download_rate>[\d.]*)\s(?P<download_unit>.*)\).*\[(?P<download_size>\d*)[\]/]",
    )
    .expect("wget summary pattern")
});

pub(crate) const WGET_ERRORS: &[(&str, &str)] = &[
    ("wget-err", "wget had an unknown error."),
    (
        "wget-split",
        "wget attempted to split the result but it was in an unanticipated format.",
    ),
    (
        "wget-regex",
        "wget attempted to get the known regex format and failed.",
    ),
    (
        "wget-storage-unit",
        "wget could not process the storage unit.",
    ),
    (
        "wget-download-rate",
        "wget could not process the download rate.",
    ),
    (
        "wget-download-size",
        "wget could not process the download size.",
    ),
    ("wget-no-server", "No closest server could be resolved."),
    ("wget-timeout", "Measurement request timed out."),
];

fn wget_error(
    id: &str,
    url: Option<&str>,
    key: &str,
    traceback: Option<String>,
) -> DownloadSpeedResult {
    DownloadSpeedResult::failed(
        id,
        url,
        MeasurementError::from_table(key, WGET_ERRORS, traceback),
    )
}

/// Run wget against `url` and parse the summary. wget reports on
/// stderr; `--tries=2` is the tool's own retry policy, not ours.
pub(crate) async fn wget_probe(
    runner: &dyn CommandRunner,
    id: &str,
    url: &str,
    timeout: Option<Duration>,
) -> DownloadSpeedResult {
    let args = vec![
        "--tries=2".to_string(),
        "-O".to_string(),
        "/dev/null".to_string(),
        url.to_string(),
    ];
    let outcome = runner.run("wget", &args, timeout).await;

    match outcome {
        RunOutcome::TimedOut => wget_error(id, Some(url), "wget-timeout", None),
        RunOutcome::Failed(msg) => wget_error(id, Some(url), "wget-err", Some(msg)),
        RunOutcome::Completed { success: false, .. } => {
            wget_error(id, Some(url), "wget-err", outcome.error_payload())
        }
        RunOutcome::Completed { stderr, .. } => parse_wget_output(id, url, &stderr),
    }
}

/// Parse wget's stderr stream into a download record.
pub(crate) fn parse_wget_output(id: &str, url: &str, raw: &str) -> DownloadSpeedResult {
    match parse_wget_fields(id, url, raw) {
        Ok(result) => result,
        Err(failure) => wget_error(id, Some(url), &failure.key, failure.traceback),
    }
}

fn parse_wget_fields(
    id: &str,
    url: &str,
    raw: &str,
) -> std::result::Result<DownloadSpeedResult, ParseFailure> {
    let summary_line =
        line_from_end(raw, 0).ok_or_else(|| ParseFailure::new("wget-split", Some(raw)))?;

    let m = match_summary(&WGET_OUTPUT_REGEX, summary_line, raw, "wget")?;
    // Check order is fixed: unit, rate, size.
    let download_rate_unit: NetworkUnit =
        m.unit("download_unit", DOWNLOAD_RATE_REMAPS, "wget-storage-unit")?;
    let download_rate = m.float("download_rate", "wget-download-rate")?;
    let download_size = m.float("download_size", "wget-download-size")?;

    Ok(DownloadSpeedResult {
        id: id.to_string(),
        url: Some(url.to_string()),
        download_rate: Some(download_rate),
        download_rate_unit: Some(download_rate_unit),
        download_size: Some(download_size),
        download_size_unit: Some(StorageUnit::Megabit),
        errors: vec![],
    })
}

/// A measurement designed to test download speed.
///
/// Racing plugin: each candidate URL's host gets a cheap two-ping
/// probe, the least latent URL gets the expensive download, and the
/// full ranked latency list rides along as diagnostics.
pub struct DownloadSpeedMeasurement {
    id: String,
    urls: Vec<Url>,
    count: u32,
    download_timeout: Option<Duration>,
    runner: Arc<dyn CommandRunner>,
}

impl DownloadSpeedMeasurement {
    /// `count` is the size of the confirmatory latency probe (0 skips
    /// it); `download_timeout_secs` bounds the download (0 means no
    /// bound).
    pub fn new(id: &str, urls: &[String], count: u32, download_timeout_secs: u64) -> Result<Self> {
        Self::with_runner(id, urls, count, download_timeout_secs, Arc::new(SystemRunner))
    }

    pub fn with_runner(
        id: &str,
        urls: &[String],
        count: u32,
        download_timeout_secs: u64,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        if urls.is_empty() {
            return Err(Error::NoCandidates);
        }
        let urls = urls
            .iter()
            .map(|raw| validate_url(raw))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: id.to_string(),
            urls,
            count,
            download_timeout: match download_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            runner,
        })
    }
}

#[async_trait]
impl Measurement for DownloadSpeedMeasurement {
    async fn measure(&self) -> Vec<Record> {
        let candidates: Vec<(String, String)> = self
            .urls
            .iter()
            .map(|url| {
                let host = url.host_str().unwrap_or_default().to_string();
                (url.to_string(), host)
            })
            .collect();

        let probed =
            probe_candidates(&*self.runner, &self.id, &candidates, RANKING_PING_COUNT).await;
        let ranked = rank_by_latency(probed);

        // Candidate list is non-empty by construction.
        let winner_url = ranked[0].0.clone();
        let winner_host = ranked[0].1.host.clone().unwrap_or_default();

        let download =
            wget_probe(&*self.runner, &self.id, &winner_url, self.download_timeout).await;

        let mut records = vec![Record::DownloadSpeed(download)];
        if self.count > 0 {
            records.push(Record::Latency(
                latency::probe(&*self.runner, &self.id, &winner_host, self.count).await,
            ));
        }
        records.extend(ranked.into_iter().map(|(_, r)| Record::Latency(r)));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RunOutcome;
    use crate::testing::{completed, failed_exit, ping_output, FakeRunner};

    const ANTICIPATED_SUMMARY: &str =
        "2019-08-07 09:12:08 (16.7 MB/s) - '/dev/null' saved [11376]";

    fn wget_stderr(summary: &str) -> String {
        format!(
            "--2019-08-07 09:12:07--  http://validfakehost.com/file\n\
             Resolving validfakehost.com... 93.184.216.34\n\
             HTTP request sent, awaiting response... 200 OK\n\
             Saving to: '/dev/null'\n\
             \n\
             {summary}\n\
             \n"
        )
    }

    #[test]
    fn parses_anticipated_wget_summary() {
        let raw = wget_stderr(ANTICIPATED_SUMMARY);
        let result = parse_wget_output("test", "http://validfakehost.com/file", &raw);
        assert!(result.errors.is_empty());
        assert_eq!(result.download_rate, Some(16.7));
        assert_eq!(result.download_rate_unit, Some(NetworkUnit::MegabitPerSecond));
        assert_eq!(result.download_size, Some(11376.0));
        assert_eq!(result.download_size_unit, Some(StorageUnit::Megabit));
    }

    #[test]
    fn unmatched_output_is_a_regex_error() {
        let result = parse_wget_output("test", "http://h.com", "wget: command garbage\n");
        assert_eq!(result.errors[0].key, "wget-regex");
        assert!(result.download_rate.is_none());
        assert!(result.download_rate_unit.is_none());
        assert!(result.download_size.is_none());
        assert!(result.download_size_unit.is_none());
    }

    #[test]
    fn empty_output_is_a_split_error() {
        let result = parse_wget_output("test", "http://h.com", "");
        assert_eq!(result.errors[0].key, "wget-split");
    }

    #[test]
    fn unknown_unit_is_reported_before_other_fields() {
        // Unit is checked first, so a bogus unit wins over the size
        // field even when both would fail.
        let raw = wget_stderr("2019-08-07 09:12:08 (16.7 QB/s) - '/dev/null' saved []");
        let result = parse_wget_output("test", "http://h.com", &raw);
        assert_eq!(result.errors[0].key, "wget-storage-unit");
    }

    #[test]
    fn malformed_size_is_a_size_error() {
        let raw = wget_stderr("2019-08-07 09:12:08 (16.7 MB/s) - '/dev/null' saved []");
        let result = parse_wget_output("test", "http://h.com", &raw);
        assert_eq!(result.errors[0].key, "wget-download-size");
    }

    #[tokio::test]
    async fn timeout_never_reaches_the_parser() {
        let runner = FakeRunner::new();
        runner.enqueue("wget", RunOutcome::TimedOut);
        let result = wget_probe(&runner, "test", "http://h.com/f", None).await;
        assert_eq!(result.errors[0].key, "wget-timeout");
        assert!(result.errors[0].traceback.is_none());
    }

    #[tokio::test]
    async fn nonzero_exit_carries_stderr_traceback() {
        let runner = FakeRunner::new();
        runner.enqueue("wget", failed_exit("", "wget: unable to resolve host"));
        let result = wget_probe(&runner, "test", "http://h.com/f", None).await;
        assert_eq!(result.errors[0].key, "wget-err");
        assert_eq!(
            result.errors[0].traceback.as_deref(),
            Some("wget: unable to resolve host")
        );
    }

    #[tokio::test]
    async fn races_candidates_and_downloads_the_winner() {
        let runner = Arc::new(FakeRunner::new());
        // Ranking probes, in candidate order: slow, fast, dead.
        runner.enqueue("ping", completed(&ping_output(120.0, 2, 2), ""));
        runner.enqueue("ping", completed(&ping_output(9.0, 2, 2), ""));
        runner.enqueue("ping", failed_exit("", "ping: unknown host"));
        // Expensive download against the winner.
        runner.enqueue("wget", completed("", &wget_stderr(ANTICIPATED_SUMMARY)));
        // Confirmatory latency probe.
        runner.enqueue("ping", completed(&ping_output(9.4, 4, 4), ""));

        let urls = vec![
            "http://n1-validfakehost.com/file".to_string(),
            "http://n2-validfakehost.com/file".to_string(),
            "http://n3-validfakehost.com/file".to_string(),
        ];
        let measurement =
            DownloadSpeedMeasurement::with_runner("test", &urls, 4, 180, runner.clone()).unwrap();
        let records = measurement.measure().await;

        // [download, confirmatory latency, 3 ranked latencies]
        assert_eq!(records.len(), 5);
        match &records[0] {
            Record::DownloadSpeed(r) => {
                assert_eq!(r.url.as_deref(), Some("http://n2-validfakehost.com/file"));
                assert_eq!(r.download_rate, Some(16.7));
            }
            other => panic!("unexpected record: {other:?}"),
        }
        match &records[1] {
            Record::Latency(r) => {
                assert_eq!(r.host.as_deref(), Some("n2-validfakehost.com"));
                assert_eq!(r.average_latency, Some(9.4));
            }
            other => panic!("unexpected record: {other:?}"),
        }
        // Ranked list: winner first, dead candidate last.
        match &records[2] {
            Record::Latency(r) => assert_eq!(r.average_latency, Some(9.0)),
            other => panic!("unexpected record: {other:?}"),
        }
        match &records[4] {
            Record::Latency(r) => assert!(r.average_latency.is_none()),
            other => panic!("unexpected record: {other:?}"),
        }

        // Ranking probes use the small fixed count, the confirmatory
        // probe uses the caller's.
        let calls = runner.calls.lock().unwrap();
        let ping_counts: Vec<String> = calls
            .iter()
            .filter(|(p, _, _)| p == "ping")
            .map(|(_, args, _)| args[1].clone())
            .collect();
        assert_eq!(ping_counts, vec!["2", "2", "2", "4"]);
    }

    #[tokio::test]
    async fn zero_count_skips_the_confirmatory_probe() {
        let runner = Arc::new(FakeRunner::new());
        runner.enqueue("ping", completed(&ping_output(9.0, 2, 2), ""));
        runner.enqueue("wget", completed("", &wget_stderr(ANTICIPATED_SUMMARY)));

        let urls = vec!["http://validfakehost.com/file".to_string()];
        let measurement =
            DownloadSpeedMeasurement::with_runner("test", &urls, 0, 0, runner.clone()).unwrap();
        let records = measurement.measure().await;
        // [download, single ranked latency]
        assert_eq!(records.len(), 2);
        assert_eq!(runner.call_count("ping"), 1);
    }

    #[test]
    fn rejects_invalid_urls_at_construction() {
        assert!(DownloadSpeedMeasurement::new("test", &["not a url".to_string()], 4, 180).is_err());
        assert!(DownloadSpeedMeasurement::new("test", &[], 4, 180).is_err());
    }
}
