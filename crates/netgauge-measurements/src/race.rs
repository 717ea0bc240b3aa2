//! Host racing: rank candidate hosts by a cheap latency probe before
//! spending an expensive probe (download, traceroute) on the winner.

use crate::latency;
use crate::runner::CommandRunner;
use netgauge_common::results::LatencyResult;
use std::cmp::Ordering;
use tracing::debug;

/// Sample count for the cheap per-candidate ranking probes. The final
/// confirmatory probe uses the caller's count; keeping the ranking
/// probes small bounds the total cost of racing.
pub const RANKING_PING_COUNT: u32 = 2;

/// Stable ascending sort by average latency. Candidates whose probe
/// produced no average (failed or unparseable) sort to the end; input
/// order is preserved among ties and among the all-`None` tail.
pub fn rank_by_latency<K>(mut results: Vec<(K, LatencyResult)>) -> Vec<(K, LatencyResult)> {
    results.sort_by(|a, b| match (a.1.average_latency, b.1.average_latency) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => x.total_cmp(&y),
    });
    results
}

/// Probe every candidate with a cheap fixed-count latency test.
/// Probes are independent; one candidate failing does not stop the
/// rest.
pub async fn probe_candidates<K: Clone>(
    runner: &dyn CommandRunner,
    id: &str,
    candidates: &[(K, String)],
    count: u32,
) -> Vec<(K, LatencyResult)> {
    let mut results = Vec::with_capacity(candidates.len());
    for (key, host) in candidates {
        debug!(host, "probing candidate");
        let result = latency::probe(runner, id, host, count).await;
        results.push((key.clone(), result));
    }
    results
}
