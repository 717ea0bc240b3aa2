//! Test doubles shared by the plugin test modules.

use crate::runner::{CommandRunner, RunOutcome};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// `CommandRunner` fed by canned transcripts, keyed by program name.
/// Outcomes are consumed in FIFO order; running out of them is a
/// `Failed` outcome so a test that under-provisions fails loudly.
pub(crate) struct FakeRunner {
    responses: Mutex<HashMap<String, VecDeque<RunOutcome>>>,
    pub calls: Mutex<Vec<(String, Vec<String>, Option<Duration>)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn enqueue(&self, program: &str, outcome: RunOutcome) {
        self.responses
            .lock()
            .unwrap()
            .entry(program.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn call_count(&self, program: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _, _)| p == program)
            .count()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Option<Duration>) -> RunOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec(), timeout));
        self.responses
            .lock()
            .unwrap()
            .get_mut(program)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| RunOutcome::Failed(format!("no canned output for `{program}`")))
    }
}

pub(crate) fn completed(stdout: &str, stderr: &str) -> RunOutcome {
    RunOutcome::Completed {
        success: true,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

pub(crate) fn failed_exit(stdout: &str, stderr: &str) -> RunOutcome {
    RunOutcome::Completed {
        success: false,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

/// Canned `ping` stdout with the given rtt and packet summary values.
pub(crate) fn ping_output(avg: f64, transmitted: u32, received: u32) -> String {
    format!(
        "PING validfakehost.com (93.184.216.34) 56(84) bytes of data.\n\
         64 bytes from 93.184.216.34: icmp_seq=1 ttl=56 time={avg} ms\n\
         \n\
         --- validfakehost.com ping statistics ---\n\
         {transmitted} packets transmitted, {received} received, 0% packet loss, time 3004ms\n\
         rtt min/avg/max/mdev = {avg}/{avg}/{avg}/0.158 ms\n"
    )
}
