//! Process runner adapter.
//!
//! One seam between the plugins and the external diagnostic tools they
//! wrap: run a command with a bounded timeout, capture everything, and
//! report the outcome as a value. The adapter never retries; a tool's
//! own retry flags (e.g. `wget --tries=2`) are the plugin's business.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Outcome of a single external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process ran to completion within the bound.
    Completed {
        success: bool,
        stdout: String,
        stderr: String,
    },
    /// The bound elapsed first; the process was killed. No partial
    /// output is ever surfaced for a timed-out run.
    TimedOut,
    /// The process could not be started at all (tool missing, exec
    /// failure).
    Failed(String),
}

impl RunOutcome {
    /// Diagnostic payload for a failed run: stderr wins, stdout is the
    /// fallback only when stderr is empty.
    pub fn error_payload(&self) -> Option<String> {
        match self {
            RunOutcome::Completed { stdout, stderr, .. } => {
                if !stderr.is_empty() {
                    Some(stderr.clone())
                } else {
                    Some(stdout.clone())
                }
            }
            RunOutcome::TimedOut => None,
            RunOutcome::Failed(msg) => Some(msg.clone()),
        }
    }
}

/// Executes external diagnostic tools.
///
/// Tests stub this with canned transcripts; production uses
/// [`SystemRunner`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`. A `None` timeout blocks until the
    /// process exits.
    async fn run(&self, program: &str, args: &[String], timeout: Option<Duration>) -> RunOutcome;
}

/// [`CommandRunner`] backed by real subprocesses.
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Option<Duration>) -> RunOutcome {
        debug!(program, ?args, ?timeout, "running external tool");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout {
            Some(bound) => match tokio::time::timeout(bound, command.output()).await {
                Ok(res) => res,
                Err(_) => {
                    debug!(program, "external tool timed out");
                    return RunOutcome::TimedOut;
                }
            },
            None => command.output().await,
        };

        match output {
            Ok(out) => RunOutcome::Completed {
                success: out.status.success(),
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            },
            Err(e) => RunOutcome::Failed(e.to_string()),
        }
    }
}
