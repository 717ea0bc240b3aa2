//! Logging infrastructure for netgauge
//!
//! Stdout output by default, optional file output with daily rotation,
//! log level taken from `RUST_LOG` when set.

use std::path::PathBuf;
pub use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Optional log directory for file output
    pub log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            level: "info".to_string(),
        }
    }
}

/// Initialize the logging subsystem.
pub fn init_logging(config: LogConfig) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.log_dir {
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(true)
                        .with_thread_ids(false),
                )
                .init();
        }
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, "netgauge.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // Keep the writer guard alive for the process lifetime.
            Box::leak(Box::new(guard));

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();
        }
    }

    Ok(())
}
