//! netgauge - network measurement toolkit
//!
//! One subcommand per measurement plugin. Each run prints its records
//! as JSON lines on stdout; diagnostics go to tracing.

use anyhow::Result;
use clap::{Parser, Subcommand};
use netgauge_common::config::ToolkitConfig;
use netgauge_common::logging::{init_logging, LogConfig};
use netgauge_measurements::{
    AccessPointMeasurement, DownloadSpeedMeasurement, InternetAvailabilityMeasurement,
    IpRouteMeasurement, LatencyMeasurement, Measurement, WebpageMeasurement,
};
use std::path::PathBuf;
use tracing::{debug, info};

/// netgauge - measure the network with the tools already on the box
#[derive(Parser, Debug)]
#[command(
    name = "netgauge",
    version = netgauge_common::VERSION,
    about = "Pluggable network-measurement toolkit",
    long_about = None
)]
struct Args {
    /// Identifier attached to every result record
    #[arg(long, default_value = "netgauge")]
    id: String,

    /// Log directory (defaults to stdout)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Configuration file path (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download speed against the least latent of several URLs
    Download {
        /// Candidate file URLs, raced by latency before downloading
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Round-trip latency against one host
    Latency {
        host: String,

        /// Number of pings
        #[arg(short = 'n', long)]
        count: Option<u32>,
    },
    /// Layered internet/router/device availability
    Internet,
    /// Visible and connected wifi access points
    Wifi {
        /// Scan these interfaces instead of enumerating the host's
        #[arg(long)]
        interface: Vec<String>,
    },
    /// Full webpage download, assets included
    Webpage { url: String },
    /// Traceroute against the least latent of several hosts
    Route {
        /// Candidate hosts, raced by latency before tracing
        #[arg(required = true)]
        hosts: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(LogConfig {
        log_dir: args.log_dir,
        level: args.log_level,
    })?;

    info!("netgauge v{}", netgauge_common::VERSION);

    let config = match &args.config {
        Some(path) => ToolkitConfig::from_file(path)?,
        None => ToolkitConfig::default(),
    };
    debug!(?config, "effective configuration");

    let measurement: Box<dyn Measurement> = match args.command {
        Command::Download { urls } => Box::new(DownloadSpeedMeasurement::new(
            &args.id,
            &urls,
            config.download.count,
            config.download.timeout_secs,
        )?),
        Command::Latency { host, count } => Box::new(LatencyMeasurement::new(
            &args.id,
            &host,
            count.unwrap_or(config.latency.count),
        )?),
        Command::Internet => Box::new(InternetAvailabilityMeasurement::new(&args.id)),
        Command::Wifi { interface } => {
            let mut measurement =
                AccessPointMeasurement::new(&args.id, config.wifi.check_connected);
            if !interface.is_empty() {
                measurement = measurement.with_interfaces(interface);
            }
            Box::new(measurement)
        }
        Command::Webpage { url } => Box::new(WebpageMeasurement::new(
            &args.id,
            &url,
            config.webpage.timeout_secs,
        )?),
        Command::Route { hosts } => Box::new(IpRouteMeasurement::new(
            &args.id,
            &hosts,
            config.route.count,
            config.route.timeout_secs,
        )?),
    };

    for record in measurement.measure().await {
        for error in record.errors() {
            tracing::warn!(key = %error.key, "measurement error");
        }
        println!("{}", serde_json::to_string(&record)?);
    }

    Ok(())
}
