//! Configuration management

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Toolkit configuration, loaded from a TOML file.
///
/// Every section and field has a default so a missing or partial file is
/// fine; the CLI only passes a path when the caller supplies one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolkitConfig {
    #[serde(default)]
    pub latency: LatencySettings,

    #[serde(default)]
    pub download: DownloadSettings,

    #[serde(default)]
    pub route: RouteSettings,

    #[serde(default)]
    pub wifi: WifiSettings,

    #[serde(default)]
    pub webpage: WebpageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencySettings {
    /// Number of pings in a full latency probe.
    #[serde(default = "default_ping_count")]
    pub count: u32,
}

impl Default for LatencySettings {
    fn default() -> Self {
        Self {
            count: default_ping_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    /// Seconds allowed for the download itself. Zero disables the bound.
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,

    /// Pings in the confirmatory latency probe. Zero skips it.
    #[serde(default = "default_ping_count")]
    pub count: u32,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_download_timeout(),
            count: default_ping_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSettings {
    /// Seconds allowed for the traceroute. Zero disables the bound.
    #[serde(default = "default_route_timeout")]
    pub timeout_secs: u64,

    /// Pings in the confirmatory latency probe. Zero skips it.
    #[serde(default = "default_ping_count")]
    pub count: u32,
}

impl Default for RouteSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_route_timeout(),
            count: default_ping_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WifiSettings {
    /// Whether to also report the currently associated access point.
    #[serde(default = "default_true")]
    pub check_connected: bool,
}

impl Default for WifiSettings {
    fn default() -> Self {
        Self {
            check_connected: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebpageSettings {
    /// Seconds allowed per HTTP request. Zero disables the bound.
    #[serde(default = "default_webpage_timeout")]
    pub timeout_secs: u64,
}

impl Default for WebpageSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_webpage_timeout(),
        }
    }
}

fn default_ping_count() -> u32 {
    4
}

fn default_download_timeout() -> u64 {
    180
}

fn default_route_timeout() -> u64 {
    10
}

fn default_webpage_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl ToolkitConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = ToolkitConfig::default();
        assert_eq!(config.latency.count, 4);
        assert_eq!(config.download.timeout_secs, 180);
        assert_eq!(config.route.timeout_secs, 10);
        assert!(config.wifi.check_connected);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: ToolkitConfig = toml::from_str("[download]\ntimeout_secs = 60\n").unwrap();
        assert_eq!(config.download.timeout_secs, 60);
        assert_eq!(config.download.count, 4);
        assert_eq!(config.route.timeout_secs, 10);
    }
}
