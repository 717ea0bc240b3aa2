//! Closed unit enumerations for measured quantities.
//!
//! Every unit is constructed from the symbol string captured out of a
//! tool's output. An unrecognized symbol is a classified parse failure
//! (`UnknownUnit`), never a panic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raised when a captured unit symbol is not part of the closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{symbol}` is not a recognized {quantity} unit")]
pub struct UnknownUnit {
    pub quantity: &'static str,
    pub symbol: String,
}

impl UnknownUnit {
    fn new(quantity: &'static str, symbol: &str) -> Self {
        Self {
            quantity,
            symbol: symbol.to_string(),
        }
    }
}

/// Network transfer rate units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkUnit {
    #[serde(rename = "bit/s")]
    BitPerSecond,
    #[serde(rename = "Kbit/s")]
    KilobitPerSecond,
    #[serde(rename = "Mbit/s")]
    MegabitPerSecond,
    #[serde(rename = "Gbit/s")]
    GigabitPerSecond,
}

impl NetworkUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            NetworkUnit::BitPerSecond => "bit/s",
            NetworkUnit::KilobitPerSecond => "Kbit/s",
            NetworkUnit::MegabitPerSecond => "Mbit/s",
            NetworkUnit::GigabitPerSecond => "Gbit/s",
        }
    }
}

impl FromStr for NetworkUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bit/s" => Ok(NetworkUnit::BitPerSecond),
            "Kbit/s" => Ok(NetworkUnit::KilobitPerSecond),
            "Mbit/s" => Ok(NetworkUnit::MegabitPerSecond),
            "Gbit/s" => Ok(NetworkUnit::GigabitPerSecond),
            other => Err(UnknownUnit::new("network rate", other)),
        }
    }
}

/// Storage size units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageUnit {
    #[serde(rename = "bit")]
    Bit,
    #[serde(rename = "Kbit")]
    Kilobit,
    #[serde(rename = "Mbit")]
    Megabit,
    #[serde(rename = "Gbit")]
    Gigabit,
    #[serde(rename = "B")]
    Byte,
    #[serde(rename = "KB")]
    Kilobyte,
    #[serde(rename = "MB")]
    Megabyte,
    #[serde(rename = "GB")]
    Gigabyte,
}

impl StorageUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            StorageUnit::Bit => "bit",
            StorageUnit::Kilobit => "Kbit",
            StorageUnit::Megabit => "Mbit",
            StorageUnit::Gigabit => "Gbit",
            StorageUnit::Byte => "B",
            StorageUnit::Kilobyte => "KB",
            StorageUnit::Megabyte => "MB",
            StorageUnit::Gigabyte => "GB",
        }
    }
}

impl FromStr for StorageUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bit" => Ok(StorageUnit::Bit),
            "Kbit" => Ok(StorageUnit::Kilobit),
            "Mbit" => Ok(StorageUnit::Megabit),
            "Gbit" => Ok(StorageUnit::Gigabit),
            "B" => Ok(StorageUnit::Byte),
            "KB" => Ok(StorageUnit::Kilobyte),
            "MB" => Ok(StorageUnit::Megabyte),
            "GB" => Ok(StorageUnit::Gigabyte),
            other => Err(UnknownUnit::new("storage size", other)),
        }
    }
}

/// Elapsed time units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeUnit {
    #[serde(rename = "s")]
    Second,
    #[serde(rename = "ms")]
    Millisecond,
}

impl TimeUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            TimeUnit::Second => "s",
            TimeUnit::Millisecond => "ms",
        }
    }
}

impl FromStr for TimeUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" => Ok(TimeUnit::Second),
            "ms" => Ok(TimeUnit::Millisecond),
            other => Err(UnknownUnit::new("time", other)),
        }
    }
}

/// Dimensionless ratio units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatioUnit {
    #[serde(rename = "%")]
    Percentage,
}

impl RatioUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            RatioUnit::Percentage => "%",
        }
    }
}

impl FromStr for RatioUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "%" => Ok(RatioUnit::Percentage),
            other => Err(UnknownUnit::new("ratio", other)),
        }
    }
}

/// Whether a probed service answered at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Unavailable,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Available => write!(f, "available"),
            Availability::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Signal power units reported by wireless tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalPowerUnit {
    #[serde(rename = "dBm")]
    DecibelMilliwatt,
    #[serde(rename = "mW")]
    Milliwatt,
}

impl SignalPowerUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            SignalPowerUnit::DecibelMilliwatt => "dBm",
            SignalPowerUnit::Milliwatt => "mW",
        }
    }
}

impl FromStr for SignalPowerUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dBm" => Ok(SignalPowerUnit::DecibelMilliwatt),
            "mW" => Ok(SignalPowerUnit::Milliwatt),
            other => Err(UnknownUnit::new("signal power", other)),
        }
    }
}

/// Signal frequency units reported by wireless tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalFrequencyUnit {
    #[serde(rename = "Hz")]
    Hertz,
    #[serde(rename = "MHz")]
    Megahertz,
    #[serde(rename = "GHz")]
    Gigahertz,
}

impl SignalFrequencyUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            SignalFrequencyUnit::Hertz => "Hz",
            SignalFrequencyUnit::Megahertz => "MHz",
            SignalFrequencyUnit::Gigahertz => "GHz",
        }
    }
}

impl FromStr for SignalFrequencyUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Hz" => Ok(SignalFrequencyUnit::Hertz),
            "MHz" => Ok(SignalFrequencyUnit::Megahertz),
            "GHz" => Ok(SignalFrequencyUnit::Gigahertz),
            other => Err(UnknownUnit::new("signal frequency", other)),
        }
    }
}

/// Vendor unit aliases seen in wget's summary line.
pub const DOWNLOAD_RATE_REMAPS: &[(&str, &str)] = &[("MB/s", "Mbit/s")];

/// Vendor unit aliases seen in iwconfig/iwlist output.
pub const WIFI_RATE_REMAPS: &[(&str, &str)] = &[("Mb/s", "Mbit/s")];

/// Apply a remap table to a raw captured unit symbol.
pub fn remap_symbol(raw: &str, remaps: &[(&str, &str)]) -> String {
    let mut out = raw.to_string();
    for (from, to) in remaps {
        out = out.replace(from, to);
    }
    out
}
