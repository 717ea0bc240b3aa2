//! Construction-time validation.
//!
//! Plugins validate their parameters once, at construction; `measure`
//! never re-checks them.

use netgauge_common::error::{Error, Result};
use url::Url;

/// A well-formed absolute URL with a host component.
pub fn validate_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|_| Error::InvalidUrl(raw.to_string()))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(Error::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// A plausible hostname or address literal: non-empty, no whitespace,
/// no empty dot-separated labels.
pub fn validate_host(host: &str) -> Result<()> {
    let invalid = || Error::InvalidHost(host.to_string());

    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    // IPv6 literals have no dot labels to check.
    if !host.contains(':') && host.split('.').any(str::is_empty) {
        return Err(invalid());
    }
    Ok(())
}
