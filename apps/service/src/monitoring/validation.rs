//! Sanity checks applied to configured targets and timings.
//!
//! Failures here never stop the process: the config loader drops invalid
//! targets with a warning and falls back to defaults for invalid timings.

use anyhow::{Result, anyhow};
use std::time::Duration;
use url::Url;

/// Validate that a target is an absolute HTTP/HTTPS URL with a host
pub fn validate_target(target: &str) -> Result<()> {
    let url = Url::parse(target).map_err(|e| anyhow!("Invalid URL: {}", e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("Invalid scheme for HTTP monitor: {}", other)),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(anyhow!("URL has no host: {}", target)),
    }

    if url.port() == Some(0) {
        return Err(anyhow!("Port 0 is not valid"));
    }

    Ok(())
}

/// Validate the polling interval
pub fn validate_check_interval(interval: Duration) -> Result<()> {
    const MIN_INTERVAL: Duration = Duration::from_secs(1);
    const MAX_INTERVAL: Duration = Duration::from_secs(86400); // 24 hours

    if interval < MIN_INTERVAL {
        return Err(anyhow!(
            "Check interval too short: {:?} (minimum: {:?})",
            interval,
            MIN_INTERVAL
        ));
    }

    if interval > MAX_INTERVAL {
        return Err(anyhow!(
            "Check interval too long: {:?} (maximum: {:?})",
            interval,
            MAX_INTERVAL
        ));
    }

    Ok(())
}

/// Validate timeout is reasonable
pub fn validate_timeout(timeout_seconds: u64) -> Result<()> {
    const MIN_TIMEOUT: u64 = 1;
    const MAX_TIMEOUT: u64 = 300; // 5 minutes

    if timeout_seconds < MIN_TIMEOUT {
        return Err(anyhow!(
            "Timeout too short: {} seconds (minimum: {})",
            timeout_seconds,
            MIN_TIMEOUT
        ));
    }

    if timeout_seconds > MAX_TIMEOUT {
        return Err(anyhow!(
            "Timeout too long: {} seconds (maximum: {})",
            timeout_seconds,
            MAX_TIMEOUT
        ));
    }

    Ok(())
}

/// Validate a `host:port` proxy address
pub fn validate_proxy_address(address: &str) -> Result<()> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("Proxy address must be in format host:port"))?;

    if host.is_empty() {
        return Err(anyhow!("Proxy address has no host"));
    }

    let port: u16 = port.parse().map_err(|_| anyhow!("Invalid port number"))?;
    if port == 0 {
        return Err(anyhow!("Port 0 is not valid"));
    }

    Ok(())
}
