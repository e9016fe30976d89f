use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::ProbeError;

/// A monitored URL. Equality is exact string match, no normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the host part of the URL is a Tor hidden service.
    ///
    /// Unparseable URLs are never onion targets.
    pub fn is_onion(&self) -> bool {
        url::Url::parse(&self.0)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.ends_with(".onion")))
            .unwrap_or(false)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Target {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// How a probe reaches its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Direct,
    Proxied { proxy: String },
}

impl Route {
    /// `.onion` hosts always go through the SOCKS5 proxy, everything else never does.
    pub fn for_target(target: &Target, proxy: &str) -> Self {
        if target.is_onion() {
            Route::Proxied { proxy: proxy.to_string() }
        } else {
            Route::Direct
        }
    }
}

/// Outcome of one prober invocation. Immutable once sent on the results channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    /// URL that was probed
    pub url: String,

    /// Why the probe counts as failed, if it does
    pub error: Option<ProbeError>,

    /// Wall-clock request time rounded to the millisecond, zero on failure
    pub latency: Duration,

    /// HTTP status code, when a response was received
    pub status_code: Option<u16>,

    /// When the probe completed
    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    pub fn success(url: impl Into<String>, latency: Duration, status_code: u16) -> Self {
        Self {
            url: url.into(),
            error: None,
            latency: round_to_millis(latency),
            status_code: Some(status_code),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(url: impl Into<String>, error: ProbeError) -> Self {
        Self {
            url: url.into(),
            error: Some(error),
            latency: Duration::ZERO,
            status_code: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the status code of a response that was mapped to an error.
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Status rendered as `"200 OK"`, or an empty string when no response arrived.
    pub fn status_text(&self) -> String {
        self.status_code.map(status_text).unwrap_or_default()
    }
}

/// Render a numeric status the way HTTP reports it, e.g. `503 Service Unavailable`.
pub fn status_text(code: u16) -> String {
    match reqwest::StatusCode::from_u16(code) {
        Ok(status) => status.to_string(),
        Err(_) => code.to_string(),
    }
}

/// Round half-up to whole milliseconds.
pub fn round_to_millis(duration: Duration) -> Duration {
    let micros = duration.as_micros();
    Duration::from_millis(((micros + 500) / 1000) as u64)
}
