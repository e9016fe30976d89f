use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::checker::Transport;
use super::retry::RetryPolicy;
use super::types::{ProbeResult, Route, Target};
use crate::error::ProbeError;

const SERVICE_UNAVAILABLE: u16 = 503;

/// Proxy settings used for `.onion` targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub address: String,
    /// Dial timeout of the reachability check made before each proxied request
    pub check_timeout: Duration,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self { address: "127.0.0.1:9050".to_string(), check_timeout: Duration::from_secs(5) }
    }
}

/// Prober - turns one target into exactly one [`ProbeResult`]
pub struct Prober {
    transport: Arc<dyn Transport>,
    proxy: ProxySettings,
    retry: RetryPolicy,
}

impl Prober {
    pub fn new(transport: Arc<dyn Transport>, proxy: ProxySettings) -> Self {
        Self { transport, proxy, retry: RetryPolicy::single() }
    }

    /// Enable the retrying mode used by the single-URL watchdog.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Probe `target` and deliver the result on `tx`.
    ///
    /// Always sends exactly one result. A closed channel is logged and the result dropped.
    pub async fn probe_into(&self, target: Target, tx: mpsc::Sender<ProbeResult>) {
        let result = self.probe(&target).await;
        if let Err(e) = tx.send(result).await {
            error!(url = %target, "Failed to send probe result: {}", e);
        }
    }

    /// Probe `target`, retrying according to the configured policy.
    pub async fn probe(&self, target: &Target) -> ProbeResult {
        if !self.retry.is_retrying() {
            return self.attempt(target).await;
        }

        let mut last = None;
        for attempt in 0..self.retry.max_attempts {
            let result = self.attempt(target).await;
            let Some(err) = result.error.clone() else {
                return result;
            };

            warn!(
                url = %target,
                attempt = attempt + 1,
                max_attempts = self.retry.max_attempts,
                "Probe attempt failed: {}", err
            );
            last = Some(err);

            if attempt + 1 < self.retry.max_attempts {
                let delay = self.retry.backoff(attempt);
                debug!(url = %target, ?delay, "Backing off before next attempt");
                tokio::time::sleep(delay).await;
            }
        }

        let last = last.unwrap_or(ProbeError::Transport("no attempt made".into()));
        ProbeResult::failure(
            target.as_str(),
            ProbeError::MaxAttemptsReached {
                attempts: self.retry.max_attempts,
                last: Box::new(last),
            },
        )
    }

    /// A single attempt: route, optional proxy check, one GET.
    async fn attempt(&self, target: &Target) -> ProbeResult {
        if let Err(e) = url::Url::parse(target.as_str()) {
            return ProbeResult::failure(
                target.as_str(),
                ProbeError::InvalidUrl { url: target.to_string(), reason: e.to_string() },
            );
        }

        let route = Route::for_target(target, &self.proxy.address);

        if let Route::Proxied { proxy } = &route {
            info!(url = %target, proxy = %proxy, "Connecting via Tor proxy");
            if let Err(e) = self.transport.check_proxy(proxy, self.proxy.check_timeout).await {
                return ProbeResult::failure(target.as_str(), e);
            }
        }

        let start = Instant::now();
        match self.transport.get(target.as_str(), &route).await {
            Ok(SERVICE_UNAVAILABLE) => {
                ProbeResult::failure(target.as_str(), ProbeError::ServiceUnavailable)
                    .with_status(SERVICE_UNAVAILABLE)
            }
            Ok(status) => ProbeResult::success(target.as_str(), start.elapsed(), status),
            Err(e) => ProbeResult::failure(target.as_str(), e),
        }
    }
}
