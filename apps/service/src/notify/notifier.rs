use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, error, info, warn};

use super::tracker::{StatusTracker, Transition};
use crate::monitoring::ProbeResult;
use crate::sinks::MessageSink;
use crate::zone;

pub const STARTUP_MESSAGE: &str =
    "🚀 <b>URL Monitor Bot started</b>\nMonitoring URLs for availability...";

/// Decides whether a result is a transition and dispatches alerts for it
pub struct Notifier {
    tracker: Arc<StatusTracker>,
    sink: Option<Arc<dyn MessageSink>>,
    timezone: Tz,
}

impl Notifier {
    /// `sink` is `None` when messaging is not configured; transitions are still tracked.
    pub fn new(
        tracker: Arc<StatusTracker>,
        sink: Option<Arc<dyn MessageSink>>,
        timezone: Tz,
    ) -> Self {
        Self { tracker, sink, timezone }
    }

    /// Commit the state change for `result`, then send at most one message about it.
    ///
    /// The new state stays committed even when delivery fails.
    pub async fn handle(&self, result: &ProbeResult) -> Option<Transition> {
        let Some(transition) = self.tracker.observe(&result.url, result.is_failure()).await else {
            if result.is_failure() {
                debug!(url = %result.url, "URL is already marked as down, skipping notification");
            }
            return None;
        };

        let message = match transition {
            Transition::WentDown => {
                warn!(url = %result.url, "Marking URL as DOWN and sending notification");
                let reason = result.error.as_ref().map(ToString::to_string).unwrap_or_default();
                down_alert(&result.url, result.timestamp, self.timezone, &reason)
            }
            Transition::Recovered => {
                info!(url = %result.url, "Marking URL as UP and sending recovery notification");
                recovery_notice(
                    &result.url,
                    result.timestamp,
                    self.timezone,
                    &result.status_text(),
                    result.latency,
                )
            }
        };

        self.dispatch(&message).await;

        let down = self.tracker.down_targets().await;
        info!(down = down.len(), "{} URL(s) currently down", down.len());
        Some(transition)
    }

    /// Announce that monitoring has started.
    pub async fn announce_startup(&self) {
        self.dispatch(STARTUP_MESSAGE).await;
    }

    async fn dispatch(&self, message: &str) {
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(e) = sink.send(message).await {
            error!("Failed to send Telegram notification: {}", e);
        }
    }
}

pub fn down_alert(url: &str, at: DateTime<Utc>, tz: Tz, reason: &str) -> String {
    format!(
        "<b>🔴 ALERT: Service is DOWN</b>\n\n<b>URL:</b> {}\n<b>Time:</b> {}\n<b>Error:</b> {}",
        escape_html(url),
        zone::rfc3339(at, tz),
        escape_html(reason)
    )
}

pub fn recovery_notice(
    url: &str,
    at: DateTime<Utc>,
    tz: Tz,
    status: &str,
    latency: Duration,
) -> String {
    format!(
        "<b>✅ RECOVERED: Service is back online</b>\n\n\
         <b>URL:</b> {}\n<b>Time:</b> {}\n<b>Status:</b> {}\n<b>Latency:</b> {}",
        escape_html(url),
        zone::rfc3339(at, tz),
        escape_html(status),
        humantime::format_duration(latency)
    )
}

/// Escape the three characters Telegram's HTML parse mode treats specially.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
