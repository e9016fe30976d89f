use std::sync::Arc;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::monitoring::ProbeResult;
use crate::notify::{Notifier, Transition};
use crate::sinks::loki::APP_LABEL;
use crate::sinks::{Level, LogSink};
use crate::zone;

/// Structured record shipped to the log sink for every probe result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub level: Level,
    pub app: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub latency: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogRecord {
    pub fn from_result(result: &ProbeResult, timezone: Tz) -> Self {
        let timestamp = zone::rfc3339(result.timestamp, timezone);
        match &result.error {
            Some(err) => Self {
                timestamp,
                level: Level::Error,
                app: APP_LABEL.to_string(),
                url: result.url.clone(),
                status: result.status_text(),
                latency: String::new(),
                message: "Ping failed".to_string(),
                error: Some(err.to_string()),
            },
            None => Self {
                timestamp,
                level: Level::Info,
                app: APP_LABEL.to_string(),
                url: result.url.clone(),
                status: result.status_text(),
                latency: humantime::format_duration(result.latency).to_string(),
                message: "Ping successful".to_string(),
                error: None,
            },
        }
    }
}

/// Result consumer - drains the results channel until every sender is gone
pub struct ResultConsumer {
    result_rx: mpsc::Receiver<ProbeResult>,
    log_sink: Option<Arc<dyn LogSink>>,
    notifier: Notifier,
    timezone: Tz,
}

impl ResultConsumer {
    pub fn new(
        result_rx: mpsc::Receiver<ProbeResult>,
        log_sink: Option<Arc<dyn LogSink>>,
        notifier: Notifier,
        timezone: Tz,
    ) -> Self {
        Self { result_rx, log_sink, notifier, timezone }
    }

    /// Run until the channel closes. Sink failures never stop the loop.
    pub async fn run(mut self) {
        while let Some(result) = self.result_rx.recv().await {
            self.handle(result).await;
        }
        info!("Result channel closed, consumer exiting");
    }

    /// Log, ship and notify for a single result.
    pub async fn handle(&self, result: ProbeResult) -> Option<Transition> {
        let record = LogRecord::from_result(&result, self.timezone);

        match &result.error {
            Some(err) => error!(url = %result.url, "Error pinging {}: {}", result.url, err),
            None => info!(
                url = %result.url,
                status = %record.status,
                latency_ms = result.latency.as_millis() as u64,
                "Successful ping: {}, URL: {:<40}, Latency: {}",
                record.status,
                format!("'{}'", result.url),
                record.latency
            ),
        }

        self.ship(&record).await;
        self.notifier.handle(&result).await
    }

    async fn ship(&self, record: &LogRecord) {
        let Some(sink) = &self.log_sink else {
            return;
        };

        let message = match serde_json::to_string(record) {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to encode log record: {}", e);
                return;
            }
        };

        if let Err(e) = sink.push(record.level, &message).await {
            error!("Failed to send logs to Loki: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProbeError, SinkError};
    use crate::notify::StatusTracker;
    use crate::notify::notifier::tests::RecordingSink;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingLog {
        pushed: Mutex<Vec<(Level, String)>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl LogSink for RecordingLog {
        async fn push(&self, level: Level, message: &str) -> Result<(), SinkError> {
            self.pushed.lock().unwrap().push((level, message.to_string()));
            if self.fail {
                Err(SinkError::NotInitialized("loki"))
            } else {
                Ok(())
            }
        }
    }

    fn consumer(
        rx: mpsc::Receiver<ProbeResult>,
        log: Arc<RecordingLog>,
        messages: Arc<RecordingSink>,
    ) -> ResultConsumer {
        let notifier = Notifier::new(Arc::new(StatusTracker::new()), Some(messages), Tz::UTC);
        ResultConsumer::new(rx, Some(log), notifier, Tz::UTC)
    }

    #[test]
    fn test_success_record() {
        let result = ProbeResult::success("https://ok.example", Duration::from_millis(120), 200);
        let record = LogRecord::from_result(&result, Tz::UTC);

        assert_eq!(record.level, Level::Info);
        assert_eq!(record.status, "200 OK");
        assert_eq!(record.latency, "120ms");
        assert_eq!(record.message, "Ping successful");
        assert_eq!(record.error, None);
        assert_eq!(record.app, "ping-monitor");
    }

    #[test]
    fn test_failure_record_omits_empty_fields() {
        let result = ProbeResult::failure(
            "https://flaky.example",
            ProbeError::Transport("connection refused".into()),
        );
        let record = LogRecord::from_result(&result, Tz::UTC);
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();

        assert_eq!(json["level"], "error");
        assert_eq!(json["message"], "Ping failed");
        assert_eq!(json["error"], "connection refused");
        assert!(json.get("latency").is_none());
        assert!(json.get("status").is_none());
    }

    #[tokio::test]
    async fn test_consumer_ships_and_notifies() {
        let (tx, rx) = mpsc::channel(8);
        let log = Arc::new(RecordingLog::default());
        let messages = Arc::new(RecordingSink::default());
        let consumer = consumer(rx, log.clone(), messages.clone());

        let url = "https://flaky.example";
        tx.send(ProbeResult::failure(url, ProbeError::Transport("connection refused".into())))
            .await
            .unwrap();
        tx.send(ProbeResult::success(url, Duration::from_millis(80), 200)).await.unwrap();
        tx.send(ProbeResult::success(url, Duration::from_millis(90), 200)).await.unwrap();
        drop(tx);

        consumer.run().await;

        let pushed = log.pushed.lock().unwrap().clone();
        assert_eq!(pushed.len(), 3);
        assert_eq!(pushed[0].0, Level::Error);
        let first: LogRecord = serde_json::from_str(&pushed[0].1).unwrap();
        assert_eq!(first.url, url);

        let sent = messages.messages();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].contains("Service is DOWN"));
        assert!(sent[1].contains("RECOVERED"));
    }

    #[tokio::test]
    async fn test_log_sink_failure_does_not_stop_loop() {
        let (tx, rx) = mpsc::channel(8);
        let log = Arc::new(RecordingLog { fail: true, ..Default::default() });
        let messages = Arc::new(RecordingSink::default());
        let consumer = consumer(rx, log.clone(), messages.clone());

        tx.send(ProbeResult::failure("https://a.example", ProbeError::ServiceUnavailable))
            .await
            .unwrap();
        tx.send(ProbeResult::failure("https://b.example", ProbeError::ServiceUnavailable))
            .await
            .unwrap();
        drop(tx);

        consumer.run().await;

        assert_eq!(log.pushed.lock().unwrap().len(), 2);
        assert_eq!(messages.messages().len(), 2);
    }
}
