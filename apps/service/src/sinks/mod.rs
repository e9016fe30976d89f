/// External sinks - best-effort delivery of log records and chat messages
///
/// Neither sink retries. Callers log a failed delivery and move on.
pub mod loki;
pub mod telegram;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SinkError;

pub use loki::{LokiClient, LokiConfig};
pub use telegram::{BotConfig, TelegramClient};

/// Severity attached to a shipped log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote log sink accepting a level and an already encoded message
#[async_trait::async_trait]
pub trait LogSink: Send + Sync {
    async fn push(&self, level: Level, message: &str) -> Result<(), SinkError>;
}

/// Messaging sink accepting formatted (HTML) text
#[async_trait::async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), SinkError>;
}

/// Read at most `limit` bytes of an error response for diagnostics.
pub(crate) async fn error_body(response: reqwest::Response, limit: usize) -> String {
    match response.text().await {
        Ok(body) => truncate(&body, limit).to_string(),
        Err(e) => format!("<unreadable body: {e}>"),
    }
}

/// Cut `text` to at most `max_chars` characters.
pub(crate) fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Accept one HTTP request, answer with `status_line` and hand back the raw request.
    pub(crate) async fn one_shot_server(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            let reply = format!(
                "HTTP/1.1 {status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
        });

        (format!("http://{addr}"), rx)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let Some(split) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&raw[..split]);
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        raw.len() - (split + 4) >= length
    }

    /// The JSON body of a raw HTTP request.
    pub(crate) fn json_body(raw: &str) -> serde_json::Value {
        let (_, body) = raw.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("🚀 started", 1), "🚀");
        assert_eq!(truncate("short", 30), "short");
        assert_eq!(truncate("", 3), "");
    }

    #[test]
    fn test_level_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Level::Error).unwrap(), "\"error\"");
        assert_eq!(Level::Info.to_string(), "info");
    }
}
