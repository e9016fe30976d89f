//! Grafana Loki push client.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::debug;

use super::{Level, LogSink, error_body};
use crate::error::SinkError;

/// Value of the `app` stream label on every pushed record
pub const APP_LABEL: &str = "ping-monitor";

/// Endpoint and basic-auth credentials for the Loki push API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LokiConfig {
    pub url: String,
    pub user: String,
    pub api_key: String,
}

#[derive(Debug, Serialize)]
struct PushData<'a> {
    streams: Vec<Stream<'a>>,
}

#[derive(Debug, Serialize)]
struct Stream<'a> {
    stream: BTreeMap<&'static str, &'a str>,
    values: Vec<[String; 2]>,
}

pub struct LokiClient {
    config: LokiConfig,
    client: reqwest::Client,
}

impl LokiClient {
    pub fn new(config: LokiConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { config, client })
    }

    fn payload<'a>(level: Level, message: &'a str, at: SystemTime) -> PushData<'a> {
        let nanos = at.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
        PushData {
            streams: vec![Stream {
                stream: BTreeMap::from([("level", level.as_str()), ("app", APP_LABEL)]),
                values: vec![[nanos.to_string(), message.to_string()]],
            }],
        }
    }
}

#[async_trait::async_trait]
impl LogSink for LokiClient {
    async fn push(&self, level: Level, message: &str) -> Result<(), SinkError> {
        let body = serde_json::to_vec(&Self::payload(level, message, SystemTime::now()))?;

        let response = self
            .client
            .post(&self.config.url)
            .basic_auth(&self.config.user, Some(&self.config.api_key))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body: error_body(response, 512).await,
            });
        }

        debug!(%level, "Pushed log record to Loki");
        Ok(())
    }
}
