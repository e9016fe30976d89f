//! Orchestrator module - wires prober, scheduler, consumer and sinks together
//!
//! Data flows scheduler -> probe tasks -> results channel -> consumer ->
//! {log sink, notifier -> messaging sink}. The scheduler holds the only sender,
//! so the consumer runs until the process stops.

use anyhow::Result;
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::consumer::ResultConsumer;
use crate::monitoring::{HttpTransport, ProbeResult, Prober, Scheduler, Transport};
use crate::notify::{Notifier, StatusTracker};
use crate::sinks::{LogSink, LokiClient, MessageSink, TelegramClient};
use crate::zone;

/// Main orchestrator for the pingwatch service
pub struct Orchestrator {
    config: Arc<Config>,
    prober: Arc<Prober>,
    tracker: Arc<StatusTracker>,
    log_sink: Option<Arc<dyn LogSink>>,
    message_sink: Option<Arc<dyn MessageSink>>,
    timezone: Tz,
}

impl Orchestrator {
    /// Create and start a new orchestrator
    pub async fn start(config: Config) -> Result<()> {
        Self::new(config)?.run().await
    }

    /// Build the production components described by `config`.
    ///
    /// Sinks with missing credentials are disabled with a warning.
    pub fn new(config: Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config.tor.proxy, config.timeouts())?);

        let log_sink: Option<Arc<dyn LogSink>> = match config.loki_config() {
            Some(loki) => Some(Arc::new(LokiClient::new(loki)?)),
            None => None,
        };

        let message_sink: Option<Arc<dyn MessageSink>> = match config.bot_config() {
            Some(bot) => Some(Arc::new(TelegramClient::new(bot)?)),
            None => None,
        };

        Ok(Self::from_parts(config, transport, log_sink, message_sink))
    }

    /// Assemble an orchestrator from explicit parts.
    pub fn from_parts(
        config: Config,
        transport: Arc<dyn Transport>,
        log_sink: Option<Arc<dyn LogSink>>,
        message_sink: Option<Arc<dyn MessageSink>>,
    ) -> Self {
        let mut prober = Prober::new(transport, config.proxy_settings());
        if let Some(policy) = config.retry_policy() {
            let schedule: Vec<_> = policy.delays().collect();
            info!(
                max_attempts = policy.max_attempts,
                backoff = ?schedule,
                "Retrying prober enabled"
            );
            prober = prober.with_retry(policy);
        }

        let timezone = zone::resolve(&config.logging.timezone);

        Self {
            config: Arc::new(config),
            prober: Arc::new(prober),
            tracker: Arc::new(StatusTracker::new()),
            log_sink,
            message_sink,
            timezone,
        }
    }

    /// Run the monitor until the process stops
    pub async fn run(self) -> Result<()> {
        info!("Starting pingwatch orchestrator...");

        let targets = self.config.targets();
        if targets.is_empty() {
            warn!("No URLs to monitor, set MONITOR_URLS or [monitor].urls");
        }
        info!("Monitoring {} URLs", targets.len());
        info!("Using ping interval: {}", humantime::format_duration(self.config.interval()));

        let (result_tx, result_rx) =
            mpsc::channel::<ProbeResult>(self.config.monitor.result_buffer);

        let notifier =
            Notifier::new(self.tracker.clone(), self.message_sink.clone(), self.timezone);
        notifier.announce_startup().await;

        let scheduler =
            Scheduler::new(self.prober.clone(), targets, self.config.interval(), result_tx);
        let scheduler_handle = scheduler.spawn();

        ResultConsumer::new(result_rx, self.log_sink.clone(), notifier, self.timezone)
            .run()
            .await;

        scheduler_handle.abort();
        Ok(())
    }

    /// Probe every target once, concurrently, without touching the sinks.
    pub async fn run_once(&self) -> Vec<ProbeResult> {
        let probes = self.config.targets().into_iter().map(|target| {
            let prober = self.prober.clone();
            async move { prober.probe(&target).await }
        });
        futures::future::join_all(probes).await
    }
}
