use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{info, warn};

use super::executor::Prober;
use super::types::{ProbeResult, Target};

/// Monitoring scheduler - launches one probe task per target on every tick
///
/// Rounds never wait for each other: a slow round keeps running while the next
/// one starts. In-flight probes are not cancelled when the scheduler stops.
pub struct Scheduler {
    prober: Arc<Prober>,
    targets: Arc<[Target]>,
    period: Duration,
    result_tx: mpsc::Sender<ProbeResult>,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(
        prober: Arc<Prober>,
        targets: Vec<Target>,
        period: Duration,
        result_tx: mpsc::Sender<ProbeResult>,
    ) -> Self {
        Self { prober, targets: targets.into(), period, result_tx }
    }

    /// Spawn one probe per target and return how many were launched.
    pub fn launch_round(&self) -> usize {
        for target in self.targets.iter().cloned() {
            let prober = self.prober.clone();
            let tx = self.result_tx.clone();
            tokio::spawn(async move { prober.probe_into(target, tx).await });
        }
        self.targets.len()
    }

    /// Run rounds forever: one immediately, then one per period.
    ///
    /// Returns once the results channel is closed.
    pub async fn run(self) {
        if self.targets.is_empty() {
            warn!("No targets configured, scheduler will idle");
        }

        let mut timer = interval(self.period);
        let mut round: u64 = 0;

        loop {
            timer.tick().await;

            if self.result_tx.is_closed() {
                info!("Result channel closed, stopping scheduler");
                break;
            }

            if round > 0 {
                info!("Ticker triggered, pinging all URLs");
            }
            let launched = self.launch_round();
            tracing::debug!(round, launched, "Launched probe round");
            round += 1;
        }
    }

    /// Spawn [`Scheduler::run`] on the runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::monitoring::executor::ProxySettings;
    use crate::monitoring::executor::tests::FakeTransport;
    use crate::monitoring::types::Route;

    fn prober() -> Arc<Prober> {
        Arc::new(Prober::new(Arc::new(FakeTransport::default()), ProxySettings::default()))
    }

    fn targets() -> Vec<Target> {
        vec![Target::from("https://ok.example"), Target::from("https://flaky.example")]
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_round_starts_immediately() {
        let prober = prober();
        let (tx, mut rx) = mpsc::channel(16);
        let _handle = Scheduler::new(prober, targets(), Duration::from_secs(600), tx).spawn();

        let mut urls = vec![rx.recv().await.unwrap().url, rx.recv().await.unwrap().url];
        urls.sort();
        assert_eq!(urls, vec!["https://flaky.example", "https://ok.example"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rounds_repeat_every_period() {
        let transport = Arc::new(FakeTransport::default());
        let prober = Arc::new(Prober::new(transport.clone(), ProxySettings::default()));
        let (tx, mut rx) = mpsc::channel(64);
        let _handle = Scheduler::new(prober, targets(), Duration::from_secs(60), tx).spawn();

        // Startup round plus three ticks
        for _ in 0..8 {
            tokio::time::timeout(Duration::from_secs(200), rx.recv()).await.unwrap().unwrap();
        }
        assert!(transport.calls() >= 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_round_does_not_delay_next_tick() {
        /// Transport whose requests never finish within the test
        struct Hanging;

        #[async_trait::async_trait]
        impl crate::monitoring::Transport for Hanging {
            async fn get(&self, _url: &str, _route: &Route) -> Result<u16, ProbeError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(200)
            }

            async fn check_proxy(
                &self,
                _proxy: &str,
                _timeout: Duration,
            ) -> Result<(), ProbeError> {
                Ok(())
            }
        }

        let prober = Arc::new(Prober::new(Arc::new(Hanging), ProxySettings::default()));
        let (tx, mut rx) = mpsc::channel(64);
        let scheduler = Scheduler::new(prober, targets(), Duration::from_secs(10), tx);
        let mut launched = 0;

        // Drive rounds by hand to observe that launching never blocks.
        for _ in 0..3 {
            launched += scheduler.launch_round();
            tokio::time::advance(Duration::from_secs(10)).await;
        }

        assert_eq!(launched, 6);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_scheduler_stops_when_channel_closed() {
        let prober = prober();
        let (tx, rx) = mpsc::channel(16);
        drop(rx);

        let handle = Scheduler::new(prober, targets(), Duration::from_millis(10), tx).spawn();
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_empty_target_list_launches_nothing() {
        let prober = prober();
        let (tx, _rx) = mpsc::channel(1);
        let scheduler = Scheduler::new(prober, Vec::new(), Duration::from_secs(1), tx);
        assert_eq!(scheduler.launch_round(), 0);
    }
}
