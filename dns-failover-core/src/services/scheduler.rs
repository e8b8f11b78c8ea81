//! 定时检测调度

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::error::{CoreError, CoreResult};
use crate::services::failover_engine::{FailoverEngine, ForwardCheck};
use crate::services::reporter::{Reporter, render_scheduled, should_notify};
use crate::types::{CheckEventSender, CheckReport};

/// Runs cycles on a fixed interval and on demand, never two at a time.
pub struct Scheduler {
    engine: Arc<FailoverEngine>,
    reporter: Arc<Reporter>,
    interval: Duration,
    guard: Mutex<()>,
}

impl Scheduler {
    #[must_use]
    pub fn new(engine: Arc<FailoverEngine>, reporter: Arc<Reporter>, interval: Duration) -> Self {
        Self {
            engine,
            reporter,
            interval,
            guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a cycle or forward check currently holds the guard.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.guard.try_lock().is_err()
    }

    /// One scheduled tick. Skipped if a cycle is already running; reports
    /// are only published when something deserves attention.
    pub async fn run_scheduled(&self) -> Option<CheckReport> {
        let Ok(_running) = self.guard.try_lock() else {
            log::info!("Previous check still running, skipping this tick");
            return None;
        };

        let report = match self.engine.run_cycle(None).await {
            Ok(report) => report,
            Err(e) => {
                log::error!("Check cycle aborted: {e}");
                return None;
            }
        };

        if should_notify(&report, self.engine.counter()) {
            let text = render_scheduled(&report, self.engine.counter());
            if let Err(e) = self.reporter.publish(&text).await {
                log::error!("Failed to publish check report: {e}");
            }
        } else {
            log::info!("Nothing to report this cycle");
        }
        Some(report)
    }

    /// Admin-triggered cycle. The caller renders and delivers the report.
    ///
    /// # Errors
    /// `CycleInProgress` when another cycle is running.
    pub async fn run_manual(&self, events: Option<&CheckEventSender>) -> CoreResult<CheckReport> {
        let _running = self
            .guard
            .try_lock()
            .map_err(|_| CoreError::CycleInProgress)?;
        log::info!("Manual check started");
        self.engine.run_cycle(events).await
    }

    /// Probe one forward and switch to it if reachable, under the same guard.
    pub async fn check_forward(
        &self,
        forward_id: i64,
        events: Option<&CheckEventSender>,
    ) -> CoreResult<ForwardCheck> {
        let _running = self
            .guard
            .try_lock()
            .map_err(|_| CoreError::CycleInProgress)?;
        self.engine.check_forward(forward_id, events).await
    }

    /// Tick until `shutdown` resolves. The first tick fires immediately; a
    /// cycle in flight when shutdown arrives is allowed to finish.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        log::info!("Scheduler started, interval {}s", self.interval.as_secs());

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.run_scheduled().await;
                }
            }
        }
        log::info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::failure_counter::InfraFailureCounter;
    use crate::test_utils::{MockProbe, TestHarness, create_test_harness, seed_domain, seed_forward};

    fn scheduler(harness: &TestHarness) -> Arc<Scheduler> {
        let counter = Arc::new(InfraFailureCounter::new(harness.ctx.settings.api_fail_threshold));
        let engine = Arc::new(FailoverEngine::new(harness.ctx.clone(), counter));
        let reporter = Arc::new(Reporter::new(harness.ctx.clone()).with_gap(Duration::ZERO));
        Arc::new(Scheduler::new(engine, reporter, Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn quiet_cycle_sends_nothing() {
        let harness = create_test_harness();
        seed_domain(&harness.domains, "api.example.com", 443).await;
        harness.prober.script("api.example.com", MockProbe::Reachable("1.1.1.1")).await;

        let report = scheduler(&harness).run_scheduled().await.unwrap();

        assert_eq!(report.healthy_count, 1);
        assert!(harness.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn switch_is_published() {
        let harness = create_test_harness();
        let domain = seed_domain(&harness.domains, "api.example.com", 443).await;
        seed_forward(&harness.domains, domain.id, "edge-1.example.net", 10, 0).await;
        harness.prober.script("api.example.com", MockProbe::Exhausted).await;
        harness.prober.script("edge-1.example.net", MockProbe::Reachable("203.0.113.7")).await;

        scheduler(&harness).run_scheduled().await.unwrap();

        let sent = harness.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("DNS switched"));
    }

    #[tokio::test]
    async fn infra_failures_are_held_back_until_threshold() {
        let harness = create_test_harness();
        seed_domain(&harness.domains, "api.example.com", 443).await;
        harness.prober.script("api.example.com", MockProbe::InfraError).await;
        let scheduler = scheduler(&harness);

        scheduler.run_scheduled().await;
        scheduler.run_scheduled().await;
        assert!(harness.notifier.sent().await.is_empty());

        scheduler.run_scheduled().await;
        let sent = harness.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("3 in a row"));
    }

    #[tokio::test]
    async fn manual_run_is_rejected_while_busy() {
        let harness = create_test_harness();
        let scheduler = scheduler(&harness);

        let held = scheduler.guard.lock().await;
        assert!(scheduler.is_busy());
        assert!(matches!(
            scheduler.run_manual(None).await,
            Err(CoreError::CycleInProgress)
        ));
        assert!(matches!(
            scheduler.check_forward(1, None).await,
            Err(CoreError::CycleInProgress)
        ));
        assert!(scheduler.run_scheduled().await.is_none());
        drop(held);

        assert!(scheduler.run_manual(None).await.is_ok());
    }

    #[tokio::test]
    async fn manual_run_does_not_publish() {
        let harness = create_test_harness();
        seed_domain(&harness.domains, "api.example.com", 443).await;
        harness.prober.script("api.example.com", MockProbe::Exhausted).await;

        let report = scheduler(&harness).run_manual(None).await.unwrap();

        assert_eq!(report.disconnected.len(), 1);
        assert!(harness.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let harness = create_test_harness();
        seed_domain(&harness.domains, "api.example.com", 443).await;
        harness.prober.script("api.example.com", MockProbe::Reachable("1.1.1.1")).await;
        let scheduler = scheduler(&harness);

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn({
            let scheduler = scheduler.clone();
            async move {
                scheduler
                    .run(async {
                        let _ = rx.await;
                    })
                    .await;
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        task.await.unwrap();

        assert_eq!(harness.prober.probed().await, vec!["api.example.com:443"]);
    }
}
