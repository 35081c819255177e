use crate::models::TelemetrySample;
use crate::services::{
    live_sync::{LiveSync, SyncError},
    notifier::DispatchOutcome,
    subscribers::{SubscriberEnumerator, SubscriberSet},
    telemetry_fetcher::{FetchError, TelemetrySource},
};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The previous tick is still fanning out
    PreviousTickRunning,
    FetchFailed(FetchError),
}

/// Result of fanning one sample out to every subscriber
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanoutSummary {
    pub subscribers: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub notified: usize,
    /// Subscribers came from the default-user fallback
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickReport {
    Skipped(SkipReason),
    Completed(FanoutSummary),
}

/// One tick of the live-sync loop: fetch once, then reconcile the shared
/// sample for every subscriber concurrently.
pub struct SyncEngine {
    source: Arc<dyn TelemetrySource>,
    subscribers: SubscriberEnumerator,
    live_sync: Arc<LiveSync>,
    device_label: String,
    tick_guard: Arc<Mutex<()>>,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        subscribers: SubscriberEnumerator,
        live_sync: Arc<LiveSync>,
        device_label: &str,
    ) -> Self {
        Self {
            source,
            subscribers,
            live_sync,
            device_label: device_label.to_string(),
            tick_guard: Arc::new(Mutex::new(())),
        }
    }

    pub fn device_label(&self) -> &str {
        &self.device_label
    }

    pub fn source(&self) -> Arc<dyn TelemetrySource> {
        Arc::clone(&self.source)
    }

    pub fn live_sync(&self) -> Arc<LiveSync> {
        Arc::clone(&self.live_sync)
    }

    pub fn default_user_id(&self) -> i32 {
        self.subscribers.default_user_id()
    }

    pub async fn run_tick(&self) -> TickReport {
        let _guard = match self.tick_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("Previous sync tick still running, skipping this one");
                return TickReport::Skipped(SkipReason::PreviousTickRunning);
            }
        };

        let sample = match self.source.fetch().await {
            Ok(sample) => sample,
            Err(e) => {
                error!("Telemetry fetch failed, skipping tick: {}", e);
                return TickReport::Skipped(SkipReason::FetchFailed(e));
            }
        };

        let subscribers = self.subscribers.list_subscribers().await;
        let summary = self.fan_out(&subscribers, sample).await;

        info!(
            "Sync tick completed: {} subscribers, {} successful, {} failed, {} notified{}",
            summary.subscribers,
            summary.succeeded,
            summary.failed,
            summary.notified,
            if summary.degraded { " (degraded)" } else { "" }
        );

        TickReport::Completed(summary)
    }

    async fn fan_out(
        &self,
        subscribers: &SubscriberSet,
        sample: TelemetrySample,
    ) -> FanoutSummary {
        let mut tasks = JoinSet::new();
        for user_id in subscribers.user_ids() {
            let live_sync = Arc::clone(&self.live_sync);
            let label = self.device_label.clone();
            tasks.spawn(async move {
                let result = live_sync.sync_and_notify(user_id, &label, &sample).await;
                (user_id, result)
            });
        }

        let mut summary = FanoutSummary {
            subscribers: tasks.len(),
            degraded: subscribers.is_degraded(),
            ..Default::default()
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) => {
                    summary.succeeded += 1;
                    if outcome.notified() {
                        summary.notified += 1;
                    }
                }
                Ok((user_id, Err(e))) => {
                    summary.failed += 1;
                    if let SyncError::WriteFailed {
                        dispatch: Some(DispatchOutcome::Sent),
                        ..
                    } = &e
                    {
                        summary.notified += 1;
                    }
                    error!("Sync for user {} failed: {}", user_id, e);
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("Sync task panicked: {}", e);
                }
            }
        }

        summary
    }

    /// Wait for an in-flight tick to finish. Returns false when `grace`
    /// elapsed first.
    pub async fn drain(&self, grace: Duration) -> bool {
        tokio::time::timeout(grace, self.tick_guard.lock()).await.is_ok()
    }
}
