//! Fixed-interval driver for the live-sync engine.

use crate::services::sync_engine::SyncEngine;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};

#[derive(Debug)]
pub enum SchedulerError {
    Create(String),
    AddJob(String),
    Start(String),
    Shutdown(String),
}

impl std::fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerError::Create(msg) => write!(f, "Failed to create scheduler: {}", msg),
            SchedulerError::AddJob(msg) => write!(f, "Failed to add sync job: {}", msg),
            SchedulerError::Start(msg) => write!(f, "Failed to start scheduler: {}", msg),
            SchedulerError::Shutdown(msg) => write!(f, "Failed to stop scheduler: {}", msg),
        }
    }
}

impl std::error::Error for SchedulerError {}

/// Runs `SyncEngine::run_tick` every `interval` until shut down.
pub struct FanoutScheduler {
    sched: JobScheduler,
    engine: Arc<SyncEngine>,
}

impl FanoutScheduler {
    pub async fn start(
        engine: Arc<SyncEngine>,
        interval: Duration,
    ) -> Result<Self, SchedulerError> {
        let sched = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::Create(e.to_string()))?;

        let job_engine = engine.clone();
        let sync_job = Job::new_repeated_async(interval, move |_uuid, _l| {
            let engine = job_engine.clone();
            Box::pin(async move {
                engine.run_tick().await;
            })
        })
        .map_err(|e| SchedulerError::AddJob(e.to_string()))?;

        sched
            .add(sync_job)
            .await
            .map_err(|e| SchedulerError::AddJob(e.to_string()))?;
        sched
            .start()
            .await
            .map_err(|e| SchedulerError::Start(e.to_string()))?;

        info!(
            "Live sync scheduler running: '{}' every {:?}",
            engine.device_label(),
            interval
        );

        Ok(Self { sched, engine })
    }

    /// Stop ticking, then give the in-flight tick up to `grace` to finish.
    pub async fn shutdown(mut self, grace: Duration) -> Result<(), SchedulerError> {
        info!("Stopping live sync scheduler...");
        self.sched
            .shutdown()
            .await
            .map_err(|e| SchedulerError::Shutdown(e.to_string()))?;

        if self.engine.drain(grace).await {
            info!("Live sync scheduler stopped");
        } else {
            warn!("In-flight sync tick did not finish within {:?}", grace);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReadFailurePolicy;
    use crate::models::TelemetrySample;
    use crate::services::live_sync::LiveSync;
    use crate::services::notifier::NotificationDispatcher;
    use crate::services::reconciler::LiveStateReconciler;
    use crate::services::subscribers::SubscriberEnumerator;
    use crate::services::test_support::{FakeDirectory, FakeTelemetry, InMemoryStore, RecordingPush};

    #[test]
    fn test_scheduler_error_display() {
        let err = SchedulerError::Start("already running".to_string());
        assert_eq!(err.to_string(), "Failed to start scheduler: already running");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scheduler_ticks_on_interval() {
        let telemetry = Arc::new(FakeTelemetry::new(TelemetrySample::new(0.5, 120.0, 230.0)));
        let store = Arc::new(InMemoryStore::new());
        let directory = Arc::new(FakeDirectory::new());
        let reconciler = LiveStateReconciler::new(
            store.clone(),
            Duration::from_secs(1),
            ReadFailurePolicy::Abort,
        );
        let dispatcher = NotificationDispatcher::new(
            directory.clone(),
            Arc::new(RecordingPush::new()),
            Duration::from_secs(1),
        );
        let engine = Arc::new(SyncEngine::new(
            telemetry.clone(),
            SubscriberEnumerator::new(directory, 16),
            Arc::new(LiveSync::new(reconciler, dispatcher)),
            "Sensor Utama",
        ));

        let scheduler = FanoutScheduler::start(engine, Duration::from_secs(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.shutdown(Duration::from_secs(2)).await.unwrap();

        let ticks = telemetry.fetch_count();
        assert!(ticks >= 1, "expected at least one tick, got {}", ticks);
        assert_eq!(store.status_of("user16_Sensor_Utama").as_deref(), Some("ON"));
    }
}
