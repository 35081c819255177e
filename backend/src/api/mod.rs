use actix_web::web;

pub mod iot;
pub mod tokens;

pub fn config(cfg: &mut web::ServiceConfig) {
    // Device ingestion and command polling
    cfg.service(
        web::scope("/api/iot")
            .service(iot::iot_input)
            .service(iot::iot_command),
    );

    // Manual one-shot sync from the sensor feed
    cfg.service(web::scope("/api/rtdb").service(iot::manual_sync));

    // Push token registration (Android client posts with and without the slash)
    cfg.service(
        web::resource(["/update-token", "/update-token/"])
            .route(web::post().to(tokens::update_token)),
    );
}

#[cfg(test)]
pub(crate) struct TestComponents {
    pub components: crate::services::SyncComponents,
    pub telemetry: std::sync::Arc<crate::services::test_support::FakeTelemetry>,
    pub store: std::sync::Arc<crate::services::test_support::InMemoryStore>,
    pub directory: std::sync::Arc<crate::services::test_support::FakeDirectory>,
    pub push: std::sync::Arc<crate::services::test_support::RecordingPush>,
}

/// Live-sync components backed entirely by in-memory fakes
#[cfg(test)]
pub(crate) fn test_app_components() -> TestComponents {
    use crate::config::ReadFailurePolicy;
    use crate::models::TelemetrySample;
    use crate::services::{
        SyncComponents,
        live_sync::LiveSync,
        notifier::NotificationDispatcher,
        reconciler::LiveStateReconciler,
        subscribers::SubscriberEnumerator,
        sync_engine::SyncEngine,
        test_support::{FakeDirectory, FakeTelemetry, InMemoryStore, RecordingPush},
    };
    use std::sync::Arc;
    use std::time::Duration;

    let telemetry = Arc::new(FakeTelemetry::new(TelemetrySample::new(0.5, 120.0, 230.0)));
    let store = Arc::new(InMemoryStore::new());
    let directory = Arc::new(FakeDirectory::new());
    let push = Arc::new(RecordingPush::new());

    let reconciler =
        LiveStateReconciler::new(store.clone(), Duration::from_secs(5), ReadFailurePolicy::Abort);
    let dispatcher =
        NotificationDispatcher::new(directory.clone(), push.clone(), Duration::from_secs(5));
    let engine = SyncEngine::new(
        telemetry.clone(),
        SubscriberEnumerator::new(directory.clone(), 16),
        Arc::new(LiveSync::new(reconciler, dispatcher)),
        "Sensor Utama",
    );

    TestComponents {
        components: SyncComponents {
            engine: Arc::new(engine),
            directory: directory.clone(),
        },
        telemetry,
        store,
        directory,
        push,
    }
}
