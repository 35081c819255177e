pub mod live_sync;
pub mod notifier;
pub mod reconciler;
pub mod scheduler;
pub mod status;
pub mod subscribers;
pub mod sync_engine;
pub mod telemetry_fetcher;
pub mod user_directory;

#[cfg(test)]
pub(crate) mod test_support;

use crate::{
    config::Config,
    db::DbPool,
    integrations::{
        AccessTokenProvider, AuthError, FcmSender, FirestoreLiveStateStore, PushError,
        ServiceAccountTokenProvider, StoreError,
        google_auth::{SCOPE_DATASTORE, SCOPE_FIREBASE_MESSAGING, ServiceAccountKey},
    },
    services::{
        live_sync::LiveSync,
        notifier::NotificationDispatcher,
        reconciler::LiveStateReconciler,
        subscribers::SubscriberEnumerator,
        sync_engine::SyncEngine,
        telemetry_fetcher::{FetchError, HttpTelemetryFetcher},
        user_directory::{PgUserDirectory, UserDirectory},
    },
};
use std::sync::Arc;

/// Failure to wire up the live-sync collaborators at startup
#[derive(Debug)]
pub enum SetupError {
    Credentials(AuthError),
    Store(StoreError),
    Push(PushError),
    Telemetry(FetchError),
}

impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupError::Credentials(e) => write!(f, "Service account setup failed: {}", e),
            SetupError::Store(e) => write!(f, "Live-state store setup failed: {}", e),
            SetupError::Push(e) => write!(f, "Push sender setup failed: {}", e),
            SetupError::Telemetry(e) => write!(f, "Telemetry fetcher setup failed: {}", e),
        }
    }
}

impl std::error::Error for SetupError {}

/// Everything the binaries need to run the live-sync engine
#[derive(Clone)]
pub struct SyncComponents {
    pub engine: Arc<SyncEngine>,
    pub directory: Arc<dyn UserDirectory>,
}

impl SyncComponents {
    pub fn build(config: &Config, pool: DbPool) -> Result<Self, SetupError> {
        let sync = &config.sync;

        let key = ServiceAccountKey::load(&config.firebase.credentials)
            .map_err(SetupError::Credentials)?;
        let tokens: Arc<dyn AccessTokenProvider> = Arc::new(
            ServiceAccountTokenProvider::new(
                key,
                &[SCOPE_DATASTORE, SCOPE_FIREBASE_MESSAGING],
                sync.store_timeout,
            )
            .map_err(SetupError::Credentials)?,
        );

        let store = FirestoreLiveStateStore::new(
            &config.firebase.project_id,
            tokens.clone(),
            sync.store_timeout,
        )
        .map_err(SetupError::Store)?;
        let sender = FcmSender::new(&config.firebase.project_id, tokens, sync.push_timeout)
            .map_err(SetupError::Push)?;
        let fetcher = HttpTelemetryFetcher::new(&sync.telemetry_url, sync.fetch_timeout)
            .map_err(SetupError::Telemetry)?;
        let directory: Arc<dyn UserDirectory> = Arc::new(PgUserDirectory::new(pool));

        let reconciler =
            LiveStateReconciler::new(Arc::new(store), sync.store_timeout, sync.read_failure_policy);
        let dispatcher =
            NotificationDispatcher::new(directory.clone(), Arc::new(sender), sync.push_timeout);
        let live_sync = Arc::new(LiveSync::new(reconciler, dispatcher));

        let engine = SyncEngine::new(
            Arc::new(fetcher),
            SubscriberEnumerator::new(directory.clone(), sync.default_subscriber_id),
            live_sync,
            &sync.device_label,
        );

        log::info!(
            "Live sync wired: telemetry {}, Firestore project {}, policy {:?}",
            sync.telemetry_url,
            config.firebase.project_id,
            sync.read_failure_policy
        );

        Ok(Self {
            engine: Arc::new(engine),
            directory,
        })
    }
}
