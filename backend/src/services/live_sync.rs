use crate::{
    integrations::StoreError,
    models::{DeviceStatus, Notification, TelemetrySample},
    services::{
        notifier::{DispatchOutcome, NotificationDispatcher},
        reconciler::{LiveStateReconciler, ReconcileError},
    },
};
use log::{error, info};
use std::sync::Arc;

/// Outcome of one (user, device) unit of work
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub status: DeviceStatus,
    pub notification: Option<Notification>,
    /// `None` when no notification was decided
    pub dispatch: Option<DispatchOutcome>,
}

impl SyncOutcome {
    pub fn notified(&self) -> bool {
        matches!(self.dispatch, Some(DispatchOutcome::Sent))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// The previous status could not be read for a normal-voltage sample;
    /// nothing was written or sent.
    ReadFailed(StoreError),
    /// The write failed. A decided notification was still dispatched.
    WriteFailed {
        status: DeviceStatus,
        dispatch: Option<DispatchOutcome>,
        source: StoreError,
    },
    /// The detached task died before finishing
    Aborted(String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::ReadFailed(e) => write!(f, "Failed to read previous status: {}", e),
            SyncError::WriteFailed { source, .. } => {
                write!(f, "Failed to write live state: {}", source)
            }
            SyncError::Aborted(msg) => write!(f, "Sync task aborted: {}", msg),
        }
    }
}

impl std::error::Error for SyncError {}

/// Reconcile one sample for one user, then dispatch whatever was decided.
pub struct LiveSync {
    reconciler: LiveStateReconciler,
    dispatcher: NotificationDispatcher,
}

impl LiveSync {
    pub fn new(reconciler: LiveStateReconciler, dispatcher: NotificationDispatcher) -> Self {
        Self {
            reconciler,
            dispatcher,
        }
    }

    pub async fn sync_and_notify(
        &self,
        user_id: i32,
        device_label: &str,
        sample: &TelemetrySample,
    ) -> Result<SyncOutcome, SyncError> {
        let reconciled = self.reconciler.reconcile(user_id, device_label, sample).await;
        let (decision, write_error) = match reconciled {
            Ok(decision) => (decision, None),
            Err(ReconcileError::ReadFailed(e)) => return Err(SyncError::ReadFailed(e)),
            Err(ReconcileError::WriteFailed { decision, source }) => (decision, Some(source)),
        };

        let dispatch = match &decision.notification {
            Some(notification) => Some(self.dispatcher.dispatch(user_id, notification).await),
            None => None,
        };

        match write_error {
            None => Ok(SyncOutcome {
                status: decision.status,
                notification: decision.notification,
                dispatch,
            }),
            Some(source) => Err(SyncError::WriteFailed {
                status: decision.status,
                dispatch,
                source,
            }),
        }
    }

    /// Run the unit on its own task so that dropping the caller (an HTTP
    /// client disconnecting, say) cannot cancel the store write halfway.
    pub async fn sync_detached(
        self: &Arc<Self>,
        user_id: i32,
        device_label: String,
        sample: TelemetrySample,
    ) -> Result<SyncOutcome, SyncError> {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = this.sync_and_notify(user_id, &device_label, &sample).await;
            match &result {
                Ok(outcome) => info!(
                    "Synced {} for user {}: {}",
                    device_label, user_id, outcome.status
                ),
                Err(e) => error!("Sync of {} for user {} failed: {}", device_label, user_id, e),
            }
            result
        });

        handle
            .await
            .map_err(|e| SyncError::Aborted(e.to_string()))?
    }
}
