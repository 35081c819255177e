use crate::{
    config::ReadFailurePolicy,
    integrations::{LiveStateStore, StoreError},
    models::{
        AlertCategory, DeviceStatus, DeviceStatusRecord, Notification, TelemetrySample,
        live_state_key, status_label,
    },
    services::status::{derive_status, is_high_voltage},
};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Result of comparing a new sample with the stored status
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub status: DeviceStatus,
    /// `None` when the previous status was absent or unreadable (UNKNOWN)
    pub previous: Option<DeviceStatus>,
    pub notification: Option<Notification>,
}

/// Decide whether a sample warrants a notification.
///
/// Rules are ordered and the first match wins: a high voltage alert takes
/// precedence over any ON/OFF transition in the same sample.
pub fn decide(
    device_label: &str,
    sample: &TelemetrySample,
    previous: Option<DeviceStatus>,
) -> Decision {
    let status = derive_status(sample);

    let category = if is_high_voltage(sample) {
        Some(AlertCategory::HighVoltage)
    } else {
        match (previous, status) {
            (Some(DeviceStatus::On), DeviceStatus::Off) => Some(AlertCategory::TurnedOff),
            (Some(DeviceStatus::Off) | None, DeviceStatus::On) => Some(AlertCategory::TurnedOn),
            _ => None,
        }
    };

    Decision {
        status,
        previous,
        notification: category.map(|c| Notification::new(c, device_label, sample)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileError {
    /// The previous status could not be read, the policy is to abort and
    /// the sample is not high voltage. Nothing was decided or written.
    ReadFailed(StoreError),
    /// The decision was made but the write failed.
    WriteFailed {
        decision: Decision,
        source: StoreError,
    },
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileError::ReadFailed(e) => write!(f, "Failed to read previous status: {}", e),
            ReconcileError::WriteFailed { source, .. } => {
                write!(f, "Failed to write live state: {}", source)
            }
        }
    }
}

impl std::error::Error for ReconcileError {}

/// Reads the previous status for a (user, device) key, decides on a
/// notification, and merge-writes the new sample back.
pub struct LiveStateReconciler {
    store: Arc<dyn LiveStateStore>,
    op_timeout: Duration,
    read_failure_policy: ReadFailurePolicy,
}

impl LiveStateReconciler {
    pub fn new(
        store: Arc<dyn LiveStateStore>,
        op_timeout: Duration,
        read_failure_policy: ReadFailurePolicy,
    ) -> Self {
        Self {
            store,
            op_timeout,
            read_failure_policy,
        }
    }

    /// Read the stored status. `Ok(None)` is UNKNOWN: no record, no readable
    /// status field, or (under `FailOpen`) a failed read.
    async fn read_previous(&self, key: &str) -> Result<Option<DeviceStatus>, StoreError> {
        let result = match timeout(self.op_timeout, self.store.get(key)).await {
            Ok(r) => r,
            Err(_) => Err(StoreError::Timeout),
        };

        match result {
            Ok(doc) => {
                let status = doc
                    .get("status")
                    .and_then(|v| v.as_str())
                    .and_then(DeviceStatus::from_str);
                if status.is_none() {
                    debug!("Live state {} has no readable status", key);
                }
                Ok(status)
            }
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => match self.read_failure_policy {
                ReadFailurePolicy::FailOpen => {
                    warn!(
                        "Reading live state {} from {} failed ({}), assuming UNKNOWN",
                        key,
                        self.store.backend_name(),
                        e
                    );
                    Ok(None)
                }
                ReadFailurePolicy::Abort => Err(e),
            },
        }
    }

    pub async fn reconcile(
        &self,
        user_id: i32,
        device_label: &str,
        sample: &TelemetrySample,
    ) -> Result<Decision, ReconcileError> {
        let key = live_state_key(user_id, device_label);

        // A high voltage alert needs no previous status, so an unreadable
        // store never suppresses it.
        let previous = match self.read_previous(&key).await {
            Ok(previous) => previous,
            Err(e) if is_high_voltage(sample) => {
                warn!(
                    "Reading live state {} failed ({}), high voltage alert still raised",
                    key, e
                );
                None
            }
            Err(e) => return Err(ReconcileError::ReadFailed(e)),
        };

        let decision = decide(device_label, sample, previous);
        debug!(
            "Live state {}: {} -> {}",
            key,
            status_label(decision.previous),
            decision.status
        );

        // The write happens whether or not a notification was decided.
        let record =
            DeviceStatusRecord::from_sample(user_id, device_label, sample, decision.status);
        let write = match timeout(self.op_timeout, self.store.upsert(&record)).await {
            Ok(r) => r,
            Err(_) => Err(StoreError::Timeout),
        };

        match write {
            Ok(()) => Ok(decision),
            Err(source) => Err(ReconcileError::WriteFailed { decision, source }),
        }
    }
}
