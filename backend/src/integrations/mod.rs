//! External systems the live-sync engine talks to.
//!
//! Each boundary is a trait so the engine receives its collaborators
//! explicitly and tests can swap in in-memory fakes:
//! - [`LiveStateStore`]: keyed document store holding the live status
//!   (Firestore in production)
//! - [`PushSender`]: push notification delivery (FCM in production)
//! - [`google_auth::AccessTokenProvider`]: OAuth tokens for both of the above

use crate::models::{DeviceStatusRecord, Notification};
use async_trait::async_trait;
use serde_json::{Map, Value};

pub mod fcm;
pub mod firestore;
pub mod google_auth;

pub use fcm::FcmSender;
pub use firestore::FirestoreLiveStateStore;
pub use google_auth::{AccessTokenProvider, AuthError, ServiceAccountTokenProvider};

/// A stored document, decoded into plain JSON values
pub type Document = Map<String, Value>;

/// Error types for live-state store operations
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No document exists under the key
    NotFound,
    Timeout,
    Unauthorized(String),
    ConnectionError(String),
    Rejected { status: u16, message: String },
    InvalidResponse(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound => write!(f, "Document not found"),
            StoreError::Timeout => write!(f, "Live-state store operation timed out"),
            StoreError::Unauthorized(msg) => write!(f, "Live-state store unauthorized: {}", msg),
            StoreError::ConnectionError(msg) => {
                write!(f, "Live-state store connection error: {}", msg)
            }
            StoreError::Rejected { status, message } => {
                write!(f, "Live-state store rejected request ({}): {}", status, message)
            }
            StoreError::InvalidResponse(msg) => {
                write!(f, "Invalid live-state store response: {}", msg)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Error types for push delivery
#[derive(Debug, Clone, PartialEq)]
pub enum PushError {
    Timeout,
    Unauthorized(String),
    ConnectionError(String),
    Rejected { status: u16, message: String },
}

impl std::fmt::Display for PushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushError::Timeout => write!(f, "Push request timed out"),
            PushError::Unauthorized(msg) => write!(f, "Push service unauthorized: {}", msg),
            PushError::ConnectionError(msg) => write!(f, "Push connection error: {}", msg),
            PushError::Rejected { status, message } => {
                write!(f, "Push service rejected message ({}): {}", status, message)
            }
        }
    }
}

impl std::error::Error for PushError {}

/// Keyed document store for live device status
#[async_trait]
pub trait LiveStateStore: Send + Sync {
    /// Short identifier used in logs (e.g. "firestore")
    fn backend_name(&self) -> &'static str;

    /// Fetch the document stored under `key`.
    ///
    /// Returns `StoreError::NotFound` when no document exists; every other
    /// error means the store could not answer.
    async fn get(&self, key: &str) -> Result<Document, StoreError>;

    /// Merge-upsert `record` under its key.
    ///
    /// Only the record's fields are written; other fields already on the
    /// document are preserved. `last_update` is stamped by the store.
    async fn upsert(&self, record: &DeviceStatusRecord) -> Result<(), StoreError>;
}

/// Best-effort push delivery to a single device token
#[async_trait]
pub trait PushSender: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn send(&self, device_token: &str, notification: &Notification) -> Result<(), PushError>;
}

impl From<AuthError> for StoreError {
    fn from(e: AuthError) -> Self {
        StoreError::Unauthorized(e.to_string())
    }
}

impl From<AuthError> for PushError {
    fn from(e: AuthError) -> Self {
        PushError::Unauthorized(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Rejected {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(err.to_string().contains("503"));
        assert!(StoreError::Timeout.to_string().contains("timed out"));
    }

    #[test]
    fn test_auth_error_maps_to_unauthorized() {
        let err: StoreError = AuthError::InvalidKey("bad pem".to_string()).into();
        assert!(matches!(err, StoreError::Unauthorized(_)));

        let err: PushError = AuthError::InvalidKey("bad pem".to_string()).into();
        assert!(matches!(err, PushError::Unauthorized(_)));
    }
}
