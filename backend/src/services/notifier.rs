use crate::{
    integrations::{PushError, PushSender},
    models::Notification,
    services::user_directory::UserDirectory,
};
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// What happened to a dispatch attempt. Informational only: dispatch never
/// fails its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Sent,
    /// User has no push token registered
    NoToken,
    TokenLookupFailed(String),
    DeliveryFailed(PushError),
}

/// Best-effort push delivery: one attempt, no retry, failures only logged.
pub struct NotificationDispatcher {
    directory: Arc<dyn UserDirectory>,
    sender: Arc<dyn PushSender>,
    push_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        sender: Arc<dyn PushSender>,
        push_timeout: Duration,
    ) -> Self {
        Self {
            directory,
            sender,
            push_timeout,
        }
    }

    pub async fn dispatch(&self, user_id: i32, notification: &Notification) -> DispatchOutcome {
        let token = match self.directory.push_token(user_id).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("User {} has no push token, skipping '{}'", user_id, notification.title);
                return DispatchOutcome::NoToken;
            }
            Err(e) => {
                error!("Push token lookup for user {} failed: {}", user_id, e);
                return DispatchOutcome::TokenLookupFailed(e.to_string());
            }
        };

        info!("Sending notification to user {}: {}", user_id, notification.title);

        let send = self.sender.send(&token, notification);
        let result = match timeout(self.push_timeout, send).await {
            Ok(r) => r,
            Err(_) => Err(PushError::Timeout),
        };

        match result {
            Ok(()) => DispatchOutcome::Sent,
            Err(e) => {
                error!(
                    "Failed to send notification via {} to user {}: {}",
                    self.sender.backend_name(),
                    user_id,
                    e
                );
                DispatchOutcome::DeliveryFailed(e)
            }
        }
    }
}
