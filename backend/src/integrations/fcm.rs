use super::{AccessTokenProvider, PushError, PushSender};
use crate::models::Notification;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

pub const FCM_BASE_URL: &str = "https://fcm.googleapis.com";

/// Firebase Cloud Messaging sender (HTTP v1 API)
pub struct FcmSender {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl FcmSender {
    pub fn new(
        project_id: &str,
        tokens: Arc<dyn AccessTokenProvider>,
        timeout: Duration,
    ) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PushError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: FCM_BASE_URL.to_string(),
            project_id: project_id.to_string(),
            tokens,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn send_url(&self) -> String {
        format!("{}/v1/projects/{}/messages:send", self.base_url, self.project_id)
    }

    fn message_body(device_token: &str, notification: &Notification) -> Value {
        json!({
            "message": {
                "token": device_token,
                "notification": {
                    "title": notification.title,
                    "body": notification.body,
                },
                // FCM data values must be strings
                "data": {
                    "title": notification.title,
                    "body": notification.body,
                    "category": notification.category.as_str(),
                },
            }
        })
    }
}

#[async_trait]
impl PushSender for FcmSender {
    fn backend_name(&self) -> &'static str {
        "fcm"
    }

    async fn send(&self, device_token: &str, notification: &Notification) -> Result<(), PushError> {
        let access_token = self.tokens.access_token().await?;

        let resp = self
            .client
            .post(self.send_url())
            .bearer_auth(access_token)
            .json(&Self::message_body(device_token, notification))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PushError::Timeout
                } else {
                    PushError::ConnectionError(e.to_string())
                }
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(match status {
                401 | 403 => PushError::Unauthorized(message),
                _ => PushError::Rejected { status, message },
            });
        }

        Ok(())
    }
}
