//! Google service-account authentication
//!
//! Firestore and FCM both accept OAuth access tokens minted from a service
//! account key: we sign an RS256 assertion with the key, trade it at the
//! key's `token_uri`, and reuse the resulting token until shortly before it
//! expires.

use crate::config::CredentialsSource;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

pub const SCOPE_DATASTORE: &str = "https://www.googleapis.com/auth/datastore";
pub const SCOPE_FIREBASE_MESSAGING: &str = "https://www.googleapis.com/auth/firebase.messaging";

const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    MissingCredentials(String),
    InvalidKey(String),
    TokenExchange(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredentials(msg) => write!(f, "Missing credentials: {}", msg),
            AuthError::InvalidKey(msg) => write!(f, "Invalid service account key: {}", msg),
            AuthError::TokenExchange(msg) => write!(f, "Token exchange failed: {}", msg),
        }
    }
}

impl std::error::Error for AuthError {}

/// Source of bearer tokens for Google APIs
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// The fields of a service account JSON key we need
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        serde_json::from_str(json).map_err(|e| AuthError::InvalidKey(e.to_string()))
    }

    pub fn load(source: &CredentialsSource) -> Result<Self, AuthError> {
        match source {
            CredentialsSource::Inline(json) => Self::from_json(json),
            CredentialsSource::File(path) => {
                let json = std::fs::read_to_string(path)
                    .map_err(|e| AuthError::MissingCredentials(format!("{}: {}", path, e)))?;
                Self::from_json(&json)
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Mints and caches access tokens for one service account
pub struct ServiceAccountTokenProvider {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scopes: Vec<String>,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenProvider {
    pub fn new(
        key: ServiceAccountKey,
        scopes: &[&str],
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        Ok(Self {
            key,
            encoding_key,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            client,
            cached: Mutex::new(None),
        })
    }

    fn build_assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: self.scopes.join(" "),
            aud: self.key.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidKey(e.to_string()))
    }

    async fn exchange(&self, now: DateTime<Utc>) -> Result<CachedToken, AuthError> {
        let assertion = self.build_assertion(now)?;

        let resp = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchange(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        log::debug!(
            "Obtained access token for {} (expires in {}s)",
            self.key.client_email,
            token.expires_in
        );

        Ok(CachedToken {
            token: token.access_token,
            expires_at: now + ChronoDuration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountTokenProvider {
    async fn access_token(&self) -> Result<String, AuthError> {
        // Held across the exchange so concurrent workers share one refresh.
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - ChronoDuration::seconds(EXPIRY_MARGIN_SECS) > now {
                return Ok(token.token.clone());
            }
        }

        let fresh = self.exchange(now).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}
