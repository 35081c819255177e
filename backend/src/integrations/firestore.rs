//! Firestore-backed live-state store (REST API)
//!
//! Records live in the `monitoring_live` collection, one document per
//! `user<ID>_<label>` key. Writes go through `documents:commit` with an
//! update mask listing only the record's fields, which gives merge-upsert
//! semantics, and a `REQUEST_TIME` transform for `last_update`.

use super::{AccessTokenProvider, Document, LiveStateStore, StoreError};
use crate::models::DeviceStatusRecord;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;

pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";
pub const LIVE_STATE_COLLECTION: &str = "monitoring_live";
pub const SERVER_TIMESTAMP_FIELD: &str = "last_update";

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    #[serde(default)]
    fields: Map<String, Value>,
}

pub struct FirestoreLiveStateStore {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    collection: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl FirestoreLiveStateStore {
    pub fn new(
        project_id: &str,
        tokens: Arc<dyn AccessTokenProvider>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: FIRESTORE_BASE_URL.to_string(),
            project_id: project_id.to_string(),
            collection: LIVE_STATE_COLLECTION.to_string(),
            tokens,
        })
    }

    /// Point the store at a different API host (emulator or test server).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn documents_root(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.project_id)
    }

    fn document_name(&self, key: &str) -> String {
        format!("{}/{}/{}", self.documents_root(), self.collection, key)
    }

    fn document_url(&self, key: &str) -> String {
        format!(
            "{}/v1/{}/{}/{}",
            self.base_url,
            self.documents_root(),
            self.collection,
            urlencoding::encode(key)
        )
    }

    fn commit_url(&self) -> String {
        format!("{}/v1/{}:commit", self.base_url, self.documents_root())
    }

    /// Build the commit body for a merge-upsert of `record`.
    fn upsert_body(&self, record: &DeviceStatusRecord) -> Result<Value, StoreError> {
        let mut plain = match serde_json::to_value(record) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(StoreError::InvalidResponse("record is not an object".to_string())),
            Err(e) => return Err(StoreError::InvalidResponse(e.to_string())),
        };
        plain.remove(SERVER_TIMESTAMP_FIELD);

        let field_paths: Vec<&String> = plain.keys().collect();
        let fields: Map<String, Value> = plain
            .iter()
            .map(|(k, v)| (k.clone(), to_firestore_value(v)))
            .collect();

        Ok(json!({
            "writes": [{
                "update": {
                    "name": self.document_name(&record.key()),
                    "fields": fields,
                },
                "updateMask": { "fieldPaths": field_paths },
                "updateTransforms": [{
                    "fieldPath": SERVER_TIMESTAMP_FIELD,
                    "setToServerValue": "REQUEST_TIME",
                }],
            }]
        }))
    }
}

fn map_send_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::ConnectionError(e.to_string())
    }
}

fn map_status(status: u16, message: String) -> StoreError {
    match status {
        401 | 403 => StoreError::Unauthorized(message),
        _ => StoreError::Rejected { status, message },
    }
}

async fn error_for_response(resp: reqwest::Response) -> StoreError {
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    map_status(status, message)
}

/// Firestore answers 404 both for a missing document and for a missing
/// project or database. Only the former means "no record yet".
fn is_missing_document(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(|m| m.starts_with("Document ")))
        .unwrap_or(false)
}

#[async_trait]
impl LiveStateStore for FirestoreLiveStateStore {
    fn backend_name(&self) -> &'static str {
        "firestore"
    }

    async fn get(&self, key: &str) -> Result<Document, StoreError> {
        let token = self.tokens.access_token().await?;

        let resp = self
            .client
            .get(self.document_url(key))
            .bearer_auth(token)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            let message = resp.text().await.unwrap_or_default();
            if is_missing_document(&message) {
                return Err(StoreError::NotFound);
            }
            return Err(map_status(status.as_u16(), message));
        }
        if !status.is_success() {
            return Err(error_for_response(resp).await);
        }

        let doc: FirestoreDocument = resp
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

        Ok(doc
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), from_firestore_value(v)))
            .collect())
    }

    async fn upsert(&self, record: &DeviceStatusRecord) -> Result<(), StoreError> {
        let body = self.upsert_body(record)?;
        let token = self.tokens.access_token().await?;

        let resp = self
            .client
            .post(self.commit_url())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        if !resp.status().is_success() {
            return Err(error_for_response(resp).await);
        }

        log::debug!("Firestore upsert {} ok", record.key());
        Ok(())
    }
}

/// Encode a plain JSON value as a Firestore typed value.
pub fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // Firestore carries 64-bit integers as strings
            Some(i) if !n.is_f64() => json!({ "integerValue": i.to_string() }),
            _ => json!({ "doubleValue": n.as_f64().unwrap_or(0.0) }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(to_firestore_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({
            "mapValue": {
                "fields": map
                    .iter()
                    .map(|(k, v)| (k.clone(), to_firestore_value(v)))
                    .collect::<Map<String, Value>>()
            }
        }),
    }
}

/// Decode a Firestore typed value into plain JSON. Unknown shapes become null.
pub fn from_firestore_value(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };

    if let Some(s) = obj.get("stringValue") {
        return s.clone();
    }
    if let Some(b) = obj.get("booleanValue") {
        return b.clone();
    }
    if let Some(i) = obj.get("integerValue") {
        return match i {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            other => other.clone(),
        };
    }
    if let Some(d) = obj.get("doubleValue") {
        return d.clone();
    }
    if let Some(ts) = obj.get("timestampValue") {
        return ts.clone();
    }
    if let Some(arr) = obj.get("arrayValue") {
        let values = arr
            .get("values")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().map(from_firestore_value).collect())
            .unwrap_or_default();
        return Value::Array(values);
    }
    if let Some(map) = obj.get("mapValue") {
        let fields = map
            .get("fields")
            .and_then(|v| v.as_object())
            .map(|f| {
                f.iter()
                    .map(|(k, v)| (k.clone(), from_firestore_value(v)))
                    .collect()
            })
            .unwrap_or_default();
        return Value::Object(fields);
    }

    Value::Null
}
