//! In-memory fakes for the live-sync collaborators.

use crate::{
    integrations::{Document, LiveStateStore, PushError, PushSender, StoreError},
    models::{DeviceStatusRecord, Notification, TelemetrySample},
    services::{
        telemetry_fetcher::{FetchError, TelemetrySource},
        user_directory::{DirectoryError, UserDirectory},
    },
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct InMemoryStore {
    docs: Mutex<HashMap<String, Document>>,
    failing_writes: Mutex<HashSet<String>>,
    fail_reads: AtomicBool,
    writes: AtomicUsize,
    delay: Mutex<Duration>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_status(&self, key: &str, status: &str) {
        self.seed_field(key, "status", Value::String(status.to_string()));
    }

    pub fn seed_field(&self, key: &str, name: &str, value: Value) {
        self.docs
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    pub fn document(&self, key: &str) -> Option<Document> {
        self.docs.lock().unwrap().get(key).cloned()
    }

    pub fn status_of(&self, key: &str) -> Option<String> {
        self.document(key)
            .and_then(|d| d.get("status").and_then(|s| s.as_str()).map(String::from))
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes_for(&self, key: &str) {
        self.failing_writes.lock().unwrap().insert(key.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl LiveStateStore for InMemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Document, StoreError> {
        self.pause().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::ConnectionError("read refused".to_string()));
        }
        self.document(key).ok_or(StoreError::NotFound)
    }

    async fn upsert(&self, record: &DeviceStatusRecord) -> Result<(), StoreError> {
        self.pause().await;
        let key = record.key();
        if self.failing_writes.lock().unwrap().contains(&key) {
            return Err(StoreError::ConnectionError("write refused".to_string()));
        }

        let fields = match serde_json::to_value(record) {
            Ok(Value::Object(fields)) => fields,
            _ => return Err(StoreError::InvalidResponse("unserializable record".to_string())),
        };

        let mut docs = self.docs.lock().unwrap();
        let doc = docs.entry(key).or_default();
        for (name, value) in fields {
            doc.insert(name, value);
        }
        doc.insert(
            "last_update".to_string(),
            Value::String(chrono::Utc::now().to_rfc3339()),
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeTelemetry {
    next: Mutex<Result<TelemetrySample, FetchError>>,
    fetches: AtomicUsize,
    delay: Mutex<Duration>,
}

impl FakeTelemetry {
    pub fn new(sample: TelemetrySample) -> Self {
        Self {
            next: Mutex::new(Ok(sample)),
            fetches: AtomicUsize::new(0),
            delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn set(&self, result: Result<TelemetrySample, FetchError>) {
        *self.next.lock().unwrap() = result;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TelemetrySource for FakeTelemetry {
    async fn fetch(&self) -> Result<TelemetrySample, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.next.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct RecordingPush {
    sent: Mutex<Vec<(String, Notification)>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
    delay: Mutex<Duration>,
}

impl RecordingPush {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Successfully delivered (token, notification) pairs
    pub fn sent(&self) -> Vec<(String, Notification)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushSender for RecordingPush {
    fn backend_name(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, device_token: &str, notification: &Notification) -> Result<(), PushError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(PushError::Rejected {
                status: 404,
                message: "UNREGISTERED".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((device_token.to_string(), notification.clone()));
        Ok(())
    }
}

/// Users keyed by id; a user with `None` exists but has no push token.
#[derive(Default)]
pub struct FakeDirectory {
    users: Mutex<BTreeMap<i32, Option<String>>>,
    fail: AtomicBool,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user_id: i32) {
        self.users.lock().unwrap().entry(user_id).or_insert(None);
    }

    pub fn set_token(&self, user_id: i32, token: &str) {
        self.users
            .lock()
            .unwrap()
            .insert(user_id, Some(token.to_string()));
    }

    pub fn token_of(&self, user_id: i32) -> Option<String> {
        self.users.lock().unwrap().get(&user_id).cloned().flatten()
    }

    pub fn fail_queries(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), DirectoryError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(DirectoryError::Pool("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserDirectory for FakeDirectory {
    async fn push_token(&self, user_id: i32) -> Result<Option<String>, DirectoryError> {
        self.check()?;
        Ok(self.token_of(user_id).filter(|t| !t.trim().is_empty()))
    }

    async fn users_with_push_token(&self) -> Result<Vec<i32>, DirectoryError> {
        self.check()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, token)| token.as_deref().is_some_and(|t| !t.is_empty()))
            .map(|(id, _)| *id)
            .collect())
    }

    async fn set_push_token(&self, user_id: i32, token: &str) -> Result<usize, DirectoryError> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        match users.get_mut(&user_id) {
            Some(slot) => {
                *slot = Some(token.to_string());
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
