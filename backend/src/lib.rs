//! EnerTrack Backend Library
//!
//! Live telemetry synchronisation and alerting for EnerTrack:
//! - Polling the shared electrical sensor and deriving ON/OFF status
//! - Reconciling each subscriber's live-state document in Firestore
//! - Push notifications (FCM) on transitions and high voltage
//! - Fixed-interval fan-out scheduler and the HTTP ingestion endpoints

pub mod api;
pub mod config;
pub mod db;
pub mod integrations;
pub mod models;
pub mod schema;
pub mod services;
