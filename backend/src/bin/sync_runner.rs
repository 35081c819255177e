//! Sync Runner - headless live-sync daemon for EnerTrack
//!
//! Runs only the fan-out scheduler, without the HTTP endpoints:
//! - every SYNC_INTERVAL_SECS: fetch the sensor once, reconcile every
//!   subscriber's live state and push transition/high voltage alerts
//! - on Ctrl-C: stop ticking and let the in-flight tick drain
//!
//! Environment variables:
//!   DATABASE_URL        - PostgreSQL connection string (required)
//!   TELEMETRY_URL       - sensor polling endpoint (required)
//!   FIREBASE_PROJECT_ID - Firestore / FCM project (required)
//!   See `enertrack::config` for the optional tuning variables.

use enertrack::config::Config;
use enertrack::db;
use enertrack::services::{SyncComponents, scheduler::FanoutScheduler};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let pool = match db::init_pool(&config.database) {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let components = match SyncComponents::build(&config, pool) {
        Ok(components) => components,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    log::info!("Starting EnerTrack sync runner...");

    // Run one tick right away instead of waiting a full interval
    components.engine.run_tick().await;

    let started = FanoutScheduler::start(components.engine.clone(), config.sync.interval).await;
    let scheduler = match started {
        Ok(scheduler) => scheduler,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }

    if let Err(e) = scheduler.shutdown(config.sync.drain_grace()).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
