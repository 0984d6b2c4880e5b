pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod sidebar;
pub mod signature;
pub mod updater;
pub mod webhook;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

use config::ServiceConfig;
use updater::Updater;

pub struct AppState {
    pub config: ServiceConfig,
    pub updater: Arc<dyn Updater>,
    /// Held for the whole update so pulls and regenerations never interleave.
    pub update_lock: Mutex<()>,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ServiceConfig, updater: Arc<dyn Updater>) -> Self {
        Self {
            config,
            updater,
            update_lock: Mutex::new(()),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;
