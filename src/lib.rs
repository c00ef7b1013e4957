pub mod collection;
pub mod dashboard;
pub mod db;
pub mod errors;
pub mod ids;
pub mod metrics;
pub mod models;
pub mod report;
pub mod search;
pub mod seed;
pub mod session;
pub mod store;

pub use crate::collection::{Collection, Keyed, Patchable};
pub use crate::dashboard::{DashboardCore, DashboardState};
pub use crate::errors::{AppError, AppResult};
pub use crate::models::{AppSettings, Department, KpiScope};
pub use crate::session::SessionManager;
pub use crate::store::{memory::MemoryStore, KeyValueStore};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub fn open(app_data_dir: &Path) -> AppResult<DashboardCore> {
    std::fs::create_dir_all(app_data_dir).map_err(|error| AppError::Io(error.to_string()))?;
    if let Err(error) = init_tracing(app_data_dir) {
        eprintln!("failed to initialise logging: {}", error);
    }
    DashboardCore::open(app_data_dir)
}

pub fn init_tracing(app_data_dir: &Path) -> Result<(), String> {
    let log_dir = app_data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "dashboard.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}
