//! Core Module
//!
//! Lodge configuration, system logs, backup records and health snapshots.

pub mod error;
pub mod handlers;
pub mod health;
pub mod queries;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};

use crate::api::AppState;

pub use error::{CoreError, CoreResult};
pub use queries::record_log;
pub use types::{LogType, NewSystemLog, DEFAULT_LODGE_NAME};

/// Core routes, mounted under `/api/core` behind `require_auth`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/configuration/current",
            get(handlers::get_configuration).put(handlers::update_configuration),
        )
        .route("/logs", get(handlers::list_logs))
        .route("/logs/add_log", post(handlers::add_log))
        .route("/logs/{id}", get(handlers::get_log))
        .route(
            "/backup-configuration/current",
            get(handlers::get_backup_configuration).put(handlers::update_backup_configuration),
        )
        .route("/backups", get(handlers::list_backups))
        .route("/backups/create_backup", post(handlers::create_backup))
        .route("/backups/{id}", get(handlers::get_backup))
        .route("/backups/{id}/restore", post(handlers::restore_backup))
        .route("/health", get(handlers::list_health))
        .route("/health/current", get(handlers::current_health))
        .route("/health/summary", get(handlers::health_summary))
        .route("/health/{id}", get(handlers::get_health))
}
