//! Core HTTP handlers: configuration, logs, backups and health.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::error::{CoreError, CoreResult};
use super::health::{classify, host_uptime_secs, sample_host, uptime_parts};
use super::queries::{self, DatabaseSnapshot};
use super::types::{
    AddLogRequest, BackupConfiguration, BackupQuery, BackupResponse, HealthQuery, HealthSummary,
    LivenessResponse, LodgeConfiguration, LogQuery, LogType, NewSystemLog, SystemHealth,
    SystemLog, UpdateBackupConfigurationRequest, UpdateConfigurationRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::permissions::Degree;
use crate::util::{page_bounds, ClientInfo, Page};

// ============================================================================
// Configuration
// ============================================================================

/// Current lodge configuration, created with defaults on first access.
#[utoipa::path(
    get,
    path = "/api/core/configuration/current",
    tag = "core",
    responses(
        (status = 200, description = "Lodge configuration", body = LodgeConfiguration),
        (status = 403, description = "Worshipful Master only"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_configuration(
    State(state): State<AppState>,
    auth: AuthUser,
) -> CoreResult<Json<LodgeConfiguration>> {
    auth.require_worshipful_master()?;
    Ok(Json(queries::get_or_create_configuration(&state.db).await?))
}

#[utoipa::path(
    put,
    path = "/api/core/configuration/current",
    tag = "core",
    request_body = UpdateConfigurationRequest,
    responses(
        (status = 200, description = "Updated configuration", body = LodgeConfiguration),
        (status = 400, description = "Invalid color or month"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn update_configuration(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateConfigurationRequest>,
) -> CoreResult<Json<LodgeConfiguration>> {
    auth.require_worshipful_master()?;
    body.validate()?;

    let mut config = queries::get_or_create_configuration(&state.db).await?;
    body.apply(&mut config);
    let saved = queries::save_configuration(&state.db, &config, auth.id).await?;

    tracing::info!(user_id = %auth.id, "Lodge configuration updated");
    Ok(Json(saved))
}

// ============================================================================
// System logs
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/core/logs",
    tag = "core",
    params(LogQuery),
    responses((status = 200, description = "System logs", body = Page<SystemLog>)),
    security(("bearer_auth" = []))
)]
pub async fn list_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<LogQuery>,
) -> CoreResult<Json<Page<SystemLog>>> {
    auth.require_degree(Degree::Master)?;
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_logs(&state.db, &query, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

pub async fn get_log(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<SystemLog>> {
    auth.require_degree(Degree::Master)?;
    queries::find_log(&state.db, id)
        .await?
        .map(Json)
        .ok_or(CoreError::NotFound("Log"))
}

/// Record a log entry with the caller's address and user agent.
#[utoipa::path(
    post,
    path = "/api/core/logs/add_log",
    tag = "core",
    request_body = AddLogRequest,
    responses((status = 201, description = "Log recorded")),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, client, body), fields(user_id = %auth.id))]
pub async fn add_log(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientInfo,
    Json(body): Json<AddLogRequest>,
) -> CoreResult<(StatusCode, Json<serde_json::Value>)> {
    auth.require_degree(Degree::Master)?;
    body.validate()?;

    let log = NewSystemLog::new(body.log_type, body.module, body.message)
        .details(body.details)
        .user(Some(auth.id))
        .client(client.ip, client.user_agent);
    let id = queries::record_log(&state.db, &log).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "Log registrado", "id": id })),
    ))
}

// ============================================================================
// Backups
// ============================================================================

pub async fn get_backup_configuration(
    State(state): State<AppState>,
    auth: AuthUser,
) -> CoreResult<Json<BackupConfiguration>> {
    auth.require_worshipful_master()?;
    Ok(Json(queries::get_or_create_backup_configuration(&state.db).await?))
}

#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn update_backup_configuration(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateBackupConfigurationRequest>,
) -> CoreResult<Json<BackupConfiguration>> {
    auth.require_worshipful_master()?;
    body.validate()?;

    let mut config = queries::get_or_create_backup_configuration(&state.db).await?;
    body.apply(&mut config);
    let saved = queries::save_backup_configuration(&state.db, &config, auth.id).await?;

    tracing::info!(user_id = %auth.id, "Backup configuration updated");
    Ok(Json(saved))
}

#[utoipa::path(
    get,
    path = "/api/core/backups",
    tag = "core",
    params(BackupQuery),
    responses((status = 200, description = "Backups", body = Page<BackupResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn list_backups(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<BackupQuery>,
) -> CoreResult<Json<Page<BackupResponse>>> {
    auth.require_worshipful_master()?;
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_backups(&state.db, &query, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset).map(BackupResponse::from)))
}

pub async fn get_backup(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<BackupResponse>> {
    auth.require_worshipful_master()?;
    queries::find_backup(&state.db, id)
        .await?
        .map(|b| Json(b.into()))
        .ok_or(CoreError::NotFound("Backup"))
}

/// `backup_YYYYMMDD_HHMMSS.sql`
pub fn backup_filename(now: DateTime<Utc>) -> String {
    format!("backup_{}.sql", now.format("%Y%m%d_%H%M%S"))
}

pub fn backup_file_path(dir: &str, filename: &str) -> String {
    format!("{}/{filename}", dir.trim_end_matches('/'))
}

/// Record a manual backup. No dump is taken.
#[utoipa::path(
    post,
    path = "/api/core/backups/create_backup",
    tag = "core",
    responses((status = 201, description = "Backup recorded", body = BackupResponse)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state), fields(user_id = %auth.id))]
pub async fn create_backup(
    State(state): State<AppState>,
    auth: AuthUser,
) -> CoreResult<(StatusCode, Json<BackupResponse>)> {
    auth.require_worshipful_master()?;

    let config = queries::get_or_create_backup_configuration(&state.db).await?;
    let filename = backup_filename(Utc::now());
    let file_path = backup_file_path(&config.backup_path, &filename);

    let backup = queries::insert_manual_backup(&state.db, &filename, &file_path, auth.id).await?;

    tracing::info!(backup_id = %backup.id, filename = %backup.filename, "Manual backup recorded");
    Ok((StatusCode::CREATED, Json(backup.into())))
}

#[utoipa::path(
    post,
    path = "/api/core/backups/{id}/restore",
    tag = "core",
    params(("id" = Uuid, Path, description = "Backup ID")),
    responses(
        (status = 200, description = "Restore started"),
        (status = 400, description = "Backup did not succeed"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, client), fields(user_id = %auth.id))]
pub async fn restore_backup(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<serde_json::Value>> {
    auth.require_worshipful_master()?;

    let backup = queries::find_backup(&state.db, id)
        .await?
        .ok_or(CoreError::NotFound("Backup"))?;

    if backup.status != super::types::BackupStatus::Success {
        return Err(CoreError::InvalidState(
            "Solo se pueden restaurar respaldos exitosos".to_string(),
        ));
    }

    let log = NewSystemLog::new(
        LogType::Info,
        "backups",
        format!("Restauración de respaldo iniciada: {}", backup.filename),
    )
    .user(Some(auth.id))
    .client(client.ip, client.user_agent);
    queries::record_log(&state.db, &log).await?;

    tracing::warn!(backup_id = %backup.id, filename = %backup.filename, "Backup restore requested");
    Ok(Json(json!({
        "status": "Restauración iniciada",
        "backup_id": backup.id,
        "filename": backup.filename,
    })))
}

// ============================================================================
// Health
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/core/health",
    tag = "core",
    params(HealthQuery),
    responses((status = 200, description = "Health snapshots", body = Page<SystemHealth>)),
    security(("bearer_auth" = []))
)]
pub async fn list_health(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<HealthQuery>,
) -> CoreResult<Json<Page<SystemHealth>>> {
    auth.require_degree(Degree::Master)?;
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_health(&state.db, &query, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

pub async fn get_health(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CoreResult<Json<SystemHealth>> {
    auth.require_degree(Degree::Master)?;
    queries::find_health(&state.db, id)
        .await?
        .map(Json)
        .ok_or(CoreError::NotFound("Health snapshot"))
}

async fn sample_in_background() -> CoreResult<super::health::HostSample> {
    tokio::task::spawn_blocking(sample_host)
        .await
        .map_err(|e| CoreError::Internal(e.to_string()))
}

/// Sample the host and database, persist and return a snapshot.
#[utoipa::path(
    get,
    path = "/api/core/health/current",
    tag = "core",
    responses((status = 200, description = "Fresh snapshot", body = SystemHealth)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state), fields(user_id = %auth.id))]
pub async fn current_health(
    State(state): State<AppState>,
    auth: AuthUser,
) -> CoreResult<Json<SystemHealth>> {
    auth.require_degree(Degree::Master)?;

    let sample = sample_in_background().await?;

    let started = Instant::now();
    let (db_size, db_connections) = queries::database_stats(&state.db).await?;
    let response_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    let (_, active_users) = queries::user_counts(&state.db).await?;

    let (status, message) = classify(&sample);
    let snapshot = DatabaseSnapshot {
        db_size,
        db_connections,
        active_users,
        response_time_ms,
    };
    let health = queries::insert_health(&state.db, &sample, &snapshot, status, &message).await?;

    if status != super::types::HealthStatus::Healthy {
        tracing::warn!(?status, message = %message, "Degraded system health");
    }
    Ok(Json(health))
}

#[utoipa::path(
    get,
    path = "/api/core/health/summary",
    tag = "core",
    responses((status = 200, description = "Health summary", body = HealthSummary)),
    security(("bearer_auth" = []))
)]
pub async fn health_summary(
    State(state): State<AppState>,
    auth: AuthUser,
) -> CoreResult<Json<HealthSummary>> {
    auth.require_degree(Degree::Master)?;

    let sample = sample_in_background().await?;
    let (status, _) = classify(&sample);
    let (total_users, active_users) = queries::user_counts(&state.db).await?;

    Ok(Json(HealthSummary {
        status,
        cpu_usage: sample.cpu_usage,
        memory_usage: sample.memory_usage,
        disk_usage: sample.disk_usage,
        total_users,
        active_users,
        uptime: uptime_parts(host_uptime_secs()),
        timestamp: Utc::now(),
    }))
}

/// Unauthenticated liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    tag = "core",
    responses((status = 200, description = "Service is up", body = LivenessResponse))
)]
pub async fn liveness(State(state): State<AppState>) -> Json<LivenessResponse> {
    let database = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    Json(LivenessResponse {
        status: "ok",
        database,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_backup_filename_format() {
        let now = Utc.with_ymd_and_hms(2025, 3, 21, 9, 5, 7).unwrap();
        assert_eq!(backup_filename(now), "backup_20250321_090507.sql");
    }

    #[test]
    fn test_backup_file_path_joins_once() {
        assert_eq!(backup_file_path("/backups", "a.sql"), "/backups/a.sql");
        assert_eq!(backup_file_path("/backups/", "a.sql"), "/backups/a.sql");
    }
}
