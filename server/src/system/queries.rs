//! Core module queries.

use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::health::HostSample;
use super::types::{
    Backup, BackupConfiguration, BackupQuery, HealthQuery, HealthStatus, LodgeConfiguration,
    LogQuery, NewSystemLog, SystemHealth, SystemLog,
};
use crate::db::db_error;
use crate::util::{push_date_range, push_page, push_search, Counted};

// ============================================================================
// Lodge configuration
// ============================================================================

/// Current configuration, inserting the defaults row if absent.
pub async fn get_or_create_configuration(pool: &PgPool) -> sqlx::Result<LodgeConfiguration> {
    sqlx::query_as::<_, LodgeConfiguration>(
        r"
        WITH ins AS (
            INSERT INTO lodge_configuration (id) VALUES (1)
            ON CONFLICT (id) DO NOTHING
            RETURNING *
        )
        SELECT * FROM ins
        UNION ALL
        SELECT * FROM lodge_configuration WHERE id = 1
        LIMIT 1
        ",
    )
    .fetch_one(pool)
    .await
    .map_err(db_error!("get_or_create_configuration"))
}

pub async fn save_configuration(
    pool: &PgPool,
    config: &LodgeConfiguration,
    updated_by: Uuid,
) -> sqlx::Result<LodgeConfiguration> {
    sqlx::query_as::<_, LodgeConfiguration>(
        r"
        UPDATE lodge_configuration SET
            lodge_name = $1, lodge_number = $2, foundation_date = $3, grand_lodge_name = $4,
            jurisdiction = $5, primary_color = $6, secondary_color = $7, email_from = $8,
            email_signature = $9, calendar_start_month = $10, maintenance_mode = $11,
            debug_mode = $12, updated_by = $13, updated_at = NOW()
        WHERE id = 1
        RETURNING *
        ",
    )
    .bind(&config.lodge_name)
    .bind(&config.lodge_number)
    .bind(config.foundation_date)
    .bind(&config.grand_lodge_name)
    .bind(&config.jurisdiction)
    .bind(&config.primary_color)
    .bind(&config.secondary_color)
    .bind(&config.email_from)
    .bind(&config.email_signature)
    .bind(config.calendar_start_month)
    .bind(config.maintenance_mode)
    .bind(config.debug_mode)
    .bind(updated_by)
    .fetch_one(pool)
    .await
    .map_err(db_error!("save_configuration", updated_by = %updated_by))
}

// ============================================================================
// System logs
// ============================================================================

/// Persist a system log row.
pub async fn record_log<'e, E>(executor: E, log: &NewSystemLog) -> sqlx::Result<Uuid>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, Uuid>(
        r"
        INSERT INTO system_logs (log_type, module, message, details, user_id, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        ",
    )
    .bind(log.log_type)
    .bind(&log.module)
    .bind(&log.message)
    .bind(&log.details)
    .bind(log.user_id)
    .bind(log.ip_address.as_deref())
    .bind(log.user_agent.as_deref().unwrap_or_default())
    .fetch_one(executor)
    .await
    .map_err(db_error!("record_log", module = %log.module))
}

pub async fn list_logs(
    pool: &PgPool,
    query: &LogQuery,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<SystemLog>>> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT *, COUNT(*) OVER() AS total_count FROM system_logs WHERE 1=1");

    if let Some(log_type) = query.log_type {
        builder.push(" AND log_type = ").push_bind(log_type);
    }
    if let Some(module) = &query.module {
        builder.push(" AND module = ").push_bind(module.clone());
    }
    if let Some(user_id) = query.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    push_date_range(&mut builder, "created_at::date", query.date_from, query.date_to);
    push_search(&mut builder, &["message", "details"], query.search.as_deref());

    builder.push(" ORDER BY created_at DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_logs"))
}

pub async fn find_log(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<SystemLog>> {
    sqlx::query_as::<_, SystemLog>("SELECT * FROM system_logs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_log", log_id = %id))
}

// ============================================================================
// Backups
// ============================================================================

pub async fn get_or_create_backup_configuration(
    pool: &PgPool,
) -> sqlx::Result<BackupConfiguration> {
    sqlx::query_as::<_, BackupConfiguration>(
        r"
        WITH ins AS (
            INSERT INTO backup_configuration (id) VALUES (1)
            ON CONFLICT (id) DO NOTHING
            RETURNING *
        )
        SELECT * FROM ins
        UNION ALL
        SELECT * FROM backup_configuration WHERE id = 1
        LIMIT 1
        ",
    )
    .fetch_one(pool)
    .await
    .map_err(db_error!("get_or_create_backup_configuration"))
}

pub async fn save_backup_configuration(
    pool: &PgPool,
    config: &BackupConfiguration,
    updated_by: Uuid,
) -> sqlx::Result<BackupConfiguration> {
    sqlx::query_as::<_, BackupConfiguration>(
        r"
        UPDATE backup_configuration SET
            is_active = $1, frequency = $2, weekday = $3, day_of_month = $4, hour = $5,
            minute = $6, keep_daily = $7, keep_weekly = $8, keep_monthly = $9, backup_path = $10,
            include_media = $11, compress = $12, encrypt = $13, notify_on_success = $14,
            notify_on_failure = $15, notification_email = $16, updated_by = $17, updated_at = NOW()
        WHERE id = 1
        RETURNING *
        ",
    )
    .bind(config.is_active)
    .bind(config.frequency)
    .bind(config.weekday)
    .bind(config.day_of_month)
    .bind(config.hour)
    .bind(config.minute)
    .bind(config.keep_daily)
    .bind(config.keep_weekly)
    .bind(config.keep_monthly)
    .bind(&config.backup_path)
    .bind(config.include_media)
    .bind(config.compress)
    .bind(config.encrypt)
    .bind(config.notify_on_success)
    .bind(config.notify_on_failure)
    .bind(&config.notification_email)
    .bind(updated_by)
    .fetch_one(pool)
    .await
    .map_err(db_error!("save_backup_configuration", updated_by = %updated_by))
}

pub async fn list_backups(
    pool: &PgPool,
    query: &BackupQuery,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<Backup>>> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT *, COUNT(*) OVER() AS total_count FROM backups WHERE 1=1");

    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(backup_type) = query.backup_type {
        builder.push(" AND backup_type = ").push_bind(backup_type);
    }

    builder.push(" ORDER BY created_at DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_backups"))
}

pub async fn find_backup(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Backup>> {
    sqlx::query_as::<_, Backup>("SELECT * FROM backups WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_backup", backup_id = %id))
}

/// Record a completed manual backup.
pub async fn insert_manual_backup(
    pool: &PgPool,
    filename: &str,
    file_path: &str,
    created_by: Uuid,
) -> sqlx::Result<Backup> {
    sqlx::query_as::<_, Backup>(
        r"
        INSERT INTO backups (filename, file_path, backup_type, status, created_by, completed_at)
        VALUES ($1, $2, 'manual', 'success', $3, NOW())
        RETURNING *
        ",
    )
    .bind(filename)
    .bind(file_path)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(db_error!("insert_manual_backup", created_by = %created_by))
}

// ============================================================================
// Health
// ============================================================================

/// Database size in bytes and open connection count.
pub async fn database_stats(pool: &PgPool) -> sqlx::Result<(i64, i64)> {
    sqlx::query_as::<_, (i64, i64)>(
        r"
        SELECT pg_database_size(current_database()),
               (SELECT COUNT(*) FROM pg_stat_activity WHERE datname = current_database())
        ",
    )
    .fetch_one(pool)
    .await
    .map_err(db_error!("database_stats"))
}

/// Total and active user counts.
pub async fn user_counts(pool: &PgPool) -> sqlx::Result<(i64, i64)> {
    sqlx::query_as::<_, (i64, i64)>(
        "SELECT COUNT(*), COUNT(*) FILTER (WHERE is_active) FROM users",
    )
    .fetch_one(pool)
    .await
    .map_err(db_error!("user_counts"))
}

/// Snapshot fields that come from the database rather than the host.
#[derive(Debug, Clone, Copy)]
pub struct DatabaseSnapshot {
    pub db_size: i64,
    pub db_connections: i64,
    pub active_users: i64,
    pub response_time_ms: f64,
}

pub async fn insert_health(
    pool: &PgPool,
    sample: &HostSample,
    db: &DatabaseSnapshot,
    status: HealthStatus,
    status_message: &str,
) -> sqlx::Result<SystemHealth> {
    sqlx::query_as::<_, SystemHealth>(
        r"
        INSERT INTO system_health (cpu_usage, memory_usage, disk_usage, db_size, db_connections,
                                   active_users, response_time, status, status_message)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        ",
    )
    .bind(sample.cpu_usage)
    .bind(sample.memory_usage)
    .bind(sample.disk_usage)
    .bind(db.db_size)
    .bind(db.db_connections as i32)
    .bind(db.active_users as i32)
    .bind(db.response_time_ms)
    .bind(status)
    .bind(status_message)
    .fetch_one(pool)
    .await
    .map_err(db_error!("insert_health"))
}

pub async fn list_health(
    pool: &PgPool,
    query: &HealthQuery,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<SystemHealth>>> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT *, COUNT(*) OVER() AS total_count FROM system_health WHERE 1=1");

    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status);
    }
    push_date_range(&mut builder, "created_at::date", query.date_from, query.date_to);

    builder.push(" ORDER BY created_at DESC");
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_health"))
}

pub async fn find_health(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<SystemHealth>> {
    sqlx::query_as::<_, SystemHealth>("SELECT * FROM system_health WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_health", health_id = %id))
}
