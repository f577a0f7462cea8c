//! Core module types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::util::deserialize_double_option;

// ============================================================================
// Lodge configuration
// ============================================================================

/// Lodge name used until the configuration row says otherwise.
pub const DEFAULT_LODGE_NAME: &str = "Logia Luz y Verdad";

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct LodgeConfiguration {
    pub lodge_name: String,
    pub lodge_number: String,
    pub foundation_date: Option<NaiveDate>,
    pub grand_lodge_name: String,
    pub jurisdiction: String,
    pub primary_color: String,
    pub secondary_color: String,
    pub email_from: String,
    pub email_signature: String,
    pub calendar_start_month: i16,
    pub maintenance_mode: bool,
    pub debug_mode: bool,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// `PUT configuration/current`. Absent fields keep their value.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateConfigurationRequest {
    #[validate(length(min = 1, max = 200))]
    pub lodge_name: Option<String>,
    #[validate(length(max = 50))]
    pub lodge_number: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    #[allow(clippy::option_option)]
    pub foundation_date: Option<Option<NaiveDate>>,
    pub grand_lodge_name: Option<String>,
    pub jurisdiction: Option<String>,
    #[validate(custom(function = "validate_hex_color"))]
    pub primary_color: Option<String>,
    #[validate(custom(function = "validate_hex_color"))]
    pub secondary_color: Option<String>,
    #[validate(email)]
    pub email_from: Option<String>,
    pub email_signature: Option<String>,
    #[validate(range(min = 1, max = 12))]
    pub calendar_start_month: Option<i16>,
    pub maintenance_mode: Option<bool>,
    pub debug_mode: Option<bool>,
}

impl UpdateConfigurationRequest {
    pub fn apply(self, config: &mut LodgeConfiguration) {
        if let Some(v) = self.lodge_name {
            config.lodge_name = v;
        }
        if let Some(v) = self.lodge_number {
            config.lodge_number = v;
        }
        if let Some(v) = self.foundation_date {
            config.foundation_date = v;
        }
        if let Some(v) = self.grand_lodge_name {
            config.grand_lodge_name = v;
        }
        if let Some(v) = self.jurisdiction {
            config.jurisdiction = v;
        }
        if let Some(v) = self.primary_color {
            config.primary_color = v;
        }
        if let Some(v) = self.secondary_color {
            config.secondary_color = v;
        }
        if let Some(v) = self.email_from {
            config.email_from = v;
        }
        if let Some(v) = self.email_signature {
            config.email_signature = v;
        }
        if let Some(v) = self.calendar_start_month {
            config.calendar_start_month = v;
        }
        if let Some(v) = self.maintenance_mode {
            config.maintenance_mode = v;
        }
        if let Some(v) = self.debug_mode {
            config.debug_mode = v;
        }
    }
}

/// `#RRGGBB`.
pub fn validate_hex_color(value: &str) -> Result<(), validator::ValidationError> {
    let valid = value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(validator::ValidationError::new("hex_color"))
    }
}

// ============================================================================
// System logs
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum LogType {
    Info,
    Warning,
    Error,
    Critical,
    Security,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct SystemLog {
    pub id: Uuid,
    pub log_type: LogType,
    pub module: String,
    pub message: String,
    pub details: String,
    pub user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

/// A log row about to be written.
#[derive(Debug, Clone)]
pub struct NewSystemLog {
    pub log_type: LogType,
    pub module: String,
    pub message: String,
    pub details: String,
    pub user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewSystemLog {
    pub fn new(log_type: LogType, module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            log_type,
            module: module.into(),
            message: message.into(),
            details: String::new(),
            user_id: None,
            ip_address: None,
            user_agent: None,
        }
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = details.into();
        self
    }

    #[must_use]
    pub const fn user(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    #[must_use]
    pub fn client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LogQuery {
    pub log_type: Option<LogType>,
    pub module: Option<String>,
    pub user_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddLogRequest {
    pub log_type: LogType,
    #[validate(length(min = 1, max = 50))]
    pub module: String,
    #[validate(length(min = 1))]
    pub message: String,
    #[serde(default)]
    pub details: String,
}

// ============================================================================
// Backups
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum BackupFrequency {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct BackupConfiguration {
    pub is_active: bool,
    pub frequency: BackupFrequency,
    pub weekday: i16,
    pub day_of_month: i16,
    pub hour: i16,
    pub minute: i16,
    pub keep_daily: i32,
    pub keep_weekly: i32,
    pub keep_monthly: i32,
    pub backup_path: String,
    pub include_media: bool,
    pub compress: bool,
    pub encrypt: bool,
    pub notify_on_success: bool,
    pub notify_on_failure: bool,
    pub notification_email: String,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBackupConfigurationRequest {
    pub is_active: Option<bool>,
    pub frequency: Option<BackupFrequency>,
    #[validate(range(min = 0, max = 6))]
    pub weekday: Option<i16>,
    #[validate(range(min = 1, max = 31))]
    pub day_of_month: Option<i16>,
    #[validate(range(min = 0, max = 23))]
    pub hour: Option<i16>,
    #[validate(range(min = 0, max = 59))]
    pub minute: Option<i16>,
    #[validate(range(min = 0))]
    pub keep_daily: Option<i32>,
    #[validate(range(min = 0))]
    pub keep_weekly: Option<i32>,
    #[validate(range(min = 0))]
    pub keep_monthly: Option<i32>,
    #[validate(length(min = 1))]
    pub backup_path: Option<String>,
    pub include_media: Option<bool>,
    pub compress: Option<bool>,
    pub encrypt: Option<bool>,
    pub notify_on_success: Option<bool>,
    pub notify_on_failure: Option<bool>,
    pub notification_email: Option<String>,
}

impl UpdateBackupConfigurationRequest {
    pub fn apply(self, config: &mut BackupConfiguration) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = self.$field {
                    config.$field = v;
                })*
            };
        }
        merge!(
            is_active,
            frequency,
            weekday,
            day_of_month,
            hour,
            minute,
            keep_daily,
            keep_weekly,
            keep_monthly,
            backup_path,
            include_media,
            compress,
            encrypt,
            notify_on_success,
            notify_on_failure,
            notification_email,
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum BackupType {
    Manual,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum BackupStatus {
    Success,
    Failure,
    InProgress,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Backup {
    pub id: Uuid,
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub backup_type: BackupType,
    pub status: BackupStatus,
    pub error_message: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Backup with its size formatted for display.
#[derive(Debug, Serialize, ToSchema)]
pub struct BackupResponse {
    #[serde(flatten)]
    pub backup: Backup,
    pub file_size_display: String,
}

impl From<Backup> for BackupResponse {
    fn from(backup: Backup) -> Self {
        Self {
            file_size_display: crate::util::format_file_size(backup.file_size),
            backup,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BackupQuery {
    pub status: Option<BackupStatus>,
    pub backup_type: Option<BackupType>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct SystemHealth {
    pub id: Uuid,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    pub db_size: i64,
    pub db_connections: i32,
    pub active_users: i32,
    pub response_time: f64,
    pub status: HealthStatus,
    pub status_message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HealthQuery {
    pub status: Option<HealthStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Uptime {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthSummary {
    pub status: HealthStatus,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    pub total_users: i64,
    pub active_users: i64,
    pub uptime: Uptime,
    pub timestamp: DateTime<Utc>,
}

/// `GET /health` liveness body.
#[derive(Debug, Serialize, ToSchema)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub database: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LodgeConfiguration {
        LodgeConfiguration {
            lodge_name: DEFAULT_LODGE_NAME.into(),
            lodge_number: String::new(),
            foundation_date: NaiveDate::from_ymd_opt(1990, 6, 24),
            grand_lodge_name: String::new(),
            jurisdiction: String::new(),
            primary_color: "#1a237e".into(),
            secondary_color: "#ffc107".into(),
            email_from: String::new(),
            email_signature: String::new(),
            calendar_start_month: 1,
            maintenance_mode: false,
            debug_mode: false,
            updated_by: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_hex_color_validation() {
        assert!(validate_hex_color("#1a237e").is_ok());
        assert!(validate_hex_color("#FFC107").is_ok());
        assert!(validate_hex_color("1a237e").is_err());
        assert!(validate_hex_color("#1a237").is_err());
        assert!(validate_hex_color("#gggggg").is_err());
    }

    #[test]
    fn test_configuration_request_validation() {
        let req: UpdateConfigurationRequest = serde_json::from_value(serde_json::json!({
            "primary_color": "red",
            "calendar_start_month": 13
        }))
        .unwrap();
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("primary_color"));
        assert!(fields.contains_key("calendar_start_month"));
    }

    #[test]
    fn test_configuration_apply_keeps_absent_fields() {
        let mut current = config();
        let req: UpdateConfigurationRequest = serde_json::from_value(serde_json::json!({
            "lodge_name": "Logia Aurora",
            "foundation_date": null
        }))
        .unwrap();
        req.apply(&mut current);
        assert_eq!(current.lodge_name, "Logia Aurora");
        assert_eq!(current.foundation_date, None);
        assert_eq!(current.primary_color, "#1a237e");
    }

    #[test]
    fn test_backup_response_formats_size() {
        let backup = Backup {
            id: Uuid::new_v4(),
            filename: "backup_20250101_000000.sql".into(),
            file_path: "/backups/backup_20250101_000000.sql".into(),
            file_size: 5 * 1024 * 1024,
            backup_type: BackupType::Manual,
            status: BackupStatus::Success,
            error_message: String::new(),
            created_by: None,
            created_at: Utc::now(),
            completed_at: Some(Utc::now()),
        };
        let response = BackupResponse::from(backup);
        assert_eq!(response.file_size_display, "5.0MB");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["backup_type"], "manual");
    }
}
