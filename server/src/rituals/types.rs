//! Ritual planning types.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::util::deserialize_double_option;

// ============================================================================
// Plans
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum RitualType {
    #[default]
    Regular,
    Initiation,
    Passing,
    Raising,
    Installation,
    Special,
}

impl RitualType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Regular => "Tenida Regular",
            Self::Initiation => "Iniciación",
            Self::Passing => "Pase de Grado",
            Self::Raising => "Exaltación",
            Self::Installation => "Instalación de Oficiales",
            Self::Special => "Ceremonia Especial",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Draft,
    Approved,
    Completed,
    Cancelled,
}

impl PlanStatus {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Draft => "Borrador",
            Self::Approved => "Aprobado",
            Self::Completed => "Completado",
            Self::Cancelled => "Cancelado",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct RitualPlan {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "19:30:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    pub ritual_type: RitualType,
    pub degree: i16,
    pub status: PlanStatus,
    pub event_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RitualPlan {
    /// Author of status notifications: the approver, else the creator.
    pub fn notifier(&self) -> Option<Uuid> {
        self.approved_by.or(self.created_by)
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PlanResponse {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub plan: RitualPlan,
    pub created_by_name: Option<String>,
    pub approved_by_name: Option<String>,
    pub roles_count: i64,
    pub works_count: i64,
    pub has_minutes: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePlanRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    #[schema(value_type = String)]
    pub start_time: NaiveTime,
    #[schema(value_type = Option<String>)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub ritual_type: RitualType,
    #[serde(default = "default_degree")]
    #[validate(range(min = 1, max = 3))]
    pub degree: i16,
    /// Existing event to attach; when absent a new event is created.
    pub event_id: Option<Uuid>,
}

const fn default_degree() -> i16 {
    1
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePlanRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub start_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<String>)]
    pub end_time: Option<Option<NaiveTime>>,
    pub ritual_type: Option<RitualType>,
    #[validate(range(min = 1, max = 3))]
    pub degree: Option<i16>,
    pub status: Option<PlanStatus>,
}

impl UpdatePlanRequest {
    pub fn apply(self, plan: &mut RitualPlan) {
        if let Some(v) = self.title {
            plan.title = v;
        }
        if let Some(v) = self.description {
            plan.description = v;
        }
        if let Some(v) = self.date {
            plan.date = v;
        }
        if let Some(v) = self.start_time {
            plan.start_time = v;
        }
        if let Some(v) = self.end_time {
            plan.end_time = v;
        }
        if let Some(v) = self.ritual_type {
            plan.ritual_type = v;
        }
        if let Some(v) = self.degree {
            plan.degree = v;
        }
        if let Some(v) = self.status {
            plan.status = v;
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PlanQuery {
    pub ritual_type: Option<RitualType>,
    pub degree: Option<i16>,
    pub status: Option<PlanStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
    /// Only plans dated today or later that are not cancelled.
    pub upcoming: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Roles
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum RoleType {
    Vm,
    Pv,
    Sv,
    Sec,
    Tes,
    Pd,
    Sd,
    Gi,
    Gt,
    Cap,
    Ora,
    Mce,
    Exp,
    Hos,
    Mus,
    Other,
}

impl RoleType {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vm => "Venerable Maestro",
            Self::Pv => "Primer Vigilante",
            Self::Sv => "Segundo Vigilante",
            Self::Sec => "Secretario",
            Self::Tes => "Tesorero",
            Self::Pd => "Primer Diácono",
            Self::Sd => "Segundo Diácono",
            Self::Gi => "Guarda Templo Interior",
            Self::Gt => "Guarda Templo Exterior",
            Self::Cap => "Capellán",
            Self::Ora => "Orador",
            Self::Mce => "Maestro de Ceremonias",
            Self::Exp => "Experto",
            Self::Hos => "Hospitalario",
            Self::Mus => "Músico",
            Self::Other => "Otro",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct RitualRole {
    pub id: Uuid,
    pub ritual_plan_id: Uuid,
    pub role_type: RoleType,
    pub custom_role: String,
    pub assigned_to: Option<Uuid>,
    pub notes: String,
    pub is_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RitualRole {
    /// Display name; `other` roles use their custom label.
    pub fn role_name(&self) -> &str {
        match self.role_type {
            RoleType::Other if !self.custom_role.trim().is_empty() => &self.custom_role,
            role => role.name(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct RoleRow {
    #[sqlx(flatten)]
    pub role: RitualRole,
    pub assigned_to_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoleResponse {
    #[serde(flatten)]
    pub role: RitualRole,
    pub role_name: String,
    pub assigned_to_name: Option<String>,
}

impl From<RoleRow> for RoleResponse {
    fn from(row: RoleRow) -> Self {
        Self {
            role_name: row.role.role_name().to_string(),
            role: row.role,
            assigned_to_name: row.assigned_to_name,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRoleRequest {
    /// Required on `roles/`; taken from the path on `add_role`.
    pub ritual_plan_id: Option<Uuid>,
    pub role_type: RoleType,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub custom_role: String,
    pub assigned_to: Option<Uuid>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub is_confirmed: bool,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateRoleRequest {
    pub role_type: Option<RoleType>,
    #[validate(length(max = 100))]
    pub custom_role: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub assigned_to: Option<Option<Uuid>>,
    pub notes: Option<String>,
    pub is_confirmed: Option<bool>,
}

impl UpdateRoleRequest {
    pub fn apply(self, role: &mut RitualRole) {
        if let Some(v) = self.role_type {
            role.role_type = v;
        }
        if let Some(v) = self.custom_role {
            role.custom_role = v;
        }
        if let Some(v) = self.assigned_to {
            role.assigned_to = v;
        }
        if let Some(v) = self.notes {
            role.notes = v;
        }
        if let Some(v) = self.is_confirmed {
            role.is_confirmed = v;
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRoleRequest {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct RoleQuery {
    pub ritual_plan_id: Option<Uuid>,
    pub role_type: Option<RoleType>,
    pub assigned_to_id: Option<Uuid>,
    pub is_confirmed: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Works
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum WorkType {
    #[default]
    Lecture,
    Ceremony,
    Discussion,
    Presentation,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum WorkStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl WorkStatus {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pending => "Pendiente",
            Self::Confirmed => "Confirmado",
            Self::Completed => "Completado",
            Self::Cancelled => "Cancelado",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct RitualWork {
    pub id: Uuid,
    pub ritual_plan_id: Uuid,
    pub title: String,
    pub description: String,
    pub work_type: WorkType,
    pub responsible_id: Option<Uuid>,
    pub estimated_duration: i32,
    pub order: i32,
    pub attachment: String,
    pub status: WorkStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct WorkResponse {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub work: RitualWork,
    pub responsible_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateWorkRequest {
    /// Required on `works/`; taken from the path on `add_work`.
    pub ritual_plan_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub work_type: WorkType,
    pub responsible_id: Option<Uuid>,
    #[serde(default = "default_duration")]
    #[validate(range(min = 1))]
    pub estimated_duration: i32,
    #[serde(default = "default_order")]
    pub order: i32,
    #[serde(default)]
    pub attachment: String,
    #[serde(default)]
    pub status: WorkStatus,
}

const fn default_duration() -> i32 {
    15
}

const fn default_order() -> i32 {
    1
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateWorkRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub work_type: Option<WorkType>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub responsible_id: Option<Option<Uuid>>,
    #[validate(range(min = 1))]
    pub estimated_duration: Option<i32>,
    pub order: Option<i32>,
    pub attachment: Option<String>,
    pub status: Option<WorkStatus>,
}

impl UpdateWorkRequest {
    pub fn apply(self, work: &mut RitualWork) {
        if let Some(v) = self.title {
            work.title = v;
        }
        if let Some(v) = self.description {
            work.description = v;
        }
        if let Some(v) = self.work_type {
            work.work_type = v;
        }
        if let Some(v) = self.responsible_id {
            work.responsible_id = v;
        }
        if let Some(v) = self.estimated_duration {
            work.estimated_duration = v;
        }
        if let Some(v) = self.order {
            work.order = v;
        }
        if let Some(v) = self.attachment {
            work.attachment = v;
        }
        if let Some(v) = self.status {
            work.status = v;
        }
    }
}

/// Body of `works/{id}/update_status`. Kept as a string so unknown values
/// are reported as a validation error.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WorkStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct WorkQuery {
    pub ritual_plan_id: Option<Uuid>,
    pub work_type: Option<WorkType>,
    pub status: Option<WorkStatus>,
    pub responsible_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Minutes
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum MinutesStatus {
    #[default]
    Draft,
    Finalized,
    Approved,
}

impl MinutesStatus {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Draft => "Borrador",
            Self::Finalized => "Finalizada",
            Self::Approved => "Aprobada",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct RitualMinutes {
    pub id: Uuid,
    pub ritual_plan_id: Uuid,
    pub content: String,
    pub attendance_count: i32,
    pub visitors_count: i32,
    pub status: MinutesStatus,
    pub created_by: Option<Uuid>,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMinutesRequest {
    pub ritual_plan_id: Uuid,
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub attendance_count: i32,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub visitors_count: i32,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMinutesRequest {
    #[validate(length(min = 1))]
    pub content: Option<String>,
    #[validate(range(min = 0))]
    pub attendance_count: Option<i32>,
    #[validate(range(min = 0))]
    pub visitors_count: Option<i32>,
}

impl UpdateMinutesRequest {
    pub fn apply(self, minutes: &mut RitualMinutes) {
        if let Some(v) = self.content {
            minutes.content = v;
        }
        if let Some(v) = self.attendance_count {
            minutes.attendance_count = v;
        }
        if let Some(v) = self.visitors_count {
            minutes.visitors_count = v;
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MinutesQuery {
    pub ritual_plan_id: Option<Uuid>,
    pub status: Option<MinutesStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Attachments
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum AttachmentType {
    Lecture,
    CeremonyScript,
    Music,
    Image,
    Diagram,
    #[default]
    Other,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct RitualAttachment {
    pub id: Uuid,
    pub ritual_plan_id: Uuid,
    pub title: String,
    pub description: String,
    pub attachment_type: AttachmentType,
    pub file: String,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAttachmentRequest {
    /// Required on `attachments/`; taken from the path on `add_attachment`.
    pub ritual_plan_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub attachment_type: AttachmentType,
    /// Stored file reference.
    #[validate(length(min = 1, max = 500))]
    pub file: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateAttachmentRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub attachment_type: Option<AttachmentType>,
    #[validate(length(min = 1, max = 500))]
    pub file: Option<String>,
}

impl UpdateAttachmentRequest {
    pub fn apply(self, attachment: &mut RitualAttachment) {
        if let Some(v) = self.title {
            attachment.title = v;
        }
        if let Some(v) = self.description {
            attachment.description = v;
        }
        if let Some(v) = self.attachment_type {
            attachment.attachment_type = v;
        }
        if let Some(v) = self.file {
            attachment.file = v;
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AttachmentQuery {
    pub ritual_plan_id: Option<Uuid>,
    pub attachment_type: Option<AttachmentType>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(role_type: RoleType, custom_role: &str) -> RitualRole {
        RitualRole {
            id: Uuid::new_v4(),
            ritual_plan_id: Uuid::new_v4(),
            role_type,
            custom_role: custom_role.into(),
            assigned_to: None,
            notes: String::new(),
            is_confirmed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_role_names() {
        assert_eq!(role(RoleType::Vm, "").role_name(), "Venerable Maestro");
        assert_eq!(role(RoleType::Gi, "").role_name(), "Guarda Templo Interior");
        assert_eq!(role(RoleType::Other, "Porta Estandarte").role_name(), "Porta Estandarte");
        assert_eq!(role(RoleType::Other, "  ").role_name(), "Otro");
        // Custom labels only apply to `other`.
        assert_eq!(role(RoleType::Mus, "Organista").role_name(), "Músico");
    }

    #[test]
    fn test_work_status_parse() {
        assert_eq!(WorkStatus::parse("confirmed"), Some(WorkStatus::Confirmed));
        assert_eq!(WorkStatus::parse("Confirmed"), None);
        assert_eq!(WorkStatus::parse("done"), None);
    }

    #[test]
    fn test_status_display_names() {
        assert_eq!(PlanStatus::Approved.name(), "Aprobado");
        assert_eq!(MinutesStatus::Finalized.name(), "Finalizada");
        assert_eq!(RitualType::Raising.name(), "Exaltación");
    }

    #[test]
    fn test_plan_defaults() {
        let body: CreatePlanRequest = serde_json::from_str(
            r#"{"title": "Tenida de marzo", "date": "2025-03-21", "start_time": "19:30:00"}"#,
        )
        .unwrap();
        assert_eq!(body.degree, 1);
        assert_eq!(body.ritual_type, RitualType::Regular);
        assert!(body.event_id.is_none());
    }
}
