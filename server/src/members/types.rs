//! Members request and response types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::users::UserResponse;
use crate::permissions::OfficerRoleCode;
use crate::util::deserialize_double_option;

// ============================================================================
// Members
// ============================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct MemberQuery {
    pub is_active: Option<bool>,
    pub degree: Option<i16>,
    /// Only members holding this role actively.
    pub officer_role: Option<OfficerRoleCode>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Member with their profile.
#[derive(Debug, Serialize, ToSchema)]
pub struct MemberDetail {
    #[serde(flatten)]
    pub member: UserResponse,
    pub profile: Option<MemberProfile>,
}

// ============================================================================
// Profile
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct MemberProfile {
    pub user_id: Uuid,
    pub birth_date: Option<NaiveDate>,
    pub profession: String,
    pub civil_id: String,
    pub mother_lodge: String,
    pub masonic_id: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub emergency_contact_relation: String,
    pub last_attendance_date: Option<NaiveDate>,
    pub attendance_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial profile update. Attendance statistics are not client-editable.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub birth_date: Option<Option<NaiveDate>>,
    #[validate(length(max = 100))]
    pub profession: Option<String>,
    #[validate(length(max = 20))]
    pub civil_id: Option<String>,
    #[validate(length(max = 100))]
    pub mother_lodge: Option<String>,
    #[validate(length(max = 50))]
    pub masonic_id: Option<String>,
    #[validate(length(max = 100))]
    pub emergency_contact_name: Option<String>,
    #[validate(length(max = 20))]
    pub emergency_contact_phone: Option<String>,
    #[validate(length(max = 50))]
    pub emergency_contact_relation: Option<String>,
}

impl UpdateProfileRequest {
    pub fn apply(self, profile: &mut MemberProfile) {
        if let Some(v) = self.birth_date {
            profile.birth_date = v;
        }
        let fields = [
            (self.profession, &mut profile.profession),
            (self.civil_id, &mut profile.civil_id),
            (self.mother_lodge, &mut profile.mother_lodge),
            (self.masonic_id, &mut profile.masonic_id),
            (self.emergency_contact_name, &mut profile.emergency_contact_name),
            (self.emergency_contact_phone, &mut profile.emergency_contact_phone),
            (self.emergency_contact_relation, &mut profile.emergency_contact_relation),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

// ============================================================================
// Member documents
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum MemberDocumentType {
    Diploma,
    Certificate,
    IdCard,
    Other,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct MemberDocument {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub document_type: MemberDocumentType,
    /// Stored file reference (path or URL).
    pub file: String,
    pub description: String,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMemberDocumentRequest {
    /// Owner. Taken from the path on `members/{id}/documents`.
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub document_type: MemberDocumentType,
    #[validate(length(min = 1))]
    pub file: String,
    #[serde(default)]
    pub description: String,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMemberDocumentRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub document_type: Option<MemberDocumentType>,
    #[validate(length(min = 1))]
    pub file: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub issue_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub expiry_date: Option<Option<NaiveDate>>,
}

impl UpdateMemberDocumentRequest {
    pub fn apply(self, doc: &mut MemberDocument) {
        if let Some(v) = self.title {
            doc.title = v;
        }
        if let Some(v) = self.document_type {
            doc.document_type = v;
        }
        if let Some(v) = self.file {
            doc.file = v;
        }
        if let Some(v) = self.description {
            doc.description = v;
        }
        if let Some(v) = self.issue_date {
            doc.issue_date = v;
        }
        if let Some(v) = self.expiry_date {
            doc.expiry_date = v;
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MemberDocumentQuery {
    pub user_id: Option<Uuid>,
    pub document_type: Option<MemberDocumentType>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Progress
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct MemberProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub ceremony_type: String,
    pub location: String,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProgressRequest {
    /// Member. Taken from the path on `members/{id}/progress`.
    pub user_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub ceremony_type: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub location: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProgressRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    #[validate(length(max = 100))]
    pub ceremony_type: Option<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
}

impl UpdateProgressRequest {
    pub fn apply(self, progress: &mut MemberProgress) {
        if let Some(v) = self.title {
            progress.title = v;
        }
        if let Some(v) = self.description {
            progress.description = v;
        }
        if let Some(v) = self.date {
            progress.date = v;
        }
        if let Some(v) = self.ceremony_type {
            progress.ceremony_type = v;
        }
        if let Some(v) = self.location {
            progress.location = v;
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProgressQuery {
    pub user_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Attendance
// ============================================================================

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Attendance {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub is_present: bool,
    pub excuse: String,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAttendanceRequest {
    pub user_id: Uuid,
    pub event_id: Uuid,
    #[serde(default)]
    pub is_present: bool,
    #[serde(default)]
    pub excuse: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateAttendanceRequest {
    pub is_present: Option<bool>,
    pub excuse: Option<String>,
}

impl UpdateAttendanceRequest {
    pub fn apply(self, attendance: &mut Attendance) {
        if let Some(v) = self.is_present {
            attendance.is_present = v;
        }
        if let Some(v) = self.excuse {
            attendance.excuse = v;
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AttendanceQuery {
    pub user_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub is_present: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> MemberProfile {
        MemberProfile {
            user_id: Uuid::nil(),
            birth_date: NaiveDate::from_ymd_opt(1970, 5, 1),
            profession: "Ingeniero".into(),
            civil_id: String::new(),
            mother_lodge: String::new(),
            masonic_id: String::new(),
            emergency_contact_name: String::new(),
            emergency_contact_phone: String::new(),
            emergency_contact_relation: String::new(),
            last_attendance_date: None,
            attendance_count: 4,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_profile_update_merges_present_fields() {
        let mut p = profile();
        let body: UpdateProfileRequest =
            serde_json::from_str(r#"{"mother_lodge": "Luz y Verdad No. 1", "birth_date": null}"#)
                .unwrap();
        body.apply(&mut p);
        assert_eq!(p.mother_lodge, "Luz y Verdad No. 1");
        assert_eq!(p.profession, "Ingeniero");
        assert!(p.birth_date.is_none());
        assert_eq!(p.attendance_count, 4);
    }

    #[test]
    fn test_document_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&MemberDocumentType::IdCard).unwrap(),
            "\"id_card\""
        );
    }
}
