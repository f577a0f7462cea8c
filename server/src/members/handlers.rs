//! Members HTTP handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use super::error::{MembersError, MembersResult};
use super::progress::apply_progress;
use super::queries;
use super::types::{
    Attendance, AttendanceQuery, CreateAttendanceRequest, CreateMemberDocumentRequest,
    CreateProgressRequest, MemberDetail, MemberDocument, MemberDocumentQuery, MemberProfile,
    MemberProgress, MemberQuery, ProgressQuery, UpdateAttendanceRequest,
    UpdateMemberDocumentRequest, UpdateProfileRequest, UpdateProgressRequest,
};
use crate::api::AppState;
use crate::auth::users::{with_officer_roles, UserResponse};
use crate::auth::AuthUser;
use crate::db::{self, UserFilter};
use crate::permissions::{LodgePermissions, PermissionError};
use crate::util::{page_bounds, Page};

/// The member themself, or anyone holding `change_memberprofile`.
fn require_self_or_editor(auth: &AuthUser, user_id: Uuid) -> Result<(), PermissionError> {
    if auth.id == user_id {
        Ok(())
    } else {
        auth.require_permission(LodgePermissions::CHANGE_MEMBERPROFILE)
    }
}

async fn ensure_member(state: &AppState, id: Uuid) -> MembersResult<db::User> {
    db::find_user_by_id(&state.db, id)
        .await?
        .ok_or(MembersError::NotFound("Member"))
}

// ============================================================================
// Members
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/members/members/",
    tag = "members",
    params(MemberQuery),
    responses((status = 200, description = "Members", body = Page<UserResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn list_members(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<MemberQuery>,
) -> MembersResult<Json<Page<UserResponse>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let filter = UserFilter {
        is_active: query.is_active,
        degree: query.degree,
        officer_role: query.officer_role,
        search: query.search.as_deref(),
    };
    let rows = db::list_users(&state.db, &filter, "u.symbolic_name, u.username", limit, offset).await?;
    let page = Page::from_counted(rows, limit, offset);
    let items = with_officer_roles(&state.db, page.items).await?;

    Ok(Json(Page {
        items,
        total: page.total,
        limit,
        offset,
    }))
}

#[utoipa::path(
    get,
    path = "/api/members/members/{id}",
    tag = "members",
    params(("id" = Uuid, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Member with profile", body = MemberDetail),
        (status = 404, description = "Member not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_member(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> MembersResult<Json<MemberDetail>> {
    let user = ensure_member(&state, id).await?;
    let role = db::find_officer_role(&state.db, id).await?;
    let profile = queries::find_profile(&state.db, id).await?;

    Ok(Json(MemberDetail {
        member: UserResponse::new(user, role.as_ref()),
        profile,
    }))
}

pub async fn get_profile(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> MembersResult<Json<MemberProfile>> {
    ensure_member(&state, id).await?;
    Ok(Json(queries::get_or_create_profile(&state.db, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/members/members/{id}/profile",
    tag = "members",
    params(("id" = Uuid, Path, description = "Member ID")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = MemberProfile),
        (status = 403, description = "Not self and lacks change_memberprofile"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(actor = %auth.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateProfileRequest>,
) -> MembersResult<Json<MemberProfile>> {
    require_self_or_editor(&auth, id)?;
    body.validate()?;
    ensure_member(&state, id).await?;

    let mut profile = queries::get_or_create_profile(&state.db, id).await?;
    body.apply(&mut profile);
    let saved = queries::save_profile(&state.db, &profile).await?;

    tracing::info!(user_id = %id, actor = %auth.id, "Member profile updated");
    Ok(Json(saved))
}

pub async fn member_documents(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> MembersResult<Json<Page<MemberDocument>>> {
    ensure_member(&state, id).await?;
    let query = MemberDocumentQuery {
        user_id: Some(id),
        document_type: None,
        limit: None,
        offset: None,
    };
    list_documents(State(state), auth, Query(query)).await
}

pub async fn add_member_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(mut body): Json<CreateMemberDocumentRequest>,
) -> MembersResult<(StatusCode, Json<MemberDocument>)> {
    body.user_id = Some(id);
    create_document(State(state), auth, Json(body)).await
}

pub async fn member_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> MembersResult<Json<Page<MemberProgress>>> {
    ensure_member(&state, id).await?;
    let query = ProgressQuery {
        user_id: Some(id),
        date_from: None,
        date_to: None,
        limit: None,
        offset: None,
    };
    list_progress(State(state), auth, Query(query)).await
}

pub async fn add_member_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(mut body): Json<CreateProgressRequest>,
) -> MembersResult<(StatusCode, Json<MemberProgress>)> {
    body.user_id = Some(id);
    create_progress(State(state), auth, Json(body)).await
}

pub async fn member_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> MembersResult<Json<Page<Attendance>>> {
    ensure_member(&state, id).await?;
    let query = AttendanceQuery {
        user_id: Some(id),
        event_id: None,
        is_present: None,
        limit: None,
        offset: None,
    };
    list_attendance(State(state), auth, Query(query)).await
}

// ============================================================================
// Member documents
// ============================================================================

pub async fn list_documents(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<MemberDocumentQuery>,
) -> MembersResult<Json<Page<MemberDocument>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_member_documents(&state.db, &query, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

#[utoipa::path(
    post,
    path = "/api/members/documents/",
    tag = "members",
    request_body = CreateMemberDocumentRequest,
    responses(
        (status = 201, description = "Document recorded", body = MemberDocument),
        (status = 403, description = "Not self and lacks change_memberprofile"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(actor = %auth.id))]
pub async fn create_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateMemberDocumentRequest>,
) -> MembersResult<(StatusCode, Json<MemberDocument>)> {
    let user_id = body
        .user_id
        .ok_or_else(|| MembersError::Validation("user_id is required".to_string()))?;
    require_self_or_editor(&auth, user_id)?;
    body.validate()?;
    ensure_member(&state, user_id).await?;

    let doc = queries::insert_member_document(&state.db, user_id, &body, auth.id).await?;
    tracing::info!(document_id = %doc.id, user_id = %user_id, "Member document added");
    Ok((StatusCode::CREATED, Json(doc)))
}

pub async fn get_document(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> MembersResult<Json<MemberDocument>> {
    queries::find_member_document(&state.db, id)
        .await?
        .map(Json)
        .ok_or(MembersError::NotFound("Member document"))
}

pub async fn update_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMemberDocumentRequest>,
) -> MembersResult<Json<MemberDocument>> {
    body.validate()?;
    let mut doc = queries::find_member_document(&state.db, id)
        .await?
        .ok_or(MembersError::NotFound("Member document"))?;
    require_self_or_editor(&auth, doc.user_id)?;

    body.apply(&mut doc);
    Ok(Json(queries::save_member_document(&state.db, &doc).await?))
}

pub async fn delete_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> MembersResult<StatusCode> {
    let doc = queries::find_member_document(&state.db, id)
        .await?
        .ok_or(MembersError::NotFound("Member document"))?;
    require_self_or_editor(&auth, doc.user_id)?;

    queries::delete_member_document(&state.db, id).await?;
    tracing::info!(document_id = %id, actor = %auth.id, "Member document deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Progress
// ============================================================================

pub async fn list_progress(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ProgressQuery>,
) -> MembersResult<Json<Page<MemberProgress>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_progress(&state.db, &query, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

/// Record progress and promote the member when the title names a degree ceremony.
#[utoipa::path(
    post,
    path = "/api/members/progress/",
    tag = "members",
    request_body = CreateProgressRequest,
    responses(
        (status = 201, description = "Progress recorded", body = MemberProgress),
        (status = 403, description = "Lacks change_memberprofile"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(actor = %auth.id))]
pub async fn create_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateProgressRequest>,
) -> MembersResult<(StatusCode, Json<MemberProgress>)> {
    auth.require_permission(LodgePermissions::CHANGE_MEMBERPROFILE)?;
    body.validate()?;
    let user_id = body
        .user_id
        .ok_or_else(|| MembersError::Validation("user_id is required".to_string()))?;
    let mut user = ensure_member(&state, user_id).await?;

    let mut tx = state.db.begin().await?;
    let progress = queries::insert_progress(&mut tx, user_id, &body, auth.id).await?;
    if apply_progress(&mut user, &progress.title, progress.date) {
        db::update_user(&mut tx, &user).await?;
        tracing::info!(user_id = %user_id, degree = user.degree, "Member degree record updated from progress");
    }
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(progress)))
}

pub async fn get_progress(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> MembersResult<Json<MemberProgress>> {
    queries::find_progress(&state.db, id)
        .await?
        .map(Json)
        .ok_or(MembersError::NotFound("Progress record"))
}

pub async fn update_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateProgressRequest>,
) -> MembersResult<Json<MemberProgress>> {
    auth.require_permission(LodgePermissions::CHANGE_MEMBERPROFILE)?;
    body.validate()?;
    let mut progress = queries::find_progress(&state.db, id)
        .await?
        .ok_or(MembersError::NotFound("Progress record"))?;

    body.apply(&mut progress);
    Ok(Json(queries::save_progress(&state.db, &progress).await?))
}

pub async fn delete_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> MembersResult<StatusCode> {
    auth.require_permission(LodgePermissions::CHANGE_MEMBERPROFILE)?;
    if !queries::delete_progress(&state.db, id).await? {
        return Err(MembersError::NotFound("Progress record"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Attendance
// ============================================================================

pub async fn list_attendance(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<AttendanceQuery>,
) -> MembersResult<Json<Page<Attendance>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_attendance(&state.db, &query, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

/// Record attendance. A present member's profile statistics move forward.
#[utoipa::path(
    post,
    path = "/api/members/attendance/",
    tag = "members",
    request_body = CreateAttendanceRequest,
    responses(
        (status = 201, description = "Attendance recorded", body = Attendance),
        (status = 404, description = "Unknown member or event"),
        (status = 409, description = "Already recorded for this member and event"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(actor = %auth.id))]
pub async fn create_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateAttendanceRequest>,
) -> MembersResult<(StatusCode, Json<Attendance>)> {
    auth.require_permission(LodgePermissions::CHANGE_MEMBERPROFILE)?;
    ensure_member(&state, body.user_id).await?;
    let event_date = queries::event_date(&state.db, body.event_id)
        .await?
        .ok_or(MembersError::NotFound("Event"))?;

    if queries::attendance_exists(&state.db, body.user_id, body.event_id).await? {
        return Err(MembersError::DuplicateAttendance);
    }

    let mut tx = state.db.begin().await?;
    let attendance = queries::insert_attendance(&mut tx, &body, auth.id).await?;
    if attendance.is_present {
        queries::record_presence(&mut tx, attendance.user_id, event_date).await?;
    }
    tx.commit().await?;

    tracing::info!(
        attendance_id = %attendance.id,
        user_id = %attendance.user_id,
        event_id = %attendance.event_id,
        present = attendance.is_present,
        "Attendance recorded"
    );
    Ok((StatusCode::CREATED, Json(attendance)))
}

pub async fn get_attendance(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> MembersResult<Json<Attendance>> {
    queries::find_attendance(&state.db, id)
        .await?
        .map(Json)
        .ok_or(MembersError::NotFound("Attendance"))
}

pub async fn update_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAttendanceRequest>,
) -> MembersResult<Json<Attendance>> {
    auth.require_permission(LodgePermissions::CHANGE_MEMBERPROFILE)?;
    let mut attendance = queries::find_attendance(&state.db, id)
        .await?
        .ok_or(MembersError::NotFound("Attendance"))?;

    body.apply(&mut attendance);
    Ok(Json(queries::save_attendance(&state.db, &attendance).await?))
}

pub async fn delete_attendance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> MembersResult<StatusCode> {
    auth.require_permission(LodgePermissions::CHANGE_MEMBERPROFILE)?;
    if !queries::delete_attendance(&state.db, id).await? {
        return Err(MembersError::NotFound("Attendance"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::LodgePermissions;

    fn auth(permissions: LodgePermissions) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            username: "hiram".into(),
            email: "hiram@example.org".into(),
            first_name: String::new(),
            last_name: String::new(),
            symbolic_name: String::new(),
            degree: 1,
            is_staff: false,
            is_superuser: false,
            two_factor_enabled: false,
            permissions,
            officer_role: None,
        }
    }

    #[test]
    fn test_self_may_edit_own_records() {
        let user = auth(LodgePermissions::BASIC);
        assert!(require_self_or_editor(&user, user.id).is_ok());
        assert!(require_self_or_editor(&user, Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_secretary_may_edit_any_member() {
        let user = auth(LodgePermissions::BASIC | LodgePermissions::SECRETARY);
        assert!(require_self_or_editor(&user, Uuid::new_v4()).is_ok());
    }
}
