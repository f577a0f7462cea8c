//! Ritual role handlers. Assigning a member to a role notifies them.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

use super::error::{RitualsError, RitualsResult};
use super::plans::visible_plan;
use super::queries;
use super::types::{
    AssignRoleRequest, CreateRoleRequest, RitualPlan, RitualRole, RoleQuery, RoleResponse,
    UpdateRoleRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::db;
use crate::notify::{self, Notice};
use crate::permissions::LodgePermissions;
use crate::util::{page_bounds, Page};

/// Assignee to notify after a save, if the assignment is new.
fn new_assignee(before: Option<Uuid>, after: Option<Uuid>) -> Option<Uuid> {
    after.filter(|user| before != Some(*user))
}

async fn notify_assignee(
    conn: &mut PgConnection,
    role: &RitualRole,
    plan: &RitualPlan,
    assignee: Uuid,
    actor: Uuid,
) -> sqlx::Result<()> {
    let notice = Notice::ritual_role_assigned(role.role_name(), &plan.title, plan.date)
        .for_event(plan.event_id)
        .by(Some(actor));
    notify::notify_users(conn, &notice, &[assignee]).await?;
    Ok(())
}

async fn ensure_user(state: &AppState, user_id: Option<Uuid>) -> RitualsResult<()> {
    if let Some(id) = user_id {
        db::find_user_by_id(&state.db, id)
            .await?
            .ok_or(RitualsError::NotFound("User"))?;
    }
    Ok(())
}

async fn role_response(state: &AppState, id: Uuid) -> RitualsResult<RoleResponse> {
    queries::find_role(&state.db, id)
        .await?
        .map(RoleResponse::from)
        .ok_or(RitualsError::NotFound("Ritual role"))
}

/// Load a role together with its (visible) plan.
async fn role_and_plan(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
) -> RitualsResult<(RitualRole, RitualPlan)> {
    let row = queries::find_role(&state.db, id)
        .await?
        .ok_or(RitualsError::NotFound("Ritual role"))?;
    let plan = visible_plan(state, auth, row.role.ritual_plan_id)
        .await
        .map_err(|_| RitualsError::NotFound("Ritual role"))?;
    Ok((row.role, plan))
}

/// Save `role` and notify a newly assigned member in one transaction.
async fn save_and_notify(
    state: &AppState,
    auth: &AuthUser,
    role: &RitualRole,
    plan: &RitualPlan,
    previous_assignee: Option<Uuid>,
) -> RitualsResult<()> {
    let mut tx = state.db.begin().await?;
    queries::save_role(&mut tx, role).await?;
    if let Some(assignee) = new_assignee(previous_assignee, role.assigned_to) {
        notify_assignee(&mut tx, role, plan, assignee, auth.id).await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Create a role in `plan`. Shared by `roles/` and `plans/{id}/add_role`.
pub async fn create_for_plan(
    state: &AppState,
    auth: &AuthUser,
    plan: &RitualPlan,
    body: CreateRoleRequest,
) -> RitualsResult<RoleResponse> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALPLAN)?;
    body.validate()?;
    ensure_user(state, body.assigned_to).await?;

    let mut tx = state.db.begin().await?;
    let role = queries::insert_role(&mut tx, plan.id, &body).await?;
    if let Some(assignee) = role.assigned_to {
        notify_assignee(&mut tx, &role, plan, assignee, auth.id).await?;
    }
    tx.commit().await?;

    role_response(state, role.id).await
}

pub async fn list_roles(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<RoleQuery>,
) -> RitualsResult<Json<Page<RoleResponse>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_roles(&state.db, &query, auth.degree_ceiling(), limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset).map(RoleResponse::from)))
}

pub async fn create_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateRoleRequest>,
) -> RitualsResult<(StatusCode, Json<RoleResponse>)> {
    let plan_id = body
        .ritual_plan_id
        .ok_or_else(|| RitualsError::Validation("ritual_plan_id is required".to_string()))?;
    let plan = visible_plan(&state, &auth, plan_id).await?;
    let role = create_for_plan(&state, &auth, &plan, body).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn get_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<Json<RoleResponse>> {
    role_and_plan(&state, &auth, id).await?;
    Ok(Json(role_response(&state, id).await?))
}

#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn update_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRoleRequest>,
) -> RitualsResult<Json<RoleResponse>> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALPLAN)?;
    body.validate()?;
    let (mut role, plan) = role_and_plan(&state, &auth, id).await?;

    let previous = role.assigned_to;
    body.apply(&mut role);
    ensure_user(&state, role.assigned_to).await?;
    save_and_notify(&state, &auth, &role, &plan, previous).await?;

    Ok(Json(role_response(&state, id).await?))
}

pub async fn delete_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<StatusCode> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALPLAN)?;
    if !queries::delete_role(&state.db, id).await? {
        return Err(RitualsError::NotFound("Ritual role"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/rituals/roles/{id}/assign",
    tag = "rituals",
    params(("id" = Uuid, Path, description = "Ritual role id")),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Member assigned and notified", body = RoleResponse),
        (status = 400, description = "user_id missing"),
        (status = 404, description = "Unknown role or user"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn assign(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignRoleRequest>,
) -> RitualsResult<Json<RoleResponse>> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALPLAN)?;
    let user_id = body
        .user_id
        .ok_or_else(|| RitualsError::Validation("user_id is required".to_string()))?;
    let (mut role, plan) = role_and_plan(&state, &auth, id).await?;
    ensure_user(&state, Some(user_id)).await?;

    let previous = role.assigned_to;
    role.assigned_to = Some(user_id);
    save_and_notify(&state, &auth, &role, &plan, previous).await?;

    tracing::info!(role_id = %id, %user_id, "Ritual role assigned");
    Ok(Json(role_response(&state, id).await?))
}

async fn set_confirmed(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
    confirmed: bool,
) -> RitualsResult<()> {
    let (mut role, _) = role_and_plan(state, auth, id).await?;
    // The assignee may confirm their own role.
    if role.assigned_to != Some(auth.id) {
        auth.require_permission(LodgePermissions::CHANGE_RITUALPLAN)?;
    }
    role.is_confirmed = confirmed;
    let mut conn = state.db.acquire().await?;
    queries::save_role(&mut conn, &role).await?;
    Ok(())
}

pub async fn confirm(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<Json<Value>> {
    set_confirmed(&state, &auth, id, true).await?;
    Ok(Json(json!({ "detail": "Rol confirmado" })))
}

pub async fn unconfirm(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<Json<Value>> {
    set_confirmed(&state, &auth, id, false).await?;
    Ok(Json(json!({ "detail": "Confirmación de rol retirada" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_new_assignments_notify() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(new_assignee(None, Some(a)), Some(a));
        assert_eq!(new_assignee(Some(a), Some(b)), Some(b));
        assert_eq!(new_assignee(Some(a), Some(a)), None);
        assert_eq!(new_assignee(Some(a), None), None);
    }
}
