//! Ritual minutes handlers.
//!
//! Minutes move draft -> finalized -> approved. Approving them completes the
//! plan they record.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::error::{RitualsError, RitualsResult};
use super::plans::{announce_status, visible_plan};
use super::queries;
use super::types::{
    CreateMinutesRequest, MinutesQuery, MinutesStatus, PlanStatus, RitualMinutes, RitualPlan,
    UpdateMinutesRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::permissions::LodgePermissions;
use crate::util::{page_bounds, Page};

async fn minutes_and_plan(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
) -> RitualsResult<(RitualMinutes, RitualPlan)> {
    let minutes = queries::find_minutes(&state.db, id)
        .await?
        .ok_or(RitualsError::NotFound("Ritual minutes"))?;
    let plan = visible_plan(state, auth, minutes.ritual_plan_id)
        .await
        .map_err(|_| RitualsError::NotFound("Ritual minutes"))?;
    Ok((minutes, plan))
}

pub async fn list_minutes(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<MinutesQuery>,
) -> RitualsResult<Json<Page<RitualMinutes>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows =
        queries::list_minutes(&state.db, &query, auth.degree_ceiling(), limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

#[utoipa::path(
    post,
    path = "/api/rituals/minutes/",
    tag = "rituals",
    request_body = CreateMinutesRequest,
    responses(
        (status = 201, description = "Minutes drafted", body = RitualMinutes),
        (status = 403, description = "Lacks add_ritualminutes"),
        (status = 409, description = "The plan already has minutes"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_minutes(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateMinutesRequest>,
) -> RitualsResult<(StatusCode, Json<RitualMinutes>)> {
    auth.require_permission(LodgePermissions::ADD_RITUALMINUTES)?;
    body.validate()?;
    visible_plan(&state, &auth, body.ritual_plan_id).await?;
    if queries::minutes_exist(&state.db, body.ritual_plan_id).await? {
        return Err(RitualsError::DuplicateMinutes);
    }

    let minutes = queries::insert_minutes(&state.db, &body, auth.id).await?;
    Ok((StatusCode::CREATED, Json(minutes)))
}

pub async fn get_minutes(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<Json<RitualMinutes>> {
    let (minutes, _) = minutes_and_plan(&state, &auth, id).await?;
    Ok(Json(minutes))
}

pub async fn update_minutes(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateMinutesRequest>,
) -> RitualsResult<Json<RitualMinutes>> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALMINUTES)?;
    body.validate()?;
    let (mut minutes, _) = minutes_and_plan(&state, &auth, id).await?;
    if minutes.status == MinutesStatus::Approved {
        return Err(RitualsError::InvalidState("Approved minutes cannot be edited"));
    }

    body.apply(&mut minutes);
    queries::save_minutes(&mut *state.db.acquire().await?, &minutes).await?;
    get_minutes(State(state), auth, Path(id)).await
}

pub async fn delete_minutes(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<StatusCode> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALMINUTES)?;
    if !queries::delete_minutes(&state.db, id).await? {
        return Err(RitualsError::NotFound("Ritual minutes"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn finalize(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<Json<Value>> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALMINUTES)?;
    let (minutes, _) = minutes_and_plan(&state, &auth, id).await?;
    if minutes.status != MinutesStatus::Draft {
        return Err(RitualsError::InvalidState("Only draft minutes can be finalized"));
    }

    queries::set_minutes_status(&mut *state.db.acquire().await?, id, MinutesStatus::Finalized, None)
        .await?;
    Ok(Json(json!({ "detail": "Acta finalizada" })))
}

#[utoipa::path(
    post,
    path = "/api/rituals/minutes/{id}/approve",
    tag = "rituals",
    params(("id" = Uuid, Path, description = "Ritual minutes id")),
    responses(
        (status = 200, description = "Minutes approved and plan completed"),
        (status = 400, description = "Minutes are not finalized"),
        (status = 403, description = "Lacks approve_ritualplan"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state), fields(user_id = %auth.id))]
pub async fn approve(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<Json<Value>> {
    auth.require_permission(LodgePermissions::APPROVE_RITUALPLAN)?;
    let (minutes, mut plan) = minutes_and_plan(&state, &auth, id).await?;
    if minutes.status != MinutesStatus::Finalized {
        return Err(RitualsError::InvalidState("Only finalized minutes can be approved"));
    }

    let mut tx = state.db.begin().await?;
    queries::set_minutes_status(&mut tx, id, MinutesStatus::Approved, Some(auth.id)).await?;
    if plan.status != PlanStatus::Completed {
        plan.status = PlanStatus::Completed;
        queries::save_plan(&mut tx, &plan).await?;
        announce_status(&mut tx, &plan).await?;
    }
    tx.commit().await?;

    tracing::info!(minutes_id = %id, plan_id = %plan.id, "Ritual minutes approved");
    Ok(Json(json!({ "detail": "Acta aprobada" })))
}
