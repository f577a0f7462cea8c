//! Ritual work handlers.
//!
//! Works are the lectures and ceremonies scheduled inside a plan. The member
//! responsible for a work hears about every status change.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

use super::error::{RitualsError, RitualsResult};
use super::plans::visible_plan;
use super::queries;
use super::types::{
    CreateWorkRequest, RitualPlan, RitualWork, UpdateWorkRequest, WorkQuery, WorkResponse,
    WorkStatus, WorkStatusRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::notify::{self, Notice};
use crate::permissions::LodgePermissions;
use crate::util::{page_bounds, Page};

async fn notify_responsible(
    conn: &mut PgConnection,
    work: &RitualWork,
    plan: &RitualPlan,
    actor: Uuid,
) -> sqlx::Result<()> {
    let Some(responsible) = work.responsible_id else {
        return Ok(());
    };
    let notice = Notice::ritual_work_status(&work.title, &plan.title, work.status.name())
        .for_event(plan.event_id)
        .by(Some(actor));
    notify::notify_users(conn, &notice, &[responsible]).await?;
    Ok(())
}

async fn work_response(state: &AppState, id: Uuid) -> RitualsResult<WorkResponse> {
    queries::find_work_response(&state.db, id)
        .await?
        .ok_or(RitualsError::NotFound("Ritual work"))
}

async fn work_and_plan(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
) -> RitualsResult<(RitualWork, RitualPlan)> {
    let work = queries::find_work(&state.db, id)
        .await?
        .ok_or(RitualsError::NotFound("Ritual work"))?;
    let plan = visible_plan(state, auth, work.ritual_plan_id)
        .await
        .map_err(|_| RitualsError::NotFound("Ritual work"))?;
    Ok((work, plan))
}

/// Create a work in `plan`. Shared by `works/` and `plans/{id}/add_work`.
pub async fn create_for_plan(
    state: &AppState,
    auth: &AuthUser,
    plan: &RitualPlan,
    body: CreateWorkRequest,
) -> RitualsResult<WorkResponse> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALPLAN)?;
    body.validate()?;

    let work = queries::insert_work(&mut *state.db.acquire().await?, plan.id, &body).await?;
    tracing::info!(work_id = %work.id, plan_id = %plan.id, "Ritual work added");

    work_response(state, work.id).await
}

pub async fn list_works(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<WorkQuery>,
) -> RitualsResult<Json<Page<WorkResponse>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_works(&state.db, &query, auth.degree_ceiling(), limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

pub async fn create_work(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateWorkRequest>,
) -> RitualsResult<(StatusCode, Json<WorkResponse>)> {
    let plan_id = body
        .ritual_plan_id
        .ok_or_else(|| RitualsError::Validation("ritual_plan_id is required".to_string()))?;
    let plan = visible_plan(&state, &auth, plan_id).await?;
    let work = create_for_plan(&state, &auth, &plan, body).await?;
    Ok((StatusCode::CREATED, Json(work)))
}

pub async fn get_work(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<Json<WorkResponse>> {
    work_and_plan(&state, &auth, id).await?;
    Ok(Json(work_response(&state, id).await?))
}

#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn update_work(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateWorkRequest>,
) -> RitualsResult<Json<WorkResponse>> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALPLAN)?;
    body.validate()?;
    let (mut work, plan) = work_and_plan(&state, &auth, id).await?;

    let previous = work.status;
    body.apply(&mut work);

    let mut tx = state.db.begin().await?;
    queries::save_work(&mut tx, &work).await?;
    if work.status != previous {
        notify_responsible(&mut tx, &work, &plan, auth.id).await?;
    }
    tx.commit().await?;

    Ok(Json(work_response(&state, id).await?))
}

pub async fn delete_work(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<StatusCode> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALPLAN)?;
    if !queries::delete_work(&state.db, id).await? {
        return Err(RitualsError::NotFound("Ritual work"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/rituals/works/{id}/update_status",
    tag = "rituals",
    params(("id" = Uuid, Path, description = "Ritual work id")),
    request_body = WorkStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = WorkResponse),
        (status = 400, description = "Missing or unknown status"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<WorkStatusRequest>,
) -> RitualsResult<Json<WorkResponse>> {
    let (mut work, plan) = work_and_plan(&state, &auth, id).await?;
    // The responsible member may report progress on their own work.
    if work.responsible_id != Some(auth.id) {
        auth.require_permission(LodgePermissions::CHANGE_RITUALPLAN)?;
    }
    let raw = body.status.as_deref().unwrap_or_default();
    let status = WorkStatus::parse(raw)
        .ok_or_else(|| RitualsError::Validation(format!("invalid work status: '{raw}'")))?;

    if status != work.status {
        work.status = status;
        let mut tx = state.db.begin().await?;
        queries::set_work_status(&mut tx, id, status).await?;
        notify_responsible(&mut tx, &work, &plan, auth.id).await?;
        tx.commit().await?;
    }

    Ok(Json(work_response(&state, id).await?))
}
