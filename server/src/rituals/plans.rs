//! Ritual Plan Handlers
//!
//! A plan is scheduled through a lodge event. Creating a plan without one
//! opens a new event and announces it; every status change is broadcast to
//! the members who may attend.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::error::{RitualsError, RitualsResult};
use super::queries;
use super::types::{
    AttachmentQuery, CreateAttachmentRequest, CreatePlanRequest, CreateRoleRequest,
    CreateWorkRequest, PlanQuery, PlanResponse, PlanStatus, RitualAttachment, RitualPlan,
    RoleQuery, RoleResponse, UpdatePlanRequest, WorkQuery, WorkResponse,
};
use super::{attachments, roles, works};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::communications::{self, announce_event};
use crate::communications::types::{CreateEventRequest, EventType};
use crate::notify::{self, Notice};
use crate::permissions::LodgePermissions;
use crate::util::{page_bounds, Page};

/// Broadcast the plan's current status to members of its degree and above.
pub async fn announce_status(conn: &mut PgConnection, plan: &RitualPlan) -> sqlx::Result<()> {
    let notice = Notice::ritual_status_changed(&plan.title, plan.date, plan.status.name())
        .for_event(plan.event_id)
        .by(plan.notifier());
    notify::fan_out_by_degree(conn, &notice, plan.degree).await?;
    Ok(())
}

/// Event opened for a plan created without one.
fn plan_event(body: &CreatePlanRequest) -> CreateEventRequest {
    CreateEventRequest {
        title: format!("Trabajo Ritual: {}", body.title),
        description: body.description.clone(),
        date: body.date,
        start_time: body.start_time,
        end_time: body.end_time,
        location: String::new(),
        is_virtual: false,
        virtual_link: String::new(),
        event_type: EventType::Tenida,
        required_degree: body.degree,
    }
}

/// Load a plan the caller is allowed to see.
pub async fn visible_plan(state: &AppState, auth: &AuthUser, id: Uuid) -> RitualsResult<RitualPlan> {
    queries::find_plan(&state.db, id)
        .await?
        .filter(|p| auth.can_see_degree(p.degree))
        .ok_or(RitualsError::NotFound("Ritual plan"))
}

async fn plan_response(state: &AppState, id: Uuid) -> RitualsResult<PlanResponse> {
    queries::find_plan_response(&state.db, id)
        .await?
        .ok_or(RitualsError::NotFound("Ritual plan"))
}

#[utoipa::path(
    get,
    path = "/api/rituals/plans/",
    tag = "rituals",
    params(PlanQuery),
    responses((status = 200, description = "Ritual plans visible to the caller", body = Page<PlanResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn list_plans(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PlanQuery>,
) -> RitualsResult<Json<Page<PlanResponse>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_plans(&state.db, &query, auth.degree_ceiling(), limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

#[utoipa::path(
    post,
    path = "/api/rituals/plans/",
    tag = "rituals",
    request_body = CreatePlanRequest,
    responses(
        (status = 201, description = "Plan created; a new event is announced when none is given", body = PlanResponse),
        (status = 403, description = "Lacks add_ritualplan"),
        (status = 404, description = "Unknown event"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn create_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreatePlanRequest>,
) -> RitualsResult<(StatusCode, Json<PlanResponse>)> {
    auth.require_permission(LodgePermissions::ADD_RITUALPLAN)?;
    body.validate()?;
    communications::types::check_event_times(body.start_time, body.end_time)
        .map_err(RitualsError::Validation)?;

    if let Some(event_id) = body.event_id {
        communications::queries::find_event(&state.db, event_id)
            .await?
            .ok_or(RitualsError::NotFound("Event"))?;
    }

    let mut tx = state.db.begin().await?;
    let event_id = match body.event_id {
        Some(id) => id,
        None => {
            let event =
                communications::queries::insert_event(&mut tx, &plan_event(&body), auth.id).await?;
            let audience = announce_event(&mut tx, &event).await?;
            info!(event_id = %event.id, audience, "Ritual event announced");
            event.id
        }
    };
    let plan = queries::insert_plan(&mut tx, &body, Some(event_id), auth.id).await?;
    tx.commit().await?;

    info!(plan_id = %plan.id, title = %plan.title, "Ritual plan created");
    Ok((StatusCode::CREATED, Json(plan_response(&state, plan.id).await?)))
}

pub async fn get_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<Json<PlanResponse>> {
    let plan = visible_plan(&state, &auth, id).await?;
    Ok(Json(plan_response(&state, plan.id).await?))
}

#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn update_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePlanRequest>,
) -> RitualsResult<Json<PlanResponse>> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALPLAN)?;
    body.validate()?;
    let mut plan = visible_plan(&state, &auth, id).await?;

    let previous = plan.status;
    body.apply(&mut plan);
    communications::types::check_event_times(plan.start_time, plan.end_time)
        .map_err(RitualsError::Validation)?;

    let mut tx = state.db.begin().await?;
    queries::save_plan(&mut tx, &plan).await?;
    if plan.status != previous {
        announce_status(&mut tx, &plan).await?;
    }
    tx.commit().await?;

    Ok(Json(plan_response(&state, id).await?))
}

pub async fn delete_plan(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<StatusCode> {
    auth.require_permission(LodgePermissions::DELETE_RITUALPLAN)?;
    visible_plan(&state, &auth, id).await?;
    if !queries::delete_plan(&state.db, id).await? {
        return Err(RitualsError::NotFound("Ritual plan"));
    }
    info!(plan_id = %id, user_id = %auth.id, "Ritual plan deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Workflow
// ============================================================================

async fn change_status(
    state: &AppState,
    mut plan: RitualPlan,
    status: PlanStatus,
) -> RitualsResult<()> {
    plan.status = status;
    let mut tx = state.db.begin().await?;
    queries::save_plan(&mut tx, &plan).await?;
    announce_status(&mut tx, &plan).await?;
    tx.commit().await?;

    info!(plan_id = %plan.id, status = ?status, "Ritual plan status changed");
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/rituals/plans/{id}/approve",
    tag = "rituals",
    params(("id" = Uuid, Path, description = "Ritual plan id")),
    responses(
        (status = 200, description = "Plan approved"),
        (status = 400, description = "Plan is not a draft"),
        (status = 403, description = "Lacks approve_ritualplan"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn approve(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<Json<Value>> {
    auth.require_permission(LodgePermissions::APPROVE_RITUALPLAN)?;
    let mut plan = visible_plan(&state, &auth, id).await?;
    if plan.status != PlanStatus::Draft {
        return Err(RitualsError::InvalidState("Only draft plans can be approved"));
    }

    plan.approved_by = Some(auth.id);
    change_status(&state, plan, PlanStatus::Approved).await?;
    Ok(Json(json!({ "detail": "Plan ritual aprobado" })))
}

pub async fn mark_as_completed(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<Json<Value>> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALPLAN)?;
    let plan = visible_plan(&state, &auth, id).await?;
    if plan.status == PlanStatus::Completed {
        return Err(RitualsError::InvalidState("Plan is already completed"));
    }

    change_status(&state, plan, PlanStatus::Completed).await?;
    Ok(Json(json!({ "detail": "Plan ritual marcado como completado" })))
}

pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<Json<Value>> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALPLAN)?;
    let plan = visible_plan(&state, &auth, id).await?;
    if plan.status == PlanStatus::Cancelled {
        return Err(RitualsError::InvalidState("Plan is already cancelled"));
    }

    change_status(&state, plan, PlanStatus::Cancelled).await?;
    Ok(Json(json!({ "detail": "Plan ritual cancelado" })))
}

// ============================================================================
// Nested resources
// ============================================================================

pub async fn plan_roles(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<Json<Page<RoleResponse>>> {
    visible_plan(&state, &auth, id).await?;
    let query = RoleQuery {
        ritual_plan_id: Some(id),
        ..Default::default()
    };
    let (limit, offset) = page_bounds(None, None);
    let rows = queries::list_roles(&state.db, &query, None, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset).map(RoleResponse::from)))
}

pub async fn add_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateRoleRequest>,
) -> RitualsResult<(StatusCode, Json<RoleResponse>)> {
    let plan = visible_plan(&state, &auth, id).await?;
    let role = roles::create_for_plan(&state, &auth, &plan, body).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn plan_works(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<Json<Page<WorkResponse>>> {
    visible_plan(&state, &auth, id).await?;
    let query = WorkQuery {
        ritual_plan_id: Some(id),
        ..Default::default()
    };
    let (limit, offset) = page_bounds(None, None);
    let rows = queries::list_works(&state.db, &query, None, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

pub async fn add_work(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateWorkRequest>,
) -> RitualsResult<(StatusCode, Json<WorkResponse>)> {
    let plan = visible_plan(&state, &auth, id).await?;
    let work = works::create_for_plan(&state, &auth, &plan, body).await?;
    Ok((StatusCode::CREATED, Json(work)))
}

pub async fn plan_attachments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<Json<Page<RitualAttachment>>> {
    visible_plan(&state, &auth, id).await?;
    let query = AttachmentQuery {
        ritual_plan_id: Some(id),
        ..Default::default()
    };
    let (limit, offset) = page_bounds(None, None);
    let rows = queries::list_attachments(&state.db, &query, None, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

pub async fn add_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateAttachmentRequest>,
) -> RitualsResult<(StatusCode, Json<RitualAttachment>)> {
    let plan = visible_plan(&state, &auth, id).await?;
    let attachment = attachments::create_for_plan(&state, &auth, &plan, body).await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::rituals::types::RitualType;

    #[test]
    fn test_plan_event_mirrors_plan() {
        let body = CreatePlanRequest {
            title: "Iniciación de marzo".into(),
            description: "Ceremonia de iniciación".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, 21).unwrap(),
            start_time: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            end_time: None,
            ritual_type: RitualType::Initiation,
            degree: 2,
            event_id: None,
        };
        let event = plan_event(&body);
        assert_eq!(event.title, "Trabajo Ritual: Iniciación de marzo");
        assert_eq!(event.event_type, EventType::Tenida);
        assert_eq!(event.required_degree, 2);
        assert_eq!(event.description, body.description);
        assert_eq!(event.date, body.date);
    }
}
