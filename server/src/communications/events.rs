//! Event Handlers
//!
//! Lodge events with degree-gated visibility. Creating an event opens an
//! attendance sheet for every eligible member and announces it to them.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::error::{CommunicationsError, CommunicationsResult};
use super::queries;
use super::types::{
    check_event_times, Attendee, CreateEventRequest, Event, EventQuery, EventResponse, EventStatus,
    UpdateEventRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::notify::{self, Notice};
use crate::permissions::LodgePermissions;
use crate::util::{page_bounds, Page};

/// Open attendance for every active member who may attend and announce the
/// event to them. Returns the audience size.
pub async fn announce_event(conn: &mut PgConnection, event: &Event) -> sqlx::Result<usize> {
    let audience = notify::eligible_users(conn, event.required_degree).await?;
    queries::create_event_attendance(conn, event.id, &audience, event.created_by).await?;

    let notice = Notice::event_created(event.id, &event.title, event.date, &event.description)
        .by(event.created_by);
    notify::notify_users(conn, &notice, &audience).await?;

    Ok(audience.len())
}

async fn visible_event(state: &AppState, auth: &AuthUser, id: Uuid) -> CommunicationsResult<Event> {
    queries::find_event(&state.db, id)
        .await?
        .filter(|e| auth.can_see_degree(e.required_degree))
        .ok_or(CommunicationsError::NotFound("Event"))
}

#[utoipa::path(
    get,
    path = "/api/communications/events/",
    tag = "communications",
    params(EventQuery),
    responses((status = 200, description = "Events visible to the caller", body = Page<EventResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn list_events(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<EventQuery>,
) -> CommunicationsResult<Json<Page<EventResponse>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_events(&state.db, &query, auth.degree_ceiling(), limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

#[utoipa::path(
    post,
    path = "/api/communications/events/",
    tag = "communications",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created and announced", body = EventResponse),
        (status = 403, description = "Lacks add_event"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn create_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateEventRequest>,
) -> CommunicationsResult<(StatusCode, Json<EventResponse>)> {
    auth.require_permission(LodgePermissions::ADD_EVENT)?;
    body.validate()?;
    check_event_times(body.start_time, body.end_time).map_err(CommunicationsError::Validation)?;

    let mut tx = state.db.begin().await?;
    let event = queries::insert_event(&mut tx, &body, auth.id).await?;
    let audience = announce_event(&mut tx, &event).await?;
    tx.commit().await?;

    info!(event_id = %event.id, audience, "Event created");
    Ok((
        StatusCode::CREATED,
        Json(EventResponse {
            event,
            attendance_count: 0,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/communications/events/{id}",
    tag = "communications",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event", body = EventResponse),
        (status = 404, description = "Unknown or above the caller's degree"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<Json<EventResponse>> {
    queries::find_event_response(&state.db, id)
        .await?
        .filter(|e| auth.can_see_degree(e.event.required_degree))
        .map(Json)
        .ok_or(CommunicationsError::NotFound("Event"))
}

#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn update_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateEventRequest>,
) -> CommunicationsResult<Json<EventResponse>> {
    auth.require_permission(LodgePermissions::CHANGE_EVENT)?;
    body.validate()?;
    let mut event = visible_event(&state, &auth, id).await?;

    body.apply(&mut event);
    check_event_times(event.start_time, event.end_time).map_err(CommunicationsError::Validation)?;

    let mut conn = state.db.acquire().await?;
    queries::save_event(&mut conn, &event).await?;
    drop(conn);

    get_event(State(state), auth, Path(id)).await
}

pub async fn delete_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<StatusCode> {
    auth.require_permission(LodgePermissions::DELETE_EVENT)?;
    visible_event(&state, &auth, id).await?;
    queries::delete_event(&state.db, id).await?;
    info!(event_id = %id, user_id = %auth.id, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn transition(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
    target: EventStatus,
) -> CommunicationsResult<()> {
    auth.require_permission(LodgePermissions::CHANGE_EVENT)?;
    let event = visible_event(state, auth, id).await?;
    if event.status == target {
        return Err(CommunicationsError::InvalidState(match target {
            EventStatus::Completed => "Event is already completed",
            EventStatus::Cancelled => "Event is already cancelled",
            EventStatus::Scheduled => "Event is already scheduled",
        }));
    }
    queries::set_event_status(&state.db, id, target).await?;
    info!(event_id = %id, status = ?target, user_id = %auth.id, "Event status changed");
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/communications/events/{id}/mark_as_completed",
    tag = "communications",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event completed"),
        (status = 400, description = "Already completed"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_as_completed(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<Json<Value>> {
    transition(&state, &auth, id, EventStatus::Completed).await?;
    Ok(Json(json!({ "detail": "Evento marcado como completado." })))
}

#[utoipa::path(
    post,
    path = "/api/communications/events/{id}/cancel",
    tag = "communications",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event cancelled"),
        (status = 400, description = "Already cancelled"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<Json<Value>> {
    transition(&state, &auth, id, EventStatus::Cancelled).await?;
    Ok(Json(json!({ "detail": "Evento cancelado." })))
}

#[utoipa::path(
    get,
    path = "/api/communications/events/{id}/attendees",
    tag = "communications",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses((status = 200, description = "Attendance sheet", body = Vec<Attendee>)),
    security(("bearer_auth" = []))
)]
pub async fn attendees(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<Json<Vec<Attendee>>> {
    visible_event(&state, &auth, id).await?;
    let rows = queries::list_attendees(&state.db, id).await?;
    Ok(Json(rows.into_iter().map(Attendee::from).collect()))
}
