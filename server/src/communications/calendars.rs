//! Calendar Handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use uuid::Uuid;
use validator::Validate;

use super::error::{CommunicationsError, CommunicationsResult};
use super::queries;
use super::types::{
    AddCalendarEventRequest, CalendarEntry, CalendarEvent, CalendarQuery, CalendarResponse,
    CreateCalendarRequest, UpdateCalendarRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::permissions::LodgePermissions;
use crate::util::{page_bounds, Page};

fn check_range(start: NaiveDate, end: NaiveDate) -> CommunicationsResult<()> {
    if end < start {
        return Err(CommunicationsError::Validation(
            "end_date must not be before start_date".to_string(),
        ));
    }
    Ok(())
}

pub async fn list_calendars(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<CalendarQuery>,
) -> CommunicationsResult<Json<Page<CalendarResponse>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_calendars(&state.db, &query, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

pub async fn get_calendar(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<Json<CalendarResponse>> {
    queries::find_calendar_response(&state.db, id)
        .await?
        .map(Json)
        .ok_or(CommunicationsError::NotFound("Calendar"))
}

#[utoipa::path(
    post,
    path = "/api/communications/calendars/",
    tag = "communications",
    request_body = CreateCalendarRequest,
    responses((status = 201, description = "Calendar created", body = CalendarResponse)),
    security(("bearer_auth" = []))
)]
pub async fn create_calendar(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateCalendarRequest>,
) -> CommunicationsResult<(StatusCode, Json<CalendarResponse>)> {
    auth.require_permission(LodgePermissions::ADD_EVENT)?;
    body.validate()?;
    check_range(body.start_date, body.end_date)?;

    let calendar = queries::insert_calendar(&state.db, &body, auth.id).await?;
    tracing::info!(calendar_id = %calendar.id, year = calendar.year, "Calendar created");
    Ok((
        StatusCode::CREATED,
        Json(CalendarResponse {
            calendar,
            events_count: 0,
        }),
    ))
}

pub async fn update_calendar(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateCalendarRequest>,
) -> CommunicationsResult<Json<CalendarResponse>> {
    auth.require_permission(LodgePermissions::CHANGE_EVENT)?;
    body.validate()?;
    let mut calendar = queries::find_calendar(&state.db, id)
        .await?
        .ok_or(CommunicationsError::NotFound("Calendar"))?;

    body.apply(&mut calendar);
    check_range(calendar.start_date, calendar.end_date)?;
    queries::save_calendar(&state.db, &calendar).await?;

    get_calendar(State(state), auth, Path(id)).await
}

pub async fn delete_calendar(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<StatusCode> {
    auth.require_permission(LodgePermissions::DELETE_EVENT)?;
    if !queries::delete_calendar(&state.db, id).await? {
        return Err(CommunicationsError::NotFound("Calendar"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/communications/calendars/{id}/add_event",
    tag = "communications",
    params(("id" = Uuid, Path, description = "Calendar ID")),
    request_body = AddCalendarEventRequest,
    responses(
        (status = 201, description = "Event placed on the calendar", body = CalendarEvent),
        (status = 409, description = "Event already on this calendar"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<AddCalendarEventRequest>,
) -> CommunicationsResult<(StatusCode, Json<CalendarEvent>)> {
    auth.require_permission(LodgePermissions::CHANGE_EVENT)?;
    queries::find_calendar(&state.db, id)
        .await?
        .ok_or(CommunicationsError::NotFound("Calendar"))?;
    queries::find_event(&state.db, body.event_id)
        .await?
        .ok_or(CommunicationsError::NotFound("Event"))?;

    if queries::calendar_has_event(&state.db, id, body.event_id).await? {
        return Err(CommunicationsError::DuplicateCalendarEvent);
    }

    let entry = queries::insert_calendar_event(&state.db, id, &body).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn calendar_events(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<Json<Vec<CalendarEntry>>> {
    queries::find_calendar(&state.db, id)
        .await?
        .ok_or(CommunicationsError::NotFound("Calendar"))?;
    let entries = queries::list_calendar_entries(&state.db, id, auth.degree_ceiling()).await?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calendar_range() {
        let jan = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let dec = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        assert!(check_range(jan, dec).is_ok());
        assert!(check_range(jan, jan).is_ok());
        assert!(check_range(dec, jan).is_err());
    }
}
