//! Notification Handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::error::{CommunicationsError, CommunicationsResult};
use super::queries;
use super::types::{
    CreateNotificationRequest, NotificationQuery, NotificationResponse, UpdateNotificationRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::notify;
use crate::permissions::LodgePermissions;
use crate::util::{page_bounds, Page};

/// Staff see every notification; others only those delivered to them.
#[utoipa::path(
    get,
    path = "/api/communications/notifications/",
    tag = "communications",
    params(NotificationQuery),
    responses((status = 200, description = "Notifications", body = Page<NotificationResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<NotificationQuery>,
) -> CommunicationsResult<Json<Page<NotificationResponse>>> {
    let staff = auth.is_staff_or_superuser();
    let received = !staff || query.received.unwrap_or(false);
    let (limit, offset) = page_bounds(query.limit, query.offset);

    let rows =
        queries::list_notifications(&state.db, &query, auth.id, received, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

pub async fn get_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<Json<NotificationResponse>> {
    queries::find_notification_response(&state.db, id, auth.id)
        .await?
        .filter(|n| n.read.is_some() || auth.is_staff_or_superuser())
        .map(Json)
        .ok_or(CommunicationsError::NotFound("Notification"))
}

#[utoipa::path(
    post,
    path = "/api/communications/notifications/",
    tag = "communications",
    request_body = CreateNotificationRequest,
    responses(
        (status = 201, description = "Notification created and delivered", body = NotificationResponse),
        (status = 403, description = "Lacks add_notification"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn create_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateNotificationRequest>,
) -> CommunicationsResult<(StatusCode, Json<NotificationResponse>)> {
    auth.require_permission(LodgePermissions::ADD_NOTIFICATION)?;
    body.validate()?;
    if let Some(event_id) = body.event_id {
        queries::find_event(&state.db, event_id)
            .await?
            .ok_or(CommunicationsError::NotFound("Event"))?;
    }

    let mut tx = state.db.begin().await?;
    let notification = queries::insert_notification(&mut tx, &body, auth.id).await?;
    let delivered = notify::deliver(&mut tx, notification.id, &body.recipients).await?;
    tx.commit().await?;

    tracing::info!(notification_id = %notification.id, delivered, "Notification created");

    let response = queries::find_notification_response(&state.db, notification.id, auth.id)
        .await?
        .ok_or(CommunicationsError::NotFound("Notification"))?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn update_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateNotificationRequest>,
) -> CommunicationsResult<Json<NotificationResponse>> {
    auth.require_permission(LodgePermissions::CHANGE_NOTIFICATION)?;
    body.validate()?;
    let mut notification = queries::find_notification(&state.db, id)
        .await?
        .ok_or(CommunicationsError::NotFound("Notification"))?;

    body.apply(&mut notification);
    queries::save_notification(&state.db, &notification).await?;

    get_notification(State(state), auth, Path(id)).await
}

pub async fn delete_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<StatusCode> {
    auth.require_permission(LodgePermissions::DELETE_NOTIFICATION)?;
    if !queries::delete_notification(&state.db, id).await? {
        return Err(CommunicationsError::NotFound("Notification"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/communications/notifications/{id}/mark_as_read",
    tag = "communications",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Marked as read"),
        (status = 400, description = "Caller is not a recipient"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn mark_as_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<Json<Value>> {
    queries::find_notification(&state.db, id)
        .await?
        .ok_or(CommunicationsError::NotFound("Notification"))?;

    if !queries::mark_notification_read(&state.db, id, auth.id).await? {
        return Err(CommunicationsError::NotRecipient("notification"));
    }
    Ok(Json(json!({ "detail": "Notificación marcada como leída." })))
}
