//! Message Handlers
//!
//! Internal mail between members. Senders own the message; recipients own
//! their read, archive and star flags.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::error::{CommunicationsError, CommunicationsResult};
use super::queries;
use super::types::{
    CreateMessageRequest, MailboxFlag, Message, MessageDetail, MessageQuery, MessageResponse,
    UpdateMessageRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::util::{page_bounds, Page};

async fn detail(state: &AppState, id: Uuid, caller: Uuid) -> CommunicationsResult<MessageDetail> {
    let message = queries::find_message_response(&state.db, id, caller)
        .await?
        .ok_or(CommunicationsError::NotFound("Message"))?;
    let recipients = queries::message_recipients(&state.db, id).await?;
    Ok(MessageDetail {
        message,
        recipients,
    })
}

async fn own_message(state: &AppState, auth: &AuthUser, id: Uuid) -> CommunicationsResult<Message> {
    let message = queries::find_message(&state.db, id)
        .await?
        .ok_or(CommunicationsError::NotFound("Message"))?;
    if message.sender_id != auth.id {
        return Err(CommunicationsError::NotSender);
    }
    Ok(message)
}

#[utoipa::path(
    get,
    path = "/api/communications/messages/",
    tag = "communications",
    params(MessageQuery),
    responses((status = 200, description = "Caller's mailbox", body = Page<MessageResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn list_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<MessageQuery>,
) -> CommunicationsResult<Json<Page<MessageResponse>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows = queries::list_messages(&state.db, &query, auth.id, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

/// Retrieve a message. Opening it as a recipient marks it read.
#[utoipa::path(
    get,
    path = "/api/communications/messages/{id}",
    tag = "communications",
    params(("id" = Uuid, Path, description = "Message ID")),
    responses(
        (status = 200, description = "Message with recipients", body = MessageDetail),
        (status = 404, description = "Not the sender or a recipient"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<Json<MessageDetail>> {
    let message = queries::find_message_response(&state.db, id, auth.id)
        .await?
        .filter(|m| m.message.sender_id == auth.id || m.read.is_some())
        .ok_or(CommunicationsError::NotFound("Message"))?;

    if message.read == Some(false) {
        queries::mark_message_read(&state.db, id, auth.id).await?;
    }

    Ok(Json(detail(&state, id, auth.id).await?))
}

#[utoipa::path(
    post,
    path = "/api/communications/messages/",
    tag = "communications",
    request_body = CreateMessageRequest,
    responses(
        (status = 201, description = "Message created", body = MessageDetail),
        (status = 400, description = "No recipients for a message being sent"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn create_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateMessageRequest>,
) -> CommunicationsResult<(StatusCode, Json<MessageDetail>)> {
    body.validate()?;
    if !body.is_draft && body.recipients.is_empty() {
        return Err(CommunicationsError::Validation(
            "At least one recipient is required".to_string(),
        ));
    }

    let mut tx = state.db.begin().await?;
    let message = queries::insert_message(&mut tx, &body, auth.id).await?;
    let delivered = queries::set_message_recipients(&mut tx, message.id, &body.recipients).await?;
    tx.commit().await?;

    tracing::info!(message_id = %message.id, delivered, draft = message.is_draft, "Message created");
    Ok((StatusCode::CREATED, Json(detail(&state, message.id, auth.id).await?)))
}

#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn update_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(mut body): Json<UpdateMessageRequest>,
) -> CommunicationsResult<Json<MessageDetail>> {
    body.validate()?;
    let mut message = own_message(&state, &auth, id).await?;
    let sending = body.apply(&mut message);

    if sending {
        let has_recipients = match &body.recipients {
            Some(list) => !list.is_empty(),
            None => !queries::message_recipients(&state.db, id).await?.is_empty(),
        };
        if !has_recipients {
            return Err(CommunicationsError::Validation(
                "At least one recipient is required".to_string(),
            ));
        }
    }

    let mut tx = state.db.begin().await?;
    queries::save_message(&mut tx, &message, sending).await?;
    if let Some(recipients) = &body.recipients {
        queries::set_message_recipients(&mut tx, id, recipients).await?;
    }
    tx.commit().await?;

    Ok(Json(detail(&state, id, auth.id).await?))
}

pub async fn delete_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<StatusCode> {
    own_message(&state, &auth, id).await?;
    queries::delete_message(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_flag(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
    flag: MailboxFlag,
    value: bool,
) -> CommunicationsResult<()> {
    queries::find_message(&state.db, id)
        .await?
        .ok_or(CommunicationsError::NotFound("Message"))?;
    if !queries::set_mailbox_flag(&state.db, id, auth.id, flag, value).await? {
        return Err(CommunicationsError::NotRecipient("message"));
    }
    Ok(())
}

pub async fn star(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<Json<Value>> {
    set_flag(&state, &auth, id, MailboxFlag::Starred, true).await?;
    Ok(Json(json!({ "detail": "Mensaje destacado." })))
}

pub async fn unstar(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<Json<Value>> {
    set_flag(&state, &auth, id, MailboxFlag::Starred, false).await?;
    Ok(Json(json!({ "detail": "Mensaje sin destacar." })))
}

pub async fn archive(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<Json<Value>> {
    set_flag(&state, &auth, id, MailboxFlag::Archived, true).await?;
    Ok(Json(json!({ "detail": "Mensaje archivado." })))
}

pub async fn unarchive(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> CommunicationsResult<Json<Value>> {
    set_flag(&state, &auth, id, MailboxFlag::Archived, false).await?;
    Ok(Json(json!({ "detail": "Mensaje desarchivado." })))
}
