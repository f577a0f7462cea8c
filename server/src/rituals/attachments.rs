//! Ritual attachment handlers. New attachments are announced to every
//! member holding a role in the plan.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use super::error::{RitualsError, RitualsResult};
use super::plans::visible_plan;
use super::queries;
use super::types::{
    AttachmentQuery, CreateAttachmentRequest, RitualAttachment, RitualPlan,
    UpdateAttachmentRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::notify::{self, Notice};
use crate::permissions::LodgePermissions;
use crate::util::{page_bounds, Page};

fn audience(role_holders: Vec<Uuid>, uploader: Uuid) -> Vec<Uuid> {
    role_holders.into_iter().filter(|id| *id != uploader).collect()
}

/// Create an attachment in `plan`. Shared by `attachments/` and
/// `plans/{id}/add_attachment`.
pub async fn create_for_plan(
    state: &AppState,
    auth: &AuthUser,
    plan: &RitualPlan,
    body: CreateAttachmentRequest,
) -> RitualsResult<RitualAttachment> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALPLAN)?;
    body.validate()?;

    let mut tx = state.db.begin().await?;
    let attachment = queries::insert_attachment(&mut tx, plan.id, &body, auth.id).await?;
    let recipients = audience(queries::plan_role_holders(&mut tx, plan.id).await?, auth.id);
    if !recipients.is_empty() {
        let notice = Notice::ritual_attachment(&attachment.title, &plan.title)
            .for_event(plan.event_id)
            .by(Some(auth.id));
        notify::notify_users(&mut tx, &notice, &recipients).await?;
    }
    tx.commit().await?;

    tracing::info!(
        attachment_id = %attachment.id,
        plan_id = %plan.id,
        notified = recipients.len(),
        "Ritual attachment uploaded"
    );
    Ok(attachment)
}

async fn visible_attachment(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
) -> RitualsResult<RitualAttachment> {
    let attachment = queries::find_attachment(&state.db, id)
        .await?
        .ok_or(RitualsError::NotFound("Ritual attachment"))?;
    visible_plan(state, auth, attachment.ritual_plan_id)
        .await
        .map_err(|_| RitualsError::NotFound("Ritual attachment"))?;
    Ok(attachment)
}

pub async fn list_attachments(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<AttachmentQuery>,
) -> RitualsResult<Json<Page<RitualAttachment>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows =
        queries::list_attachments(&state.db, &query, auth.degree_ceiling(), limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

pub async fn create_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateAttachmentRequest>,
) -> RitualsResult<(StatusCode, Json<RitualAttachment>)> {
    let plan_id = body
        .ritual_plan_id
        .ok_or_else(|| RitualsError::Validation("ritual_plan_id is required".to_string()))?;
    let plan = visible_plan(&state, &auth, plan_id).await?;
    let attachment = create_for_plan(&state, &auth, &plan, body).await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

pub async fn get_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<Json<RitualAttachment>> {
    Ok(Json(visible_attachment(&state, &auth, id).await?))
}

pub async fn update_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAttachmentRequest>,
) -> RitualsResult<Json<RitualAttachment>> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALPLAN)?;
    body.validate()?;
    let mut attachment = visible_attachment(&state, &auth, id).await?;

    body.apply(&mut attachment);
    queries::save_attachment(&state.db, &attachment).await?;
    Ok(Json(attachment))
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> RitualsResult<StatusCode> {
    auth.require_permission(LodgePermissions::CHANGE_RITUALPLAN)?;
    if !queries::delete_attachment(&state.db, id).await? {
        return Err(RitualsError::NotFound("Ritual attachment"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uploader_is_not_notified() {
        let uploader = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert_eq!(audience(vec![uploader, other], uploader), vec![other]);
        assert!(audience(vec![uploader], uploader).is_empty());
    }
}
