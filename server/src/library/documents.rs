//! Document Handlers
//!
//! Documents above the caller's degree behave as if they did not exist.
//! Viewing and downloading are logged; new uploads are announced to every
//! member who can read them.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use super::access::log_access;
use super::error::{LibraryError, LibraryResult};
use super::feedback;
use super::queries;
use super::types::{
    AccessType, CommentRequest, CreateDocumentRequest, Document, DocumentComment, DocumentQuery,
    DocumentRating, DocumentResponse, DownloadResponse, FeedbackQuery, RateRequest,
    UpdateDocumentRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::notify::{self, Notice};
use crate::permissions::LodgePermissions;
use crate::util::{page_bounds, ClientInfo, Page};

/// Load a document the caller is allowed to see.
pub async fn visible_document(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
) -> LibraryResult<Document> {
    queries::find_document(&state.db, id)
        .await?
        .filter(|d| auth.can_see_degree(d.required_degree))
        .ok_or(LibraryError::NotFound("Document"))
}

async fn document_response(state: &AppState, id: Uuid) -> LibraryResult<DocumentResponse> {
    queries::find_document_response(&state.db, id)
        .await?
        .ok_or(LibraryError::NotFound("Document"))
}

#[utoipa::path(
    get,
    path = "/api/library/documents/",
    tag = "library",
    params(DocumentQuery),
    responses((status = 200, description = "Documents visible to the caller", body = Page<DocumentResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn list_documents(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<DocumentQuery>,
) -> LibraryResult<Json<Page<DocumentResponse>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows =
        queries::list_documents(&state.db, &query, auth.degree_ceiling(), limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

#[utoipa::path(
    post,
    path = "/api/library/documents/",
    tag = "library",
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "Document uploaded", body = DocumentResponse),
        (status = 403, description = "Missing add_document"),
        (status = 404, description = "Unknown category"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn create_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateDocumentRequest>,
) -> LibraryResult<(StatusCode, Json<DocumentResponse>)> {
    auth.require_permission(LodgePermissions::ADD_DOCUMENT)?;
    body.validate()?;

    let category = match body.category_id {
        Some(id) => Some(
            queries::find_category(&state.db, id)
                .await?
                .ok_or(LibraryError::NotFound("Category"))?,
        ),
        None => None,
    };

    let mut tx = state.db.begin().await?;
    let document = queries::insert_document(&mut tx, &body, auth.id).await?;
    let notice = Notice::document_created(
        &document.title,
        category.as_ref().map(|c| c.name.as_str()),
        &document.description,
    )
    .by(Some(auth.id));
    notify::fan_out_by_degree(&mut tx, &notice, document.required_degree).await?;
    tx.commit().await?;

    tracing::info!(document_id = %document.id, title = %document.title, "Document uploaded");
    let response = document_response(&state, document.id).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Fetch a document. Counts as a view.
pub async fn get_document(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> LibraryResult<Json<DocumentResponse>> {
    let document = visible_document(&state, &auth, id).await?;

    let mut tx = state.db.begin().await?;
    log_access(
        &mut tx,
        state.config.download_alert_threshold,
        &document,
        &auth,
        AccessType::View,
        &client,
    )
    .await?;
    tx.commit().await?;

    Ok(Json(document_response(&state, id).await?))
}

#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn update_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateDocumentRequest>,
) -> LibraryResult<Json<DocumentResponse>> {
    auth.require_permission(LodgePermissions::CHANGE_DOCUMENT)?;
    body.validate()?;
    let mut document = visible_document(&state, &auth, id).await?;

    body.apply(&mut document);
    if let Some(category_id) = document.category_id {
        queries::find_category(&state.db, category_id)
            .await?
            .ok_or(LibraryError::NotFound("Category"))?;
    }
    queries::save_document(&state.db, &document).await?;

    Ok(Json(document_response(&state, id).await?))
}

pub async fn delete_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> LibraryResult<StatusCode> {
    auth.require_permission(LodgePermissions::CHANGE_DOCUMENT)?;
    visible_document(&state, &auth, id).await?;
    if !queries::delete_document(&state.db, id).await? {
        return Err(LibraryError::NotFound("Document"));
    }
    tracing::info!(document_id = %id, user_id = %auth.id, "Document deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/library/documents/{id}/download",
    tag = "library",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "Download registered", body = DownloadResponse),
        (status = 404, description = "Unknown or above the caller's degree"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn download(
    State(state): State<AppState>,
    auth: AuthUser,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> LibraryResult<Json<DownloadResponse>> {
    let document = visible_document(&state, &auth, id).await?;

    let mut tx = state.db.begin().await?;
    log_access(
        &mut tx,
        state.config.download_alert_threshold,
        &document,
        &auth,
        AccessType::Download,
        &client,
    )
    .await?;
    tx.commit().await?;

    Ok(Json(DownloadResponse {
        status: "download registered",
        download_url: document.file,
    }))
}

pub async fn add_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<CommentRequest>,
) -> LibraryResult<(StatusCode, Json<DocumentComment>)> {
    body.validate()?;
    let document = visible_document(&state, &auth, id).await?;
    let comment = feedback::comment_on(&state, &auth, &document, &body.content).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Rate a document 1-5. Rating again replaces the previous value.
pub async fn rate(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<RateRequest>,
) -> LibraryResult<Json<DocumentRating>> {
    let stars = body.stars().ok_or(LibraryError::InvalidRating)?;
    let document = visible_document(&state, &auth, id).await?;
    let rating = feedback::rate(&state, &auth, &document, stars).await?;
    Ok(Json(rating))
}

pub async fn document_comments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> LibraryResult<Json<Page<DocumentComment>>> {
    visible_document(&state, &auth, id).await?;
    let query = FeedbackQuery {
        document_id: Some(id),
        ..Default::default()
    };
    let (limit, offset) = page_bounds(None, None);
    let rows = queries::list_comments(&state.db, &query, None, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

pub async fn document_ratings(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> LibraryResult<Json<Page<DocumentRating>>> {
    visible_document(&state, &auth, id).await?;
    let query = FeedbackQuery {
        document_id: Some(id),
        ..Default::default()
    };
    let (limit, offset) = page_bounds(None, None);
    let rows = queries::list_ratings(&state.db, &query, None, limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

pub async fn toggle_featured(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> LibraryResult<Json<serde_json::Value>> {
    auth.require_permission(LodgePermissions::CHANGE_DOCUMENT)?;
    let document = visible_document(&state, &auth, id).await?;

    queries::toggle_featured(&state.db, id).await?;
    let detail = if document.is_featured {
        "Documento quitado de destacados"
    } else {
        "Documento marcado como destacado"
    };
    Ok(Json(json!({ "detail": detail, "is_featured": !document.is_featured })))
}
