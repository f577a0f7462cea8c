//! Comment and rating handlers.
//!
//! Feedback left on someone else's document notifies its uploader. Only the
//! author of a comment or rating (or a superuser) may change it.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use super::documents::visible_document;
use super::error::{LibraryError, LibraryResult};
use super::queries;
use super::types::{
    parse_stars, CommentRequest, Document, DocumentComment, DocumentRating, FeedbackQuery,
    RateRequest, UpdateCommentRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::notify::{self, Notice};
use crate::util::{page_bounds, Page};

/// Uploader to notify about feedback from `actor`, if it is someone else.
fn uploader_to_notify(document: &Document, actor: Uuid) -> Option<Uuid> {
    document.uploaded_by.filter(|uploader| *uploader != actor)
}

fn require_author(auth: &AuthUser, author: Uuid, what: &'static str) -> LibraryResult<()> {
    if auth.id == author || auth.is_superuser {
        Ok(())
    } else {
        Err(LibraryError::NotAuthor(what))
    }
}

/// Store a comment and notify the uploader.
pub async fn comment_on(
    state: &AppState,
    auth: &AuthUser,
    document: &Document,
    content: &str,
) -> LibraryResult<DocumentComment> {
    let mut tx = state.db.begin().await?;
    let id = queries::insert_comment(&mut tx, document.id, auth.id, content).await?;
    if let Some(uploader) = uploader_to_notify(document, auth.id) {
        let notice = Notice::document_commented(&document.title, auth.display_name(), content)
            .by(Some(auth.id));
        notify::notify_users(&mut tx, &notice, &[uploader]).await?;
    }
    tx.commit().await?;

    queries::find_comment(&state.db, id)
        .await?
        .ok_or(LibraryError::NotFound("Comment"))
}

/// Insert or replace the caller's rating. Only a first rating notifies.
pub async fn rate(
    state: &AppState,
    auth: &AuthUser,
    document: &Document,
    stars: i16,
) -> LibraryResult<DocumentRating> {
    let mut tx = state.db.begin().await?;
    let (id, created) = queries::upsert_rating(&mut tx, document.id, auth.id, stars).await?;
    if created {
        if let Some(uploader) = uploader_to_notify(document, auth.id) {
            let notice = Notice::document_rated(&document.title, auth.display_name(), stars)
                .by(Some(auth.id));
            notify::notify_users(&mut tx, &notice, &[uploader]).await?;
        }
    }
    tx.commit().await?;

    queries::find_rating(&state.db, id)
        .await?
        .ok_or(LibraryError::NotFound("Rating"))
}

// ============================================================================
// Comments
// ============================================================================

pub async fn list_comments(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<FeedbackQuery>,
) -> LibraryResult<Json<Page<DocumentComment>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows =
        queries::list_comments(&state.db, &query, auth.degree_ceiling(), limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

pub async fn get_comment(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> LibraryResult<Json<DocumentComment>> {
    queries::find_comment(&state.db, id)
        .await?
        .map(Json)
        .ok_or(LibraryError::NotFound("Comment"))
}

pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CommentRequest>,
) -> LibraryResult<(StatusCode, Json<DocumentComment>)> {
    body.validate()?;
    let document_id = body
        .document_id
        .ok_or_else(|| LibraryError::Validation("document_id is required".to_string()))?;
    let document = visible_document(&state, &auth, document_id).await?;

    let comment = comment_on(&state, &auth, &document, &body.content).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn update_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateCommentRequest>,
) -> LibraryResult<Json<DocumentComment>> {
    body.validate()?;
    let comment = queries::find_comment(&state.db, id)
        .await?
        .ok_or(LibraryError::NotFound("Comment"))?;
    require_author(&auth, comment.user_id, "comment")?;

    queries::update_comment(&state.db, id, &body.content).await?;
    get_comment(State(state), auth, Path(id)).await
}

pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> LibraryResult<StatusCode> {
    let comment = queries::find_comment(&state.db, id)
        .await?
        .ok_or(LibraryError::NotFound("Comment"))?;
    require_author(&auth, comment.user_id, "comment")?;

    queries::delete_comment(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Ratings
// ============================================================================

pub async fn list_ratings(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<FeedbackQuery>,
) -> LibraryResult<Json<Page<DocumentRating>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows =
        queries::list_ratings(&state.db, &query, auth.degree_ceiling(), limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

pub async fn get_rating(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> LibraryResult<Json<DocumentRating>> {
    queries::find_rating(&state.db, id)
        .await?
        .map(Json)
        .ok_or(LibraryError::NotFound("Rating"))
}

/// Create a rating. A second rating of the same document is a conflict.
pub async fn create_rating(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<RateRequest>,
) -> LibraryResult<(StatusCode, Json<DocumentRating>)> {
    let stars = body.stars().ok_or(LibraryError::InvalidRating)?;
    let document_id = body
        .document_id
        .ok_or_else(|| LibraryError::Validation("document_id is required".to_string()))?;
    let document = visible_document(&state, &auth, document_id).await?;

    let mut tx = state.db.begin().await?;
    let id = queries::insert_rating(&mut tx, document.id, auth.id, stars).await?;
    if let Some(uploader) = uploader_to_notify(&document, auth.id) {
        let notice =
            Notice::document_rated(&document.title, auth.display_name(), stars).by(Some(auth.id));
        notify::notify_users(&mut tx, &notice, &[uploader]).await?;
    }
    tx.commit().await?;

    let rating = queries::find_rating(&state.db, id)
        .await?
        .ok_or(LibraryError::NotFound("Rating"))?;
    Ok((StatusCode::CREATED, Json(rating)))
}

pub async fn update_rating(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<serde_json::Value>,
) -> LibraryResult<Json<DocumentRating>> {
    let stars = body
        .get("rating")
        .and_then(parse_stars)
        .ok_or(LibraryError::InvalidRating)?;
    let rating = queries::find_rating(&state.db, id)
        .await?
        .ok_or(LibraryError::NotFound("Rating"))?;
    require_author(&auth, rating.user_id, "rating")?;

    queries::update_rating(&state.db, id, stars).await?;
    get_rating(State(state), auth, Path(id)).await
}

pub async fn delete_rating(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> LibraryResult<StatusCode> {
    let rating = queries::find_rating(&state.db, id)
        .await?
        .ok_or(LibraryError::NotFound("Rating"))?;
    require_author(&auth, rating.user_id, "rating")?;

    queries::delete_rating(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::library::types::DocumentType;

    fn document(uploaded_by: Option<Uuid>) -> Document {
        Document {
            id: Uuid::new_v4(),
            title: "Constituciones de Anderson".into(),
            description: String::new(),
            category_id: None,
            document_type: DocumentType::Constitution,
            file: "library/anderson.pdf".into(),
            author: "James Anderson".into(),
            publication_date: None,
            language: "es".into(),
            pages: Some(90),
            required_degree: 1,
            tags: "historia,constitución".into(),
            is_public: false,
            is_featured: false,
            view_count: 0,
            download_count: 0,
            uploaded_by,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_own_feedback_does_not_notify() {
        let uploader = Uuid::new_v4();
        let doc = document(Some(uploader));
        assert_eq!(uploader_to_notify(&doc, uploader), None);
        assert_eq!(uploader_to_notify(&doc, Uuid::new_v4()), Some(uploader));
        assert_eq!(uploader_to_notify(&document(None), uploader), None);
    }
}
