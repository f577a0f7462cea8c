//! Category Handlers
//!
//! Categories form a tree. A subcategory is never visible to a lower degree
//! than its parent: saving clamps it up, and raising a parent lifts every
//! descendant with it.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use super::error::{LibraryError, LibraryResult};
use super::queries;
use super::types::{
    inherited_degree, CategoryDetail, CategoryQuery, CategoryResponse, CreateCategoryRequest,
    DocumentCategory, DocumentQuery, DocumentResponse, ParentFilter, UpdateCategoryRequest,
};
use crate::api::AppState;
use crate::auth::AuthUser;
use crate::permissions::LodgePermissions;
use crate::util::{page_bounds, Page};

async fn parent_degree(state: &AppState, parent_id: Option<Uuid>) -> LibraryResult<Option<i16>> {
    let Some(parent_id) = parent_id else {
        return Ok(None);
    };
    let parent = queries::find_category(&state.db, parent_id)
        .await?
        .ok_or(LibraryError::NotFound("Parent category"))?;
    Ok(Some(parent.required_degree))
}

#[utoipa::path(
    get,
    path = "/api/library/categories/",
    tag = "library",
    params(CategoryQuery),
    responses((status = 200, description = "Categories visible to the caller", body = Page<CategoryResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn list_categories(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CategoryQuery>,
) -> LibraryResult<Json<Page<CategoryResponse>>> {
    let parent = ParentFilter::parse(query.parent_id.as_deref()).map_err(LibraryError::Validation)?;
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let rows =
        queries::list_categories(&state.db, &query, parent, auth.degree_ceiling(), limit, offset)
            .await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}

pub async fn get_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> LibraryResult<Json<CategoryDetail>> {
    let category = queries::find_category_response(&state.db, id)
        .await?
        .filter(|c| auth.can_see_degree(c.category.required_degree))
        .ok_or(LibraryError::NotFound("Category"))?;
    let subcategories = queries::subcategories(&state.db, id, auth.degree_ceiling()).await?;

    Ok(Json(CategoryDetail {
        category,
        subcategories,
    }))
}

#[utoipa::path(
    post,
    path = "/api/library/categories/",
    tag = "library",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 409, description = "Name already used under this parent"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn create_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateCategoryRequest>,
) -> LibraryResult<(StatusCode, Json<CategoryResponse>)> {
    auth.require_permission(LodgePermissions::CHANGE_DOCUMENT)?;
    body.validate()?;

    let degree = inherited_degree(body.required_degree, parent_degree(&state, body.parent_id).await?);
    let category = queries::insert_category(&state.db, &body, degree, auth.id).await?;

    let response = queries::find_category_response(&state.db, category.id)
        .await?
        .ok_or(LibraryError::NotFound("Category"))?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn update_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateCategoryRequest>,
) -> LibraryResult<Json<CategoryDetail>> {
    auth.require_permission(LodgePermissions::CHANGE_DOCUMENT)?;
    body.validate()?;
    let mut category = visible_category(&state, &auth, id).await?;

    body.apply(&mut category);
    if let Some(parent_id) = category.parent_id {
        if queries::is_descendant_or_self(&state.db, id, parent_id).await? {
            return Err(LibraryError::Validation(
                "A category cannot be nested under itself or its descendants".to_string(),
            ));
        }
    }
    category.required_degree = inherited_degree(
        category.required_degree,
        parent_degree(&state, category.parent_id).await?,
    );

    let mut tx = state.db.begin().await?;
    queries::save_category(&mut tx, &category).await?;
    let lifted = queries::cascade_category_degree(&mut tx, id, category.required_degree).await?;
    tx.commit().await?;

    if lifted > 0 {
        tracing::info!(category_id = %id, degree = category.required_degree, lifted, "Subcategory degrees raised");
    }
    get_category(State(state), auth, Path(id)).await
}

pub async fn delete_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> LibraryResult<StatusCode> {
    auth.require_permission(LodgePermissions::CHANGE_DOCUMENT)?;
    visible_category(&state, &auth, id).await?;
    if !queries::delete_category(&state.db, id).await? {
        return Err(LibraryError::NotFound("Category"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn visible_category(
    state: &AppState,
    auth: &AuthUser,
    id: Uuid,
) -> LibraryResult<DocumentCategory> {
    queries::find_category(&state.db, id)
        .await?
        .filter(|c| auth.can_see_degree(c.required_degree))
        .ok_or(LibraryError::NotFound("Category"))
}

/// Documents filed directly under a category.
pub async fn category_documents(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> LibraryResult<Json<Page<DocumentResponse>>> {
    visible_category(&state, &auth, id).await?;

    let query = DocumentQuery {
        category_id: Some(id),
        ..Default::default()
    };
    let (limit, offset) = page_bounds(None, None);
    let rows = queries::list_documents(&state.db, &query, auth.degree_ceiling(), limit, offset).await?;
    Ok(Json(Page::from_counted(rows, limit, offset)))
}
