//! Library Module
//!
//! Degree-gated document library: category tree, documents, access logs,
//! comments and ratings.

pub mod access;
pub mod categories;
pub mod documents;
mod error;
pub mod feedback;
pub mod queries;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};

use crate::api::AppState;

pub use error::{LibraryError, LibraryResult};

/// Library routes, mounted under `/api/library` behind `require_auth`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/categories/",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/{id}",
            get(categories::get_category)
                .patch(categories::update_category)
                .delete(categories::delete_category),
        )
        .route("/categories/{id}/documents", get(categories::category_documents))
        .route(
            "/documents/",
            get(documents::list_documents).post(documents::create_document),
        )
        .route(
            "/documents/{id}",
            get(documents::get_document)
                .patch(documents::update_document)
                .delete(documents::delete_document),
        )
        .route("/documents/{id}/download", post(documents::download))
        .route("/documents/{id}/add_comment", post(documents::add_comment))
        .route("/documents/{id}/rate", post(documents::rate))
        .route("/documents/{id}/comments", get(documents::document_comments))
        .route("/documents/{id}/ratings", get(documents::document_ratings))
        .route("/documents/{id}/toggle_featured", post(documents::toggle_featured))
        .route(
            "/comments/",
            get(feedback::list_comments).post(feedback::create_comment),
        )
        .route(
            "/comments/{id}",
            get(feedback::get_comment)
                .patch(feedback::update_comment)
                .delete(feedback::delete_comment),
        )
        .route(
            "/ratings/",
            get(feedback::list_ratings).post(feedback::create_rating),
        )
        .route(
            "/ratings/{id}",
            get(feedback::get_rating)
                .patch(feedback::update_rating)
                .delete(feedback::delete_rating),
        )
        .route("/access-logs/", get(access::list_access_logs))
        .route("/access-logs/{id}", get(access::get_access_log))
}
