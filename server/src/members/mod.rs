//! Members Module
//!
//! Member directory, profiles, personal documents, degree progress and
//! attendance records.

mod error;
pub mod handlers;
pub mod progress;
pub mod queries;
pub mod types;

use axum::{routing::get, Router};

use crate::api::AppState;

pub use error::{MembersError, MembersResult};

/// Members routes, mounted under `/api/members` behind `require_auth`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/members/", get(handlers::list_members))
        .route("/members/{id}", get(handlers::get_member))
        .route(
            "/members/{id}/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .route(
            "/members/{id}/documents",
            get(handlers::member_documents).post(handlers::add_member_document),
        )
        .route(
            "/members/{id}/progress",
            get(handlers::member_progress).post(handlers::add_member_progress),
        )
        .route("/members/{id}/attendance", get(handlers::member_attendance))
        .route(
            "/documents/",
            get(handlers::list_documents).post(handlers::create_document),
        )
        .route(
            "/documents/{id}",
            get(handlers::get_document)
                .patch(handlers::update_document)
                .delete(handlers::delete_document),
        )
        .route(
            "/progress/",
            get(handlers::list_progress).post(handlers::create_progress),
        )
        .route(
            "/progress/{id}",
            get(handlers::get_progress)
                .patch(handlers::update_progress)
                .delete(handlers::delete_progress),
        )
        .route(
            "/attendance/",
            get(handlers::list_attendance).post(handlers::create_attendance),
        )
        .route(
            "/attendance/{id}",
            get(handlers::get_attendance)
                .patch(handlers::update_attendance)
                .delete(handlers::delete_attendance),
        )
}
