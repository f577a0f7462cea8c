//! Rituals Module
//!
//! Ritual plans with their roles, works, minutes and attachments.

pub mod attachments;
mod error;
pub mod minutes;
pub mod plans;
pub mod queries;
pub mod roles;
pub mod types;
pub mod works;

use axum::{
    routing::{get, post},
    Router,
};

use crate::api::AppState;

pub use error::{RitualsError, RitualsResult};

/// Rituals routes, mounted under `/api/rituals` behind `require_auth`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/plans/", get(plans::list_plans).post(plans::create_plan))
        .route(
            "/plans/{id}",
            get(plans::get_plan)
                .patch(plans::update_plan)
                .delete(plans::delete_plan),
        )
        .route("/plans/{id}/approve", post(plans::approve))
        .route("/plans/{id}/mark_as_completed", post(plans::mark_as_completed))
        .route("/plans/{id}/cancel", post(plans::cancel))
        .route("/plans/{id}/roles", get(plans::plan_roles))
        .route("/plans/{id}/add_role", post(plans::add_role))
        .route("/plans/{id}/works", get(plans::plan_works))
        .route("/plans/{id}/add_work", post(plans::add_work))
        .route("/plans/{id}/attachments", get(plans::plan_attachments))
        .route("/plans/{id}/add_attachment", post(plans::add_attachment))
        .route("/roles/", get(roles::list_roles).post(roles::create_role))
        .route(
            "/roles/{id}",
            get(roles::get_role)
                .patch(roles::update_role)
                .delete(roles::delete_role),
        )
        .route("/roles/{id}/assign", post(roles::assign))
        .route("/roles/{id}/confirm", post(roles::confirm))
        .route("/roles/{id}/unconfirm", post(roles::unconfirm))
        .route("/works/", get(works::list_works).post(works::create_work))
        .route(
            "/works/{id}",
            get(works::get_work)
                .patch(works::update_work)
                .delete(works::delete_work),
        )
        .route("/works/{id}/update_status", post(works::update_status))
        .route(
            "/minutes/",
            get(minutes::list_minutes).post(minutes::create_minutes),
        )
        .route(
            "/minutes/{id}",
            get(minutes::get_minutes)
                .patch(minutes::update_minutes)
                .delete(minutes::delete_minutes),
        )
        .route("/minutes/{id}/finalize", post(minutes::finalize))
        .route("/minutes/{id}/approve", post(minutes::approve))
        .route(
            "/attachments/",
            get(attachments::list_attachments).post(attachments::create_attachment),
        )
        .route(
            "/attachments/{id}",
            get(attachments::get_attachment)
                .patch(attachments::update_attachment)
                .delete(attachments::delete_attachment),
        )
}
