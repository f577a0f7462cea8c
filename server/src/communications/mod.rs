//! Communications Module
//!
//! Events with attendance fan-out, notifications, internal messages and
//! calendars.

pub mod calendars;
mod error;
pub mod events;
pub mod messages;
pub mod notifications;
pub mod queries;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};

use crate::api::AppState;

pub use error::{CommunicationsError, CommunicationsResult};
pub use events::announce_event;

/// Communications routes, mounted under `/api/communications` behind `require_auth`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events/", get(events::list_events).post(events::create_event))
        .route(
            "/events/{id}",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/{id}/mark_as_completed", post(events::mark_as_completed))
        .route("/events/{id}/cancel", post(events::cancel))
        .route("/events/{id}/attendees", get(events::attendees))
        .route(
            "/notifications/",
            get(notifications::list_notifications).post(notifications::create_notification),
        )
        .route(
            "/notifications/{id}",
            get(notifications::get_notification)
                .patch(notifications::update_notification)
                .delete(notifications::delete_notification),
        )
        .route("/notifications/{id}/mark_as_read", post(notifications::mark_as_read))
        .route(
            "/messages/",
            get(messages::list_messages).post(messages::create_message),
        )
        .route(
            "/messages/{id}",
            get(messages::get_message)
                .patch(messages::update_message)
                .delete(messages::delete_message),
        )
        .route("/messages/{id}/star", post(messages::star))
        .route("/messages/{id}/unstar", post(messages::unstar))
        .route("/messages/{id}/archive", post(messages::archive))
        .route("/messages/{id}/unarchive", post(messages::unarchive))
        .route(
            "/calendars/",
            get(calendars::list_calendars).post(calendars::create_calendar),
        )
        .route(
            "/calendars/{id}",
            get(calendars::get_calendar)
                .patch(calendars::update_calendar)
                .delete(calendars::delete_calendar),
        )
        .route("/calendars/{id}/add_event", post(calendars::add_event))
        .route("/calendars/{id}/events", get(calendars::calendar_events))
}
