//! Communications module errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::ErrorResponse;
use crate::db::is_unique_violation;
use crate::permissions::PermissionError;

#[derive(Debug, Error)]
pub enum CommunicationsError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Status transition into the state the record already has.
    #[error("{0}")]
    InvalidState(&'static str),

    #[error("You are not a recipient of this {0}")]
    NotRecipient(&'static str),

    #[error("Event is already in this calendar")]
    DuplicateCalendarEvent,

    #[error("Only the sender may modify this message")]
    NotSender,

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl From<validator::ValidationErrors> for CommunicationsError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl IntoResponse for CommunicationsError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::InvalidState(_) => (StatusCode::BAD_REQUEST, "INVALID_STATE"),
            Self::NotRecipient(_) => (StatusCode::BAD_REQUEST, "NOT_RECIPIENT"),
            Self::DuplicateCalendarEvent => (StatusCode::CONFLICT, "DUPLICATE_CALENDAR_EVENT"),
            Self::NotSender | Self::Permission(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Database(e) if is_unique_violation(e) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Database(_) => {
                tracing::error!(error = ?self, "Communications database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        ErrorResponse::into_response_with(status, code, self.to_string())
    }
}

pub type CommunicationsResult<T> = Result<T, CommunicationsError>;
