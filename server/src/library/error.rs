//! Library module errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::ErrorResponse;
use crate::db::is_unique_violation;
use crate::permissions::PermissionError;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("A rating between 1 and 5 is required")]
    InvalidRating,

    #[error("Only the author may modify this {0}")]
    NotAuthor(&'static str),

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl From<validator::ValidationErrors> for LibraryError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl IntoResponse for LibraryError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::InvalidRating => (StatusCode::BAD_REQUEST, "INVALID_RATING"),
            Self::NotAuthor(_) | Self::Permission(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Database(e) if is_unique_violation(e) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Database(_) => {
                tracing::error!(error = ?self, "Library database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        ErrorResponse::into_response_with(status, code, self.to_string())
    }
}

pub type LibraryResult<T> = Result<T, LibraryError>;
