//! Rituals module errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::ErrorResponse;
use crate::db::is_unique_violation;
use crate::permissions::PermissionError;

#[derive(Debug, Error)]
pub enum RitualsError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Workflow step not allowed from the current status.
    #[error("{0}")]
    InvalidState(&'static str),

    #[error("Minutes already exist for this ritual plan")]
    DuplicateMinutes,

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl From<validator::ValidationErrors> for RitualsError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl IntoResponse for RitualsError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::InvalidState(_) => (StatusCode::BAD_REQUEST, "INVALID_STATE"),
            Self::DuplicateMinutes => (StatusCode::CONFLICT, "DUPLICATE_MINUTES"),
            Self::Permission(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Database(e) if is_unique_violation(e) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Database(_) => {
                tracing::error!(error = ?self, "Rituals database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        ErrorResponse::into_response_with(status, code, self.to_string())
    }
}

pub type RitualsResult<T> = Result<T, RitualsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            RitualsError::InvalidState("Only draft plans can be approved")
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RitualsError::DuplicateMinutes.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            RitualsError::NotFound("Ritual plan").into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
