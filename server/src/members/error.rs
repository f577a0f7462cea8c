//! Members module errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::auth::ErrorResponse;
use crate::db::is_unique_violation;
use crate::permissions::PermissionError;

#[derive(Debug, Error)]
pub enum MembersError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Attendance for this member and event already exists")]
    DuplicateAttendance,

    #[error(transparent)]
    Permission(#[from] PermissionError),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl From<validator::ValidationErrors> for MembersError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl IntoResponse for MembersError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::DuplicateAttendance => (StatusCode::CONFLICT, "DUPLICATE_ATTENDANCE"),
            Self::Permission(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Database(e) if is_unique_violation(e) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Database(_) => {
                tracing::error!(error = ?self, "Members database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        ErrorResponse::into_response_with(status, code, self.to_string())
    }
}

pub type MembersResult<T> = Result<T, MembersError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_attendance_is_conflict() {
        assert_eq!(
            MembersError::DuplicateAttendance.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            MembersError::NotFound("Member").into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
