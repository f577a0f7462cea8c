//! Authentication Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use super::two_factor::TwoFactorError;
use crate::db::is_unique_violation;
use crate::permissions::PermissionError;

/// Authentication error types.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid credentials (wrong username/password) or inactive account.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// User not found.
    #[error("User not found")]
    UserNotFound,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Username or email already in use.
    #[error("Username or email already taken")]
    UserAlreadyExists,

    /// Invalid or expired token.
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// Missing Authorization header.
    #[error("Missing authorization header")]
    MissingAuthHeader,

    /// Invalid authorization header format.
    #[error("Invalid authorization header format")]
    InvalidAuthHeader,

    /// Account has been deactivated.
    #[error("Account is inactive")]
    InactiveAccount,

    /// Invalid two-factor code.
    #[error("Invalid two-factor code")]
    InvalidTwoFactorCode,

    /// Two-factor device exists but was never confirmed.
    #[error("Two-factor authentication is not confirmed")]
    TwoFactorNotConfirmed,

    /// No unconfirmed secret waiting for confirmation.
    #[error("No pending two-factor device")]
    NoPendingTwoFactor,

    /// Validation error.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Caller lacks the required privilege.
    #[error(transparent)]
    Permission(#[from] PermissionError),

    /// Password hashing error.
    #[error("Password processing failed")]
    PasswordHash,

    /// TOTP secret handling failed.
    #[error("Two-factor processing failed")]
    TwoFactor(#[from] TwoFactorError),

    /// Database error.
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    /// JWT error.
    #[error("Token error")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Internal server error.
    #[error("Internal server error")]
    Internal(String),
}

/// Error response body for JSON responses.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    /// Build a complete response with the given status.
    pub fn into_response_with(status: StatusCode, code: &str, message: String) -> Response {
        (
            status,
            Json(Self {
                error: code.to_string(),
                message,
            }),
        )
            .into_response()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            Self::UserNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::UserAlreadyExists => (StatusCode::CONFLICT, "USER_EXISTS"),
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            Self::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            Self::MissingAuthHeader => (StatusCode::UNAUTHORIZED, "MISSING_AUTH"),
            Self::InvalidAuthHeader => (StatusCode::UNAUTHORIZED, "INVALID_AUTH_HEADER"),
            Self::InactiveAccount => (StatusCode::UNAUTHORIZED, "ACCOUNT_INACTIVE"),
            Self::InvalidTwoFactorCode => (StatusCode::UNAUTHORIZED, "INVALID_2FA_CODE"),
            Self::TwoFactorNotConfirmed => (StatusCode::UNAUTHORIZED, "2FA_NOT_CONFIRMED"),
            Self::NoPendingTwoFactor => (StatusCode::BAD_REQUEST, "NO_PENDING_2FA"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::Permission(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Database(e) if is_unique_violation(e) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::PasswordHash | Self::TwoFactor(_) | Self::Database(_) | Self::Internal(_) => {
                tracing::error!(error = ?self, "Auth internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            Self::Jwt(_) => (StatusCode::UNAUTHORIZED, "TOKEN_ERROR"),
        };

        ErrorResponse::into_response_with(status, code, self.to_string())
    }
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::InvalidCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::NoPendingTwoFactor.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::Permission(PermissionError::StaffRequired)
                .into_response()
                .status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::Database(sqlx::Error::RowNotFound)
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
