//! Authentication Middleware

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::api::AppState;
use crate::db::{find_active_officer_role, find_user_by_id, User};
use crate::permissions::{LodgePermissions, OfficerRoleCode};

use super::error::AuthError;
use super::jwt::validate_access_token;

/// Authenticated user injected into request extensions.
///
/// Carries what handlers need for access decisions without another query.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub symbolic_name: String,
    /// Degree 1-3.
    pub degree: i16,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub two_factor_enabled: bool,
    /// Directly granted codenames.
    pub permissions: LodgePermissions,
    /// Active officer role, if any.
    pub officer_role: Option<OfficerRoleCode>,
}

impl AuthUser {
    /// Build from a user row and their active officer role.
    #[must_use]
    pub fn from_user(user: User, officer_role: Option<OfficerRoleCode>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            symbolic_name: user.symbolic_name,
            degree: user.degree,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            two_factor_enabled: user.two_factor_enabled,
            permissions: user.permissions,
            officer_role,
        }
    }

    /// Symbolic name, falling back to the username.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.symbolic_name.is_empty() {
            &self.username
        } else {
            &self.symbolic_name
        }
    }
}

/// Middleware to require authentication.
///
/// Extracts the Bearer token, validates the JWT, loads the user and their
/// active officer role, and injects `AuthUser` into request extensions.
/// Inactive accounts are rejected.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?;

    let claims = validate_access_token(token, &state.config.jwt_secret)?;

    let user_id: Uuid = claims
        .sub
        .parse()
        .map_err(|_| AuthError::InvalidToken)?;

    let user = find_user_by_id(&state.db, user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    if !user.is_active {
        return Err(AuthError::InactiveAccount);
    }

    let officer_role = find_active_officer_role(&state.db, user.id).await?;

    request
        .extensions_mut()
        .insert(AuthUser::from_user(user, officer_role));

    Ok(next.run(request).await)
}

/// Extractor for the authenticated user in handlers behind `require_auth`.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}
