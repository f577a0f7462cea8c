//! Authentication Service
//!
//! Handles login, token rotation, two-factor, password reset, user accounts
//! and officer role assignment.

mod error;
pub mod handlers;
pub mod jwt;
mod middleware;
pub mod password;
pub mod two_factor;
pub mod users;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};

use crate::api::AppState;

pub use error::{AuthError, AuthResult, ErrorResponse};
pub use middleware::{require_auth, AuthUser};
pub use two_factor::SecretVault;

/// Create authentication router.
///
/// Public routes (no auth required):
/// - POST /token/ - Login with username/password
/// - POST /token/refresh/ - Rotate refresh token
/// - POST /two-factor/verify/ - Second login step
/// - POST /password-reset/ - Request reset link
/// - POST /password-reset/confirm/ - Set new password
///
/// Protected routes (auth required):
/// - POST /logout/ - Revoke refresh token
/// - GET|POST /two-factor/setup/ - Enroll and confirm TOTP
/// - POST /two-factor/disable/ - Disable TOTP
/// - /users/... - Accounts and officer roles
pub fn router(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/token/", post(handlers::login))
        .route("/token/refresh/", post(handlers::refresh_token))
        .route("/two-factor/verify/", post(handlers::two_factor_verify))
        .route("/password-reset/", post(handlers::password_reset))
        .route("/password-reset/confirm/", post(handlers::password_reset_confirm));

    let protected_routes = Router::new()
        .route("/logout/", post(handlers::logout))
        .route(
            "/two-factor/setup/",
            get(handlers::two_factor_setup_start).post(handlers::two_factor_setup_confirm),
        )
        .route("/two-factor/disable/", post(handlers::two_factor_disable))
        .route("/users/", get(users::list_users).post(users::create_user))
        .route("/users/me/", get(users::me))
        .route("/users/change_password/", post(users::change_password))
        .route(
            "/users/{id}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/users/{id}/officer-role",
            get(users::get_officer_role)
                .put(users::put_officer_role)
                .delete(users::delete_officer_role),
        )
        .layer(axum_middleware::from_fn_with_state(state, require_auth));

    public_routes.merge(protected_routes)
}
