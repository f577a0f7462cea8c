//! Authentication HTTP Handlers

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use super::error::{AuthError, AuthResult};
use super::jwt::{generate_token_pair, validate_refresh_token};
use super::middleware::AuthUser;
use super::password::{generate_reset_token, hash_password, hash_token, verify_password};
use super::two_factor::{build_totp, generate_secret, qr_data_url, verify_code};
use crate::api::AppState;
use crate::db::{
    self, confirm_totp, create_password_reset_token, create_session, delete_session_by_token_hash,
    disable_totp, find_session_by_token_hash, find_user_by_email, find_user_by_id,
    find_user_by_username, find_valid_reset_token, invalidate_user_reset_tokens,
    set_pending_totp_secret, User,
};
use crate::email::{password_reset_link, ResetEmail};
use crate::system::{self, record_log, LogType, NewSystemLog, DEFAULT_LODGE_NAME};
use crate::util::ClientInfo;

const RESET_REQUESTED: &str = "Se ha enviado un enlace de restablecimiento a tu correo \
     electrónico si está registrado en nuestro sistema.";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Login request. Both fields are required; missing ones give 400.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogoutRequest {
    pub refresh: String,
}

/// User summary included in token responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    /// Superuser flag.
    pub is_admin: bool,
    pub degree: i16,
    pub symbolic_name: String,
}

impl From<&User> for LoginUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_staff: user.is_staff,
            is_admin: user.is_superuser,
            degree: user.degree,
            symbolic_name: user.symbolic_name.clone(),
        }
    }
}

/// Issued token pair.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access: String,
    pub refresh: String,
    pub user: LoginUser,
}

/// Returned by login instead of tokens when two-factor is enabled.
#[derive(Debug, Serialize, ToSchema)]
pub struct TwoFactorChallenge {
    pub detail: String,
    pub requires_2fa: bool,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TwoFactorVerifyRequest {
    pub user_id: Option<Uuid>,
    pub code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TwoFactorCodeRequest {
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TwoFactorSetupResponse {
    /// Base32 secret for manual entry.
    pub secret_key: String,
    /// `data:image/png;base64,...`
    pub qr_code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordResetConfirmRequest {
    pub token: String,
    pub password: String,
}

fn detail(message: &str) -> Json<serde_json::Value> {
    Json(json!({ "detail": message }))
}

// ============================================================================
// Token issue
// ============================================================================

/// Generate a token pair and record the refresh session.
async fn issue_tokens(
    state: &AppState,
    user: &User,
    client: &ClientInfo,
) -> AuthResult<TokenResponse> {
    let tokens = generate_token_pair(
        user.id,
        &state.config.jwt_secret,
        state.config.jwt_access_expiry,
        state.config.jwt_refresh_expiry,
    )?;

    let expires_at = Utc::now() + Duration::seconds(state.config.jwt_refresh_expiry);
    create_session(
        &state.db,
        user.id,
        &hash_token(&tokens.refresh_token),
        expires_at,
        client.ip.as_deref(),
        client.user_agent.as_deref(),
    )
    .await?;

    Ok(TokenResponse {
        access: tokens.access_token,
        refresh: tokens.refresh_token,
        user: LoginUser::from(user),
    })
}

/// Persist a failed login as a security log. Failures here never block the response.
async fn record_failed_login(state: &AppState, username: &str, client: &ClientInfo, reason: &str) {
    tracing::warn!(username = %username, ip = ?client.ip, reason, "Failed login attempt");

    let log = NewSystemLog::new(
        LogType::Security,
        "auth",
        format!("Intento de inicio de sesión fallido: {username}"),
    )
    .details(reason)
    .client(client.ip.clone(), client.user_agent.clone());
    let _ = record_log(&state.db, &log).await;
}

/// Login with username and password.
///
/// POST /api/auth/token/
#[utoipa::path(
    post,
    path = "/api/auth/token/",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Tokens, or a two-factor challenge", body = TokenResponse),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid credentials or inactive account"),
    )
)]
#[tracing::instrument(skip(state, client, body))]
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(body): Json<LoginRequest>,
) -> AuthResult<Response> {
    let (Some(username), Some(password)) = (body.username, body.password) else {
        return Err(AuthError::Validation(
            "Se requieren nombre de usuario y contraseña.".to_string(),
        ));
    };

    let Some(user) = find_user_by_username(&state.db, &username).await? else {
        record_failed_login(&state, &username, &client, "unknown user").await;
        return Err(AuthError::InvalidCredentials);
    };

    let valid = verify_password(&password, &user.password_hash).map_err(|_| AuthError::PasswordHash)?;
    if !valid {
        record_failed_login(&state, &username, &client, "wrong password").await;
        return Err(AuthError::InvalidCredentials);
    }

    if !user.is_active {
        record_failed_login(&state, &username, &client, "inactive account").await;
        return Err(AuthError::InactiveAccount);
    }

    if user.two_factor_enabled {
        tracing::info!(user_id = %user.id, "Two-factor challenge issued");
        return Ok(Json(TwoFactorChallenge {
            detail: "Se requiere verificación de dos factores.".to_string(),
            requires_2fa: true,
            user_id: user.id,
        })
        .into_response());
    }

    let response = issue_tokens(&state, &user, &client).await?;
    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(response).into_response())
}

/// Rotate a refresh token.
///
/// POST /api/auth/token/refresh/
#[utoipa::path(
    post,
    path = "/api/auth/token/refresh/",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 401, description = "Revoked, expired or wrong token type"),
    )
)]
#[tracing::instrument(skip(state, client, body))]
pub async fn refresh_token(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(body): Json<RefreshRequest>,
) -> AuthResult<Json<TokenResponse>> {
    let claims = validate_refresh_token(&body.refresh, &state.config.jwt_secret)?;

    let token_hash = hash_token(&body.refresh);
    let session = find_session_by_token_hash(&state.db, &token_hash)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    let user_id: Uuid = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;
    if session.user_id != user_id {
        return Err(AuthError::InvalidToken);
    }

    let user = find_user_by_id(&state.db, user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    if !user.is_active {
        return Err(AuthError::InactiveAccount);
    }

    // Rotation: the old token is single-use.
    if !delete_session_by_token_hash(&state.db, &token_hash).await? {
        return Err(AuthError::InvalidToken);
    }

    let response = issue_tokens(&state, &user, &client).await?;
    tracing::info!(user_id = %user_id, "Token refreshed");
    Ok(Json(response))
}

/// Revoke a refresh token.
///
/// POST /api/auth/logout/
#[tracing::instrument(skip(state, body), fields(user_id = %auth_user.id))]
pub async fn logout(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<LogoutRequest>,
) -> AuthResult<Json<serde_json::Value>> {
    delete_session_by_token_hash(&state.db, &hash_token(&body.refresh)).await?;
    tracing::info!(user_id = %auth_user.id, "User logged out");
    Ok(detail("Sesión cerrada correctamente."))
}

// ============================================================================
// Two-factor
// ============================================================================

/// Open the stored secret and build its TOTP.
fn user_totp(state: &AppState, user: &User, sealed: &str) -> AuthResult<totp_rs::TOTP> {
    let secret = state.vault.open(sealed)?;
    Ok(build_totp(&secret, &state.config.totp_issuer, &user.email)?)
}

/// Second login step.
///
/// POST /api/auth/two-factor/verify/
#[utoipa::path(
    post,
    path = "/api/auth/two-factor/verify/",
    tag = "auth",
    request_body = TwoFactorVerifyRequest,
    responses(
        (status = 200, description = "Token pair", body = TokenResponse),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Invalid code or unconfirmed device"),
        (status = 404, description = "Unknown user"),
    )
)]
#[tracing::instrument(skip(state, client, body))]
pub async fn two_factor_verify(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(body): Json<TwoFactorVerifyRequest>,
) -> AuthResult<Json<TokenResponse>> {
    let (Some(user_id), Some(code)) = (body.user_id, body.code) else {
        return Err(AuthError::Validation(
            "Se requieren el usuario y el código.".to_string(),
        ));
    };

    let user = find_user_by_id(&state.db, user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    if !user.is_active {
        return Err(AuthError::InactiveAccount);
    }

    let sealed = match (&user.totp_secret, user.totp_confirmed) {
        (Some(sealed), true) => sealed,
        _ => return Err(AuthError::TwoFactorNotConfirmed),
    };

    if !verify_code(&user_totp(&state, &user, sealed)?, &code) {
        record_failed_login(&state, &user.username, &client, "invalid two-factor code").await;
        return Err(AuthError::InvalidTwoFactorCode);
    }

    let response = issue_tokens(&state, &user, &client).await?;
    tracing::info!(user_id = %user.id, "User logged in with two-factor");
    Ok(Json(response))
}

/// Start two-factor enrollment with a fresh, unconfirmed secret.
///
/// GET /api/auth/two-factor/setup/
#[utoipa::path(
    get,
    path = "/api/auth/two-factor/setup/",
    tag = "auth",
    responses((status = 200, description = "Secret and QR code", body = TwoFactorSetupResponse)),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state), fields(user_id = %auth_user.id))]
pub async fn two_factor_setup_start(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AuthResult<Json<TwoFactorSetupResponse>> {
    let secret = generate_secret();
    let totp = build_totp(&secret, &state.config.totp_issuer, &auth_user.email)?;
    let qr_code = qr_data_url(&totp)?;

    set_pending_totp_secret(&state.db, auth_user.id, &state.vault.seal(&secret)?).await?;

    tracing::info!(user_id = %auth_user.id, "Two-factor enrollment started");
    Ok(Json(TwoFactorSetupResponse {
        secret_key: secret,
        qr_code,
    }))
}

/// Confirm the pending secret.
///
/// POST /api/auth/two-factor/setup/
#[utoipa::path(
    post,
    path = "/api/auth/two-factor/setup/",
    tag = "auth",
    request_body = TwoFactorCodeRequest,
    responses(
        (status = 200, description = "Two-factor enabled"),
        (status = 400, description = "No pending device or invalid code"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(user_id = %auth_user.id))]
pub async fn two_factor_setup_confirm(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<TwoFactorCodeRequest>,
) -> AuthResult<Json<serde_json::Value>> {
    let user = find_user_by_id(&state.db, auth_user.id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    let sealed = match (&user.totp_secret, user.totp_confirmed) {
        (Some(sealed), false) => sealed,
        _ => return Err(AuthError::NoPendingTwoFactor),
    };

    if !verify_code(&user_totp(&state, &user, sealed)?, &body.code) {
        return Err(AuthError::Validation("Código inválido.".to_string()));
    }

    confirm_totp(&state.db, user.id).await?;
    tracing::info!(user_id = %user.id, "Two-factor enabled");
    Ok(detail("Autenticación de dos factores activada correctamente."))
}

/// Disable two-factor after checking a current code.
///
/// POST /api/auth/two-factor/disable/
#[utoipa::path(
    post,
    path = "/api/auth/two-factor/disable/",
    tag = "auth",
    request_body = TwoFactorCodeRequest,
    responses(
        (status = 200, description = "Two-factor disabled"),
        (status = 400, description = "Not enabled or invalid code"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(user_id = %auth_user.id))]
pub async fn two_factor_disable(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<TwoFactorCodeRequest>,
) -> AuthResult<Json<serde_json::Value>> {
    let user = find_user_by_id(&state.db, auth_user.id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    let sealed = match (&user.totp_secret, user.totp_confirmed) {
        (Some(sealed), true) => sealed,
        _ => {
            return Err(AuthError::Validation(
                "La autenticación de dos factores no está activada.".to_string(),
            ))
        }
    };

    if !verify_code(&user_totp(&state, &user, sealed)?, &body.code) {
        return Err(AuthError::Validation("Código inválido.".to_string()));
    }

    disable_totp(&state.db, user.id).await?;
    tracing::info!(user_id = %user.id, "Two-factor disabled");
    Ok(detail("Autenticación de dos factores desactivada."))
}

// ============================================================================
// Password reset
// ============================================================================

/// Request a reset link. Always answers with the same message.
///
/// POST /api/auth/password-reset/
#[utoipa::path(
    post,
    path = "/api/auth/password-reset/",
    tag = "auth",
    request_body = PasswordResetRequest,
    responses((status = 200, description = "Generic acknowledgement"))
)]
#[tracing::instrument(skip(state, body))]
pub async fn password_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetRequest>,
) -> Json<serde_json::Value> {
    let user = match find_user_by_email(&state.db, body.email.trim()).await {
        Ok(Some(u)) if u.is_active => u,
        Ok(_) => return detail(RESET_REQUESTED),
        Err(e) => {
            tracing::error!(error = %e, "Database error during password reset lookup");
            return detail(RESET_REQUESTED);
        }
    };

    if let Err(e) = invalidate_user_reset_tokens(&state.db, user.id).await {
        tracing::error!(error = %e, user_id = %user.id, "Failed to invalidate reset tokens, aborting");
        return detail(RESET_REQUESTED);
    }

    let raw_token = generate_reset_token();
    let expires_at = Utc::now() + Duration::seconds(state.config.password_reset_expiry);
    if let Err(e) =
        create_password_reset_token(&state.db, user.id, &hash_token(&raw_token), expires_at).await
    {
        tracing::error!(error = %e, user_id = %user.id, "Failed to create password reset token");
        return detail(RESET_REQUESTED);
    }

    let link = password_reset_link(&state.config.frontend_url, &raw_token);
    let Some(email) = state.email.as_ref() else {
        tracing::debug!(user_id = %user.id, token = %raw_token, "SMTP not configured, reset token not sent");
        return detail(RESET_REQUESTED);
    };

    let (lodge_name, signature) = match system::queries::get_or_create_configuration(&state.db).await {
        Ok(lodge) => (lodge.lodge_name, lodge.email_signature),
        Err(e) => {
            tracing::warn!(error = %e, "Lodge configuration unavailable, sending unsigned reset email");
            (DEFAULT_LODGE_NAME.to_string(), String::new())
        }
    };
    let reset = ResetEmail {
        username: user.display_name(),
        link: &link,
        valid_hours: (state.config.password_reset_expiry / 3600).max(1),
        lodge_name: &lodge_name,
        signature: &signature,
    };
    match email.send_password_reset(&user.email, &reset).await {
        Ok(()) => tracing::info!(user_id = %user.id, "Password reset email sent"),
        Err(e) => {
            tracing::error!(error = %e, user_id = %user.id, "Failed to send password reset email");
            if let Err(e) = invalidate_user_reset_tokens(&state.db, user.id).await {
                tracing::error!(error = %e, user_id = %user.id, "Failed to clean up orphaned reset token");
            }
        }
    }

    detail(RESET_REQUESTED)
}

/// Set a new password with a reset token.
///
/// POST /api/auth/password-reset/confirm/
#[utoipa::path(
    post,
    path = "/api/auth/password-reset/confirm/",
    tag = "auth",
    request_body = PasswordResetConfirmRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Invalid, used or expired token, or invalid password"),
    )
)]
#[tracing::instrument(skip(state, body))]
pub async fn password_reset_confirm(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetConfirmRequest>,
) -> AuthResult<Json<serde_json::Value>> {
    validate_password_length(&body.password)?;

    let invalid = || AuthError::Validation("El enlace no es válido o ha expirado.".to_string());

    let reset_token = find_valid_reset_token(&state.db, &hash_token(&body.token))
        .await?
        .ok_or_else(invalid)?;

    let password_hash = hash_password(&body.password).map_err(|_| AuthError::PasswordHash)?;

    let mut tx = state.db.begin().await?;
    if !db::mark_reset_token_used(&mut tx, reset_token.id).await? {
        return Err(invalid());
    }
    db::update_user_password(&mut tx, reset_token.user_id, &password_hash).await?;
    let sessions = db::delete_all_user_sessions(&mut tx, reset_token.user_id).await?;
    tx.commit().await?;

    tracing::info!(user_id = %reset_token.user_id, sessions, "Password reset, sessions revoked");
    Ok(detail("La contraseña ha sido restablecida correctamente."))
}

/// 8 to 128 characters.
pub fn validate_password_length(password: &str) -> AuthResult<()> {
    let len = password.chars().count();
    if (8..=128).contains(&len) {
        Ok(())
    } else {
        Err(AuthError::Validation(
            "La contraseña debe tener entre 8 y 128 caracteres.".to_string(),
        ))
    }
}
