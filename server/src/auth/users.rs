//! User accounts and officer role assignment.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::error::{AuthError, AuthResult};
use super::handlers::validate_password_length;
use super::middleware::AuthUser;
use super::password::{hash_password, verify_password};
use crate::api::AppState;
use crate::db::{self, NewUser, OfficerRole, User, UserFilter};
use crate::permissions::{cascade, AccessContext, Degree, OfficerRoleCode};
use crate::util::{deserialize_double_option, page_bounds, Page};

// ============================================================================
// Response Types
// ============================================================================

/// Officer role as embedded in user and member listings.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OfficerRoleSummary {
    pub role: OfficerRoleCode,
    pub name: &'static str,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
}

impl From<&OfficerRole> for OfficerRoleSummary {
    fn from(role: &OfficerRole) -> Self {
        Self {
            role: role.role,
            name: role.role.name(),
            start_date: role.start_date,
            end_date: role.end_date,
            is_active: role.is_active,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub symbolic_name: String,
    pub degree: i16,
    pub degree_name: &'static str,
    pub initiation_date: Option<NaiveDate>,
    pub passing_date: Option<NaiveDate>,
    pub raising_date: Option<NaiveDate>,
    pub phone_number: String,
    pub address: String,
    pub two_factor_enabled: bool,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub officer_role: Option<OfficerRoleSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserResponse {
    #[must_use]
    pub fn new(user: User, officer_role: Option<&OfficerRole>) -> Self {
        Self {
            id: user.id,
            degree_name: Degree::name_of(user.degree),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            symbolic_name: user.symbolic_name,
            degree: user.degree,
            initiation_date: user.initiation_date,
            passing_date: user.passing_date,
            raising_date: user.raising_date,
            phone_number: user.phone_number,
            address: user.address,
            two_factor_enabled: user.two_factor_enabled,
            is_active: user.is_active,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            officer_role: officer_role.map(OfficerRoleSummary::from),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Attach officer roles to a batch of users with one query.
pub async fn with_officer_roles(pool: &PgPool, users: Vec<User>) -> sqlx::Result<Vec<UserResponse>> {
    let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
    let roles = db::find_officer_roles(pool, &ids).await?;
    Ok(users
        .into_iter()
        .map(|user| {
            let role = roles.iter().find(|r| r.user_id == user.id);
            UserResponse::new(user, role)
        })
        .collect())
}

/// `users/me/` payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    /// Effective permission codenames.
    pub permissions: Vec<&'static str>,
    pub groups: Vec<String>,
    pub access: AccessContext,
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserListQuery {
    pub is_active: Option<bool>,
    pub degree: Option<i16>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub symbolic_name: String,
    #[validate(range(min = 1, max = 3))]
    #[serde(default = "default_degree")]
    pub degree: i16,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

const fn default_degree() -> i16 {
    1
}

/// Partial update. Degree, degree dates and account flags are staff-only.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 3, max = 150))]
    pub username: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub symbolic_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    #[validate(range(min = 1, max = 3))]
    pub degree: Option<i16>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub initiation_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub passing_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub raising_date: Option<Option<NaiveDate>>,
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
}

impl UpdateUserRequest {
    /// Whether the request touches fields only staff may change.
    #[must_use]
    pub const fn touches_privileged(&self) -> bool {
        self.degree.is_some()
            || self.initiation_date.is_some()
            || self.passing_date.is_some()
            || self.raising_date.is_some()
            || self.is_active.is_some()
            || self.is_staff.is_some()
            || self.is_superuser.is_some()
    }

    pub fn apply(self, user: &mut User) {
        if let Some(v) = self.username {
            user.username = v;
        }
        if let Some(v) = self.email {
            user.email = v;
        }
        if let Some(v) = self.first_name {
            user.first_name = v;
        }
        if let Some(v) = self.last_name {
            user.last_name = v;
        }
        if let Some(v) = self.symbolic_name {
            user.symbolic_name = v;
        }
        if let Some(v) = self.phone_number {
            user.phone_number = v;
        }
        if let Some(v) = self.address {
            user.address = v;
        }
        if let Some(v) = self.degree {
            user.degree = v;
        }
        if let Some(v) = self.initiation_date {
            user.initiation_date = v;
        }
        if let Some(v) = self.passing_date {
            user.passing_date = v;
        }
        if let Some(v) = self.raising_date {
            user.raising_date = v;
        }
        if let Some(v) = self.is_active {
            user.is_active = v;
        }
        if let Some(v) = self.is_staff {
            user.is_staff = v;
        }
        if let Some(v) = self.is_superuser {
            user.is_superuser = v;
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OfficerRoleRequest {
    pub role: OfficerRoleCode,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

// ============================================================================
// Handlers
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/auth/users/",
    tag = "users",
    params(UserListQuery),
    responses((status = 200, description = "Users", body = Page<UserResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<UserListQuery>,
) -> AuthResult<Json<Page<UserResponse>>> {
    let (limit, offset) = page_bounds(query.limit, query.offset);
    let filter = UserFilter {
        is_active: query.is_active,
        degree: query.degree,
        officer_role: None,
        search: query.search.as_deref(),
    };
    let rows = db::list_users(&state.db, &filter, "u.username", limit, offset).await?;
    let page = Page::from_counted(rows, limit, offset);

    let items = with_officer_roles(&state.db, page.items).await?;
    Ok(Json(Page {
        items,
        total: page.total,
        limit,
        offset,
    }))
}

/// Create a user and run the new-user cascade.
#[utoipa::path(
    post,
    path = "/api/auth/users/",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Staff only"),
        (status = 409, description = "Username or email taken"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(actor = %auth.id, username = %body.username))]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateUserRequest>,
) -> AuthResult<(StatusCode, Json<UserResponse>)> {
    auth.require_staff()?;
    if body.is_superuser {
        auth.require_superuser()?;
    }
    body.validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;
    validate_password_length(&body.password)?;

    if db::username_exists(&state.db, &body.username, None).await?
        || db::email_exists(&state.db, &body.email, None).await?
    {
        return Err(AuthError::UserAlreadyExists);
    }

    let password_hash = hash_password(&body.password).map_err(|_| AuthError::PasswordHash)?;

    let mut tx = state.db.begin().await?;
    let user = db::insert_user(
        &mut tx,
        &NewUser {
            username: &body.username,
            email: &body.email,
            password_hash: &password_hash,
            first_name: &body.first_name,
            last_name: &body.last_name,
            symbolic_name: &body.symbolic_name,
            degree: body.degree,
            phone_number: &body.phone_number,
            address: &body.address,
            is_staff: body.is_staff,
            is_superuser: body.is_superuser,
        },
    )
    .await?;
    cascade::on_user_created(&mut tx, user.id).await?;
    tx.commit().await?;

    let user = db::find_user_by_id(&state.db, user.id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    tracing::info!(user_id = %user.id, actor = %auth.id, "User created");
    Ok((StatusCode::CREATED, Json(UserResponse::new(user, None))))
}

async fn load_user_response(pool: &PgPool, id: Uuid) -> AuthResult<UserResponse> {
    let user = db::find_user_by_id(pool, id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    let role = db::find_officer_role(pool, id).await?;
    Ok(UserResponse::new(user, role.as_ref()))
}

#[utoipa::path(
    get,
    path = "/api/auth/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 404, description = "User not found"),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AuthResult<Json<UserResponse>> {
    Ok(Json(load_user_response(&state.db, id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/auth/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 403, description = "Not self or staff"),
        (status = 409, description = "Username or email taken"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(actor = %auth.id))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> AuthResult<Json<UserResponse>> {
    if auth.id != id || body.touches_privileged() {
        auth.require_staff()?;
    }
    if body.is_superuser.is_some() {
        auth.require_superuser()?;
    }
    body.validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;

    let mut user = db::find_user_by_id(&state.db, id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    if let Some(username) = &body.username {
        if db::username_exists(&state.db, username, Some(id)).await? {
            return Err(AuthError::UserAlreadyExists);
        }
    }
    if let Some(email) = &body.email {
        if db::email_exists(&state.db, email, Some(id)).await? {
            return Err(AuthError::UserAlreadyExists);
        }
    }

    body.apply(&mut user);
    let mut conn = state.db.acquire().await?;
    db::update_user(&mut conn, &user).await?;
    drop(conn);

    tracing::info!(user_id = %id, actor = %auth.id, "User updated");
    Ok(Json(load_user_response(&state.db, id).await?))
}

#[tracing::instrument(skip(state), fields(actor = %auth.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AuthResult<StatusCode> {
    auth.require_superuser()?;
    if !db::delete_user(&state.db, id).await? {
        return Err(AuthError::UserNotFound);
    }
    tracing::info!(user_id = %id, actor = %auth.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Current user with permissions and access context.
#[utoipa::path(
    get,
    path = "/api/auth/users/me/",
    tag = "users",
    responses((status = 200, description = "Current user", body = MeResponse)),
    security(("bearer_auth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AuthResult<Json<MeResponse>> {
    let user = load_user_response(&state.db, auth.id).await?;
    let groups = db::find_user_groups(&state.db, auth.id).await?;
    Ok(Json(MeResponse {
        user,
        permissions: auth.effective_permissions().codenames(),
        groups,
        access: auth.access(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/users/change_password/",
    tag = "users",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Old password does not match"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(user_id = %auth.id))]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ChangePasswordRequest>,
) -> AuthResult<Json<serde_json::Value>> {
    let user = db::find_user_by_id(&state.db, auth.id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    let matches =
        verify_password(&body.old_password, &user.password_hash).map_err(|_| AuthError::PasswordHash)?;
    if !matches {
        return Err(AuthError::Validation(
            "La contraseña actual es incorrecta.".to_string(),
        ));
    }
    validate_password_length(&body.new_password)?;

    let password_hash = hash_password(&body.new_password).map_err(|_| AuthError::PasswordHash)?;
    let mut conn = state.db.acquire().await?;
    db::update_user_password(&mut conn, user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");
    Ok(Json(json!({ "detail": "Contraseña actualizada correctamente." })))
}

// ============================================================================
// Officer role
// ============================================================================

pub async fn get_officer_role(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AuthResult<Json<OfficerRole>> {
    db::find_officer_role(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AuthError::NotFound("officer role".to_string()))
}

/// Assign or replace a user's officer role and apply the group cascade.
#[utoipa::path(
    put,
    path = "/api/auth/users/{id}/officer-role",
    tag = "users",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = OfficerRoleRequest,
    responses(
        (status = 200, description = "Role saved"),
        (status = 403, description = "Staff only"),
        (status = 404, description = "User not found"),
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(skip(state, body), fields(actor = %auth.id))]
pub async fn put_officer_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<OfficerRoleRequest>,
) -> AuthResult<Json<OfficerRole>> {
    auth.require_staff()?;
    if body.end_date.is_some_and(|end| end < body.start_date) {
        return Err(AuthError::Validation(
            "La fecha de fin no puede ser anterior a la de inicio.".to_string(),
        ));
    }
    if db::find_user_by_id(&state.db, id).await?.is_none() {
        return Err(AuthError::UserNotFound);
    }

    let mut tx = state.db.begin().await?;
    let role = db::upsert_officer_role(
        &mut tx,
        id,
        body.role,
        body.start_date,
        body.end_date,
        body.is_active,
    )
    .await?;
    cascade::on_officer_role_saved(&mut tx, id, role.role, role.is_active).await?;
    tx.commit().await?;

    tracing::info!(user_id = %id, role = role.role.code(), active = role.is_active, "Officer role saved");
    Ok(Json(role))
}

#[tracing::instrument(skip(state), fields(actor = %auth.id))]
pub async fn delete_officer_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AuthResult<StatusCode> {
    auth.require_staff()?;

    let mut tx = state.db.begin().await?;
    if !db::delete_officer_role(&mut tx, id).await? {
        return Err(AuthError::NotFound("officer role".to_string()));
    }
    cascade::on_officer_role_removed(&mut tx, id).await?;
    tx.commit().await?;

    tracing::info!(user_id = %id, "Officer role removed");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_edit_is_unprivileged() {
        let body: UpdateUserRequest =
            serde_json::from_str(r#"{"first_name": "Juan", "phone_number": "555"}"#).unwrap();
        assert!(!body.touches_privileged());
    }

    #[test]
    fn test_degree_or_dates_are_privileged() {
        let body: UpdateUserRequest = serde_json::from_str(r#"{"degree": 2}"#).unwrap();
        assert!(body.touches_privileged());

        let body: UpdateUserRequest =
            serde_json::from_str(r#"{"initiation_date": null}"#).unwrap();
        assert!(body.touches_privileged());
    }

    #[test]
    fn test_create_defaults_to_apprentice() {
        let body: CreateUserRequest = serde_json::from_str(
            r#"{"username": "hiram", "email": "hiram@example.org", "password": "secreto123"}"#,
        )
        .unwrap();
        assert_eq!(body.degree, 1);
        assert!(!body.is_staff);
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_create_rejects_bad_degree() {
        let body: CreateUserRequest = serde_json::from_str(
            r#"{"username": "hiram", "email": "hiram@example.org", "password": "x", "degree": 4}"#,
        )
        .unwrap();
        assert!(body.validate().is_err());
    }

    #[test]
    fn test_officer_role_defaults_active() {
        let body: OfficerRoleRequest =
            serde_json::from_str(r#"{"role": "TES", "start_date": "2025-01-01"}"#).unwrap();
        assert_eq!(body.role, OfficerRoleCode::Tes);
        assert!(body.is_active);
    }
}
