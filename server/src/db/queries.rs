//! Database Queries
//!
//! Runtime queries (no compile-time `DATABASE_URL` required).
//!
//! All query functions include error context logging to aid debugging.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::db_error;
use super::models::{OfficerRole, PasswordResetToken, Session, User};
use crate::permissions::OfficerRoleCode;
use crate::util::{push_page, push_search, Counted};

// ============================================================================
// User Queries
// ============================================================================

/// Find user by ID.
pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_user_by_id", user_id = %id))
}

/// Find user by username.
pub async fn find_user_by_username(pool: &PgPool, username: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_user_by_username", username = %username))
}

/// Find user by email (case-insensitive).
pub async fn find_user_by_email(pool: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_user_by_email"))
}

/// Check if a username is taken by anyone other than `exclude`.
pub async fn username_exists(
    pool: &PgPool,
    username: &str,
    exclude: Option<Uuid>,
) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND ($2::uuid IS NULL OR id <> $2))",
    )
    .bind(username)
    .bind(exclude)
    .fetch_one(pool)
    .await
    .map_err(db_error!("username_exists", username = %username))
}

/// Check if an email is taken by anyone other than `exclude`.
pub async fn email_exists(pool: &PgPool, email: &str, exclude: Option<Uuid>) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower($1) AND ($2::uuid IS NULL OR id <> $2))",
    )
    .bind(email)
    .bind(exclude)
    .fetch_one(pool)
    .await
    .map_err(db_error!("email_exists"))
}

/// Fields for a new user row.
#[derive(Debug, Clone, Default)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub symbolic_name: &'a str,
    pub degree: i16,
    pub phone_number: &'a str,
    pub address: &'a str,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Insert a user. Callers run the new-user cascade in the same transaction.
pub async fn insert_user(conn: &mut PgConnection, new: &NewUser<'_>) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(
        r"
        INSERT INTO users (username, email, password_hash, first_name, last_name, symbolic_name,
                           degree, phone_number, address, is_staff, is_superuser)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        ",
    )
    .bind(new.username)
    .bind(new.email)
    .bind(new.password_hash)
    .bind(new.first_name)
    .bind(new.last_name)
    .bind(new.symbolic_name)
    .bind(new.degree)
    .bind(new.phone_number)
    .bind(new.address)
    .bind(new.is_staff)
    .bind(new.is_superuser)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("insert_user", username = %new.username))
}

/// Replace a user's password hash.
pub async fn update_user_password(
    conn: &mut PgConnection,
    user_id: Uuid,
    password_hash: &str,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(password_hash)
        .execute(&mut *conn)
        .await
        .map_err(db_error!("update_user_password", user_id = %user_id))?;
    Ok(())
}

/// Store a new, unconfirmed TOTP secret. Any previous secret is discarded.
pub async fn set_pending_totp_secret(
    pool: &PgPool,
    user_id: Uuid,
    secret: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE users SET totp_secret = $2, totp_confirmed = FALSE, updated_at = NOW() WHERE id = $1",
    )
    .bind(user_id)
    .bind(secret)
    .execute(pool)
    .await
    .map_err(db_error!("set_pending_totp_secret", user_id = %user_id))?;
    Ok(())
}

/// Mark the stored TOTP secret as confirmed and enable two-factor login.
pub async fn confirm_totp(pool: &PgPool, user_id: Uuid) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE users SET totp_confirmed = TRUE, two_factor_enabled = TRUE, updated_at = NOW() WHERE id = $1",
    )
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(db_error!("confirm_totp", user_id = %user_id))?;
    Ok(())
}

/// Remove the TOTP secret and disable two-factor login.
pub async fn disable_totp(pool: &PgPool, user_id: Uuid) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE users
        SET totp_secret = NULL, totp_confirmed = FALSE, two_factor_enabled = FALSE, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(db_error!("disable_totp", user_id = %user_id))?;
    Ok(())
}

/// Delete a user. Returns whether a row was removed.
pub async fn delete_user(pool: &PgPool, user_id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_user", user_id = %user_id))?;
    Ok(result.rows_affected() > 0)
}

/// Filters for listing users.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserFilter<'a> {
    pub is_active: Option<bool>,
    pub degree: Option<i16>,
    /// Only users holding this role actively.
    pub officer_role: Option<OfficerRoleCode>,
    /// Matches username, symbolic name, first and last name or email.
    pub search: Option<&'a str>,
}

/// List users with filters. `order_by` is a fixed column list.
pub async fn list_users(
    pool: &PgPool,
    filter: &UserFilter<'_>,
    order_by: &'static str,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Counted<User>>> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT u.*, COUNT(*) OVER() AS total_count FROM users u WHERE 1=1");

    if let Some(is_active) = filter.is_active {
        builder.push(" AND u.is_active = ").push_bind(is_active);
    }
    if let Some(degree) = filter.degree {
        builder.push(" AND u.degree = ").push_bind(degree);
    }
    if let Some(role) = filter.officer_role {
        builder
            .push(" AND EXISTS (SELECT 1 FROM officer_roles r WHERE r.user_id = u.id AND r.is_active AND r.role = ")
            .push_bind(role)
            .push(")");
    }
    push_search(
        &mut builder,
        &["u.username", "u.symbolic_name", "u.first_name", "u.last_name", "u.email"],
        filter.search,
    );

    builder.push(" ORDER BY ").push(order_by);
    push_page(&mut builder, limit, offset);

    builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(db_error!("list_users"))
}

/// Write back every editable column of a user row.
pub async fn update_user(conn: &mut PgConnection, user: &User) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(
        r"
        UPDATE users SET
            username = $2, email = $3, first_name = $4, last_name = $5, symbolic_name = $6,
            degree = $7, initiation_date = $8, passing_date = $9, raising_date = $10,
            phone_number = $11, address = $12, is_active = $13, is_staff = $14,
            is_superuser = $15, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        ",
    )
    .bind(user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.symbolic_name)
    .bind(user.degree)
    .bind(user.initiation_date)
    .bind(user.passing_date)
    .bind(user.raising_date)
    .bind(&user.phone_number)
    .bind(&user.address)
    .bind(user.is_active)
    .bind(user.is_staff)
    .bind(user.is_superuser)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("update_user", user_id = %user.id))
}

/// Names of the groups a user belongs to.
pub async fn find_user_groups(pool: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT group_name FROM user_groups WHERE user_id = $1 ORDER BY group_name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(db_error!("find_user_groups", user_id = %user_id))
}

// ============================================================================
// Officer Role Queries
// ============================================================================

/// Find the officer role of a user, active or not.
pub async fn find_officer_role(pool: &PgPool, user_id: Uuid) -> sqlx::Result<Option<OfficerRole>> {
    sqlx::query_as::<_, OfficerRole>("SELECT * FROM officer_roles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(db_error!("find_officer_role", user_id = %user_id))
}

/// Officer roles of several users at once.
pub async fn find_officer_roles(pool: &PgPool, user_ids: &[Uuid]) -> sqlx::Result<Vec<OfficerRole>> {
    sqlx::query_as::<_, OfficerRole>("SELECT * FROM officer_roles WHERE user_id = ANY($1)")
        .bind(user_ids)
        .fetch_all(pool)
        .await
        .map_err(db_error!("find_officer_roles", count = user_ids.len()))
}

/// Active officer role code of a user.
pub async fn find_active_officer_role(
    pool: &PgPool,
    user_id: Uuid,
) -> sqlx::Result<Option<OfficerRoleCode>> {
    sqlx::query_scalar::<_, OfficerRoleCode>(
        "SELECT role FROM officer_roles WHERE user_id = $1 AND is_active",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(db_error!("find_active_officer_role", user_id = %user_id))
}

/// Create or replace the officer role of a user.
pub async fn upsert_officer_role(
    conn: &mut PgConnection,
    user_id: Uuid,
    role: OfficerRoleCode,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    is_active: bool,
) -> sqlx::Result<OfficerRole> {
    sqlx::query_as::<_, OfficerRole>(
        r"
        INSERT INTO officer_roles (user_id, role, start_date, end_date, is_active)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id) DO UPDATE
        SET role = EXCLUDED.role,
            start_date = EXCLUDED.start_date,
            end_date = EXCLUDED.end_date,
            is_active = EXCLUDED.is_active,
            updated_at = NOW()
        RETURNING *
        ",
    )
    .bind(user_id)
    .bind(role)
    .bind(start_date)
    .bind(end_date)
    .bind(is_active)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error!("upsert_officer_role", user_id = %user_id))
}

/// Delete the officer role of a user. Returns whether a row was removed.
pub async fn delete_officer_role(conn: &mut PgConnection, user_id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM officer_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error!("delete_officer_role", user_id = %user_id))?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Session Queries
// ============================================================================

/// Create a new session (for refresh token tracking).
pub async fn create_session(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> sqlx::Result<Session> {
    sqlx::query_as::<_, Session>(
        r"
        INSERT INTO sessions (user_id, token_hash, expires_at, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        ",
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .bind(ip_address)
    .bind(user_agent)
    .fetch_one(pool)
    .await
    .map_err(db_error!("create_session", user_id = %user_id))
}

/// Find a live session by token hash.
pub async fn find_session_by_token_hash(
    pool: &PgPool,
    token_hash: &str,
) -> sqlx::Result<Option<Session>> {
    sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE token_hash = $1 AND expires_at > NOW()",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await
    .map_err(db_error!("find_session_by_token_hash"))
}

/// Delete a session by ID.
pub async fn delete_session(pool: &PgPool, session_id: Uuid) -> sqlx::Result<()> {
    sqlx::query("DELETE FROM sessions WHERE id = $1")
        .bind(session_id)
        .execute(pool)
        .await
        .map_err(db_error!("delete_session", session_id = %session_id))?;
    Ok(())
}

/// Delete a session by token hash. Returns whether a row was removed.
pub async fn delete_session_by_token_hash(pool: &PgPool, token_hash: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
        .bind(token_hash)
        .execute(pool)
        .await
        .map_err(db_error!("delete_session_by_token_hash"))?;
    Ok(result.rows_affected() > 0)
}

/// Delete all sessions for a user (logout everywhere).
pub async fn delete_all_user_sessions(conn: &mut PgConnection, user_id: Uuid) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error!("delete_all_user_sessions", user_id = %user_id))?;
    Ok(result.rows_affected())
}

// ============================================================================
// Password Reset Token Queries
// ============================================================================

/// Create a password reset token.
pub async fn create_password_reset_token(
    pool: &PgPool,
    user_id: Uuid,
    token_hash: &str,
    expires_at: DateTime<Utc>,
) -> sqlx::Result<PasswordResetToken> {
    sqlx::query_as::<_, PasswordResetToken>(
        r"
        INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
        VALUES ($1, $2, $3)
        RETURNING *
        ",
    )
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .fetch_one(pool)
    .await
    .map_err(db_error!("create_password_reset_token", user_id = %user_id))
}

/// Find a valid (unused, non-expired) password reset token by its hash.
pub async fn find_valid_reset_token(
    pool: &PgPool,
    token_hash: &str,
) -> sqlx::Result<Option<PasswordResetToken>> {
    sqlx::query_as::<_, PasswordResetToken>(
        "SELECT * FROM password_reset_tokens WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW()",
    )
    .bind(token_hash)
    .fetch_optional(pool)
    .await
    .map_err(db_error!("find_valid_reset_token"))
}

/// Mark a password reset token as used.
///
/// Returns `false` when another request consumed it first.
pub async fn mark_reset_token_used(conn: &mut PgConnection, token_id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "UPDATE password_reset_tokens SET used_at = NOW() WHERE id = $1 AND used_at IS NULL",
    )
    .bind(token_id)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("mark_reset_token_used", token_id = %token_id))?;
    Ok(result.rows_affected() > 0)
}

/// Invalidate all unused password reset tokens for a user.
pub async fn invalidate_user_reset_tokens(pool: &PgPool, user_id: Uuid) -> sqlx::Result<u64> {
    let result = sqlx::query(
        "UPDATE password_reset_tokens SET used_at = NOW() WHERE user_id = $1 AND used_at IS NULL",
    )
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(db_error!("invalidate_user_reset_tokens", user_id = %user_id))?;
    Ok(result.rows_affected())
}
