//! Permission cascade.
//!
//! Runs inside the caller's transaction whenever a user is created or their
//! officer role changes. Granted codenames are additive: removing a role drops
//! group membership but keeps codenames already granted.

use sqlx::PgConnection;
use uuid::Uuid;

use super::lodge::LodgePermissions;
use super::officer::OfficerRoleCode;
use crate::db::db_error;

/// Codenames a user holds after an officer-role save.
#[must_use]
pub const fn permissions_after_role_save(
    current: LodgePermissions,
    role: OfficerRoleCode,
    is_active: bool,
) -> LodgePermissions {
    if is_active {
        current.union(role.permissions())
    } else {
        current
    }
}

/// Add codenames to a user's direct grants.
pub async fn grant_permissions(
    conn: &mut PgConnection,
    user_id: Uuid,
    permissions: LodgePermissions,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE users SET permissions = permissions | $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(permissions.to_db())
        .execute(&mut *conn)
        .await
        .map_err(db_error!("grant_permissions", user_id = %user_id))?;
    Ok(())
}

/// New user: basic codenames and an empty member profile.
#[tracing::instrument(skip(conn))]
pub async fn on_user_created(conn: &mut PgConnection, user_id: Uuid) -> sqlx::Result<()> {
    grant_permissions(conn, user_id, LodgePermissions::BASIC).await?;

    sqlx::query("INSERT INTO member_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error!("create_member_profile", user_id = %user_id))?;

    tracing::debug!(user_id = %user_id, "Applied new-user permission cascade");
    Ok(())
}

/// Remove a user from every officer group.
pub async fn clear_officer_groups(conn: &mut PgConnection, user_id: Uuid) -> sqlx::Result<u64> {
    let result = sqlx::query(
        "DELETE FROM user_groups WHERE user_id = $1 AND group_name IN (SELECT name FROM officer_groups)",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await
    .map_err(db_error!("clear_officer_groups", user_id = %user_id))?;
    Ok(result.rows_affected())
}

/// Officer role assigned, updated or deactivated.
#[tracing::instrument(skip(conn))]
pub async fn on_officer_role_saved(
    conn: &mut PgConnection,
    user_id: Uuid,
    role: OfficerRoleCode,
    is_active: bool,
) -> sqlx::Result<()> {
    clear_officer_groups(conn, user_id).await?;

    if !is_active {
        tracing::info!(user_id = %user_id, role = role.code(), "Officer role inactive, groups cleared");
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO user_groups (user_id, group_name) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(role.name())
    .execute(&mut *conn)
    .await
    .map_err(db_error!("add_officer_group", user_id = %user_id, role = role.code()))?;

    grant_permissions(conn, user_id, role.permissions()).await?;

    tracing::info!(user_id = %user_id, role = role.code(), "Officer role cascade applied");
    Ok(())
}

/// Officer role deleted.
#[tracing::instrument(skip(conn))]
pub async fn on_officer_role_removed(conn: &mut PgConnection, user_id: Uuid) -> sqlx::Result<()> {
    let removed = clear_officer_groups(conn, user_id).await?;
    tracing::info!(user_id = %user_id, removed, "Officer role removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_role_adds_codenames() {
        let perms = permissions_after_role_save(
            LodgePermissions::BASIC,
            OfficerRoleCode::Sec,
            true,
        );
        assert!(perms.has(LodgePermissions::BASIC));
        assert!(perms.has(LodgePermissions::ADD_EVENT));
        assert!(perms.has(LodgePermissions::CHANGE_RITUALMINUTES));
    }

    #[test]
    fn test_inactive_role_grants_nothing() {
        let perms = permissions_after_role_save(
            LodgePermissions::BASIC,
            OfficerRoleCode::Tes,
            false,
        );
        assert_eq!(perms, LodgePermissions::BASIC);
    }

    #[test]
    fn test_role_change_keeps_previous_codenames() {
        let as_treasurer =
            permissions_after_role_save(LodgePermissions::BASIC, OfficerRoleCode::Tes, true);
        let as_master = permissions_after_role_save(as_treasurer, OfficerRoleCode::Vm, true);

        assert!(as_master.has(LodgePermissions::ADD_PAYMENT));
        assert!(as_master.has(LodgePermissions::APPROVE_RITUALPLAN));
    }
}
