//! Request-level access checks.
//!
//! Handlers call these on the authenticated user before touching the
//! database. Superusers pass every guard.

use serde::Serialize;
use thiserror::Error;

use super::degree::Degree;
use super::lodge::LodgePermissions;
use super::officer::OfficerRoleCode;
use crate::auth::AuthUser;

/// Permission check errors. Every variant maps to 403.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("Missing permission: {}", .0.codenames().join(", "))]
    MissingPermission(LodgePermissions),

    #[error("Requires degree {} ({})", .0.as_i16(), .0.name())]
    DegreeRequired(Degree),

    #[error("Requires an active officer role")]
    OfficerRequired,

    #[error("Requires officer role: {0}")]
    RoleRequired(String),

    #[error("Requires staff privileges")]
    StaffRequired,

    #[error("Requires superuser privileges")]
    SuperuserRequired,

    #[error("Access forbidden")]
    Forbidden,
}

/// Degree and officer flags computed for the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct AccessContext {
    pub can_view_master_content: bool,
    pub can_view_fellow_content: bool,
    pub is_officer: bool,
    pub is_worshipful_master: bool,
    pub is_warden: bool,
    pub is_secretary: bool,
    pub is_treasurer: bool,
}

impl AccessContext {
    /// Build the context from a degree and the active officer role, if any.
    #[must_use]
    pub const fn new(degree: i16, officer_role: Option<OfficerRoleCode>) -> Self {
        Self {
            can_view_master_content: degree >= Degree::Master.as_i16(),
            can_view_fellow_content: degree >= Degree::FellowCraft.as_i16(),
            is_officer: officer_role.is_some(),
            is_worshipful_master: matches!(officer_role, Some(OfficerRoleCode::Vm)),
            is_warden: matches!(officer_role, Some(OfficerRoleCode::Pv | OfficerRoleCode::Sv)),
            is_secretary: matches!(officer_role, Some(OfficerRoleCode::Sec)),
            is_treasurer: matches!(officer_role, Some(OfficerRoleCode::Tes)),
        }
    }
}

impl AuthUser {
    /// Degree, officer and role flags for this user.
    #[must_use]
    pub const fn access(&self) -> AccessContext {
        AccessContext::new(self.degree, self.officer_role)
    }

    /// Direct grants, or every permission for superusers.
    #[must_use]
    pub const fn effective_permissions(&self) -> LodgePermissions {
        if self.is_superuser {
            LodgePermissions::all()
        } else {
            self.permissions
        }
    }

    #[must_use]
    pub const fn has_permission(&self, permission: LodgePermissions) -> bool {
        self.effective_permissions().has(permission)
    }

    /// Whether the user may see content gated at `required` degree.
    #[must_use]
    pub const fn can_see_degree(&self, required: i16) -> bool {
        self.is_superuser || self.degree >= required
    }

    /// Highest `required_degree` the user may list, `None` for superusers.
    #[must_use]
    pub const fn degree_ceiling(&self) -> Option<i16> {
        if self.is_superuser {
            None
        } else {
            Some(self.degree)
        }
    }

    /// Whether the user holds one of `roles` as their active officer role.
    #[must_use]
    pub fn holds_role(&self, roles: &[OfficerRoleCode]) -> bool {
        self.is_superuser || self.officer_role.is_some_and(|r| roles.contains(&r))
    }

    #[must_use]
    pub const fn is_staff_or_superuser(&self) -> bool {
        self.is_staff || self.is_superuser
    }

    pub const fn require_permission(
        &self,
        permission: LodgePermissions,
    ) -> Result<(), PermissionError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(PermissionError::MissingPermission(permission))
        }
    }

    pub const fn require_degree(&self, degree: Degree) -> Result<(), PermissionError> {
        if self.can_see_degree(degree.as_i16()) {
            Ok(())
        } else {
            Err(PermissionError::DegreeRequired(degree))
        }
    }

    pub const fn require_officer(&self) -> Result<(), PermissionError> {
        if self.is_superuser || self.officer_role.is_some() {
            Ok(())
        } else {
            Err(PermissionError::OfficerRequired)
        }
    }

    pub fn require_role(&self, roles: &[OfficerRoleCode]) -> Result<(), PermissionError> {
        if self.holds_role(roles) {
            Ok(())
        } else {
            let names: Vec<_> = roles.iter().map(|r| r.name()).collect();
            Err(PermissionError::RoleRequired(names.join(" / ")))
        }
    }

    pub const fn require_staff(&self) -> Result<(), PermissionError> {
        if self.is_staff_or_superuser() {
            Ok(())
        } else {
            Err(PermissionError::StaffRequired)
        }
    }

    pub const fn require_superuser(&self) -> Result<(), PermissionError> {
        if self.is_superuser {
            Ok(())
        } else {
            Err(PermissionError::SuperuserRequired)
        }
    }

    /// Require the Worshipful Master role.
    pub fn require_worshipful_master(&self) -> Result<(), PermissionError> {
        self.require_role(&[OfficerRoleCode::Vm])
    }

    /// Require the treasurer role or `permission`.
    pub fn require_treasurer_or(&self, permission: LodgePermissions) -> Result<(), PermissionError> {
        if self.holds_role(&[OfficerRoleCode::Tes]) || self.has_permission(permission) {
            Ok(())
        } else {
            Err(PermissionError::MissingPermission(permission))
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn member(degree: i16, officer_role: Option<OfficerRoleCode>) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            username: "hermano".into(),
            email: "hermano@example.org".into(),
            first_name: String::new(),
            last_name: String::new(),
            symbolic_name: String::new(),
            degree,
            is_staff: false,
            is_superuser: false,
            two_factor_enabled: false,
            permissions: LodgePermissions::BASIC,
            officer_role,
        }
    }

    #[test]
    fn test_access_context_for_apprentice() {
        let ctx = AccessContext::new(1, None);
        assert!(!ctx.can_view_fellow_content);
        assert!(!ctx.can_view_master_content);
        assert!(!ctx.is_officer);
    }

    #[test]
    fn test_access_context_for_warden() {
        let ctx = AccessContext::new(3, Some(OfficerRoleCode::Sv));
        assert!(ctx.can_view_master_content);
        assert!(ctx.is_officer);
        assert!(ctx.is_warden);
        assert!(!ctx.is_worshipful_master);
    }

    #[test]
    fn test_degree_guard() {
        let fellow = member(2, None);
        assert!(fellow.require_degree(Degree::FellowCraft).is_ok());
        assert_eq!(
            fellow.require_degree(Degree::Master),
            Err(PermissionError::DegreeRequired(Degree::Master))
        );
    }

    #[test]
    fn test_permission_guard() {
        let user = member(3, None);
        assert!(user.require_permission(LodgePermissions::VIEW_EVENT).is_ok());
        assert!(user.require_permission(LodgePermissions::ADD_EVENT).is_err());
    }

    #[test]
    fn test_role_guard() {
        let treasurer = member(3, Some(OfficerRoleCode::Tes));
        assert!(treasurer.require_role(&[OfficerRoleCode::Tes]).is_ok());
        assert!(treasurer.require_worshipful_master().is_err());
        assert!(treasurer.require_officer().is_ok());
        assert!(member(3, None).require_officer().is_err());
    }

    #[test]
    fn test_treasurer_or_permission() {
        let treasurer = member(3, Some(OfficerRoleCode::Tes));
        assert!(treasurer
            .require_treasurer_or(LodgePermissions::VIEW_FINANCIALREPORT)
            .is_ok());

        let mut master = member(3, Some(OfficerRoleCode::Vm));
        assert!(master
            .require_treasurer_or(LodgePermissions::VIEW_FINANCIALREPORT)
            .is_err());
        master.permissions |= LodgePermissions::WORSHIPFUL_MASTER;
        assert!(master
            .require_treasurer_or(LodgePermissions::VIEW_FINANCIALREPORT)
            .is_ok());
    }

    #[test]
    fn test_superuser_passes_every_guard() {
        let mut admin = member(1, None);
        admin.is_superuser = true;
        admin.permissions = LodgePermissions::empty();

        assert!(admin.require_degree(Degree::Master).is_ok());
        assert!(admin.require_permission(LodgePermissions::DELETE_PAYMENT).is_ok());
        assert!(admin.require_officer().is_ok());
        assert!(admin.require_worshipful_master().is_ok());
        assert!(admin.require_staff().is_ok());
        assert!(admin.can_see_degree(3));
    }

    #[test]
    fn test_missing_permission_message_lists_codenames() {
        let err = PermissionError::MissingPermission(LodgePermissions::ADD_FEE);
        assert_eq!(err.to_string(), "Missing permission: add_fee");
    }
}
