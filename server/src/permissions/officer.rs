//! Officer roles and their groups.

use serde::{Deserialize, Serialize};

use super::lodge::LodgePermissions;

/// Officer position held by a member. One per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum OfficerRoleCode {
    /// Venerable Maestro (Worshipful Master)
    Vm,
    /// Primer Vigilante (Senior Warden)
    Pv,
    /// Segundo Vigilante (Junior Warden)
    Sv,
    /// Secretario
    Sec,
    /// Tesorero
    Tes,
}

impl OfficerRoleCode {
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Vm, Self::Pv, Self::Sv, Self::Sec, Self::Tes]
    }

    /// Stored code, e.g. `"VM"`.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Vm => "VM",
            Self::Pv => "PV",
            Self::Sv => "SV",
            Self::Sec => "SEC",
            Self::Tes => "TES",
        }
    }

    /// Display name. Also the name of the role's officer group.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vm => "Venerable Maestro",
            Self::Pv => "Primer Vigilante",
            Self::Sv => "Segundo Vigilante",
            Self::Sec => "Secretario",
            Self::Tes => "Tesorero",
        }
    }

    /// Codenames granted when the role becomes active.
    #[must_use]
    pub const fn permissions(self) -> LodgePermissions {
        match self {
            Self::Vm => LodgePermissions::WORSHIPFUL_MASTER,
            Self::Pv | Self::Sv => LodgePermissions::WARDEN,
            Self::Sec => LodgePermissions::SECRETARY,
            Self::Tes => LodgePermissions::TREASURER,
        }
    }

    #[must_use]
    pub const fn is_warden(self) -> bool {
        matches!(self, Self::Pv | Self::Sv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_serde() {
        for role in OfficerRoleCode::all() {
            let json = serde_json::to_string(role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.code()));
        }
    }

    #[test]
    fn test_group_names_are_unique() {
        let mut names: Vec<_> = OfficerRoleCode::all().iter().map(|r| r.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn test_wardens_share_permissions() {
        assert_eq!(
            OfficerRoleCode::Pv.permissions(),
            OfficerRoleCode::Sv.permissions()
        );
        assert!(OfficerRoleCode::Pv.is_warden());
        assert!(!OfficerRoleCode::Vm.is_warden());
    }

    #[test]
    fn test_treasurer_grants_payment_permissions() {
        let perms = OfficerRoleCode::Tes.permissions();
        assert!(perms.has(LodgePermissions::ADD_PAYMENT));
        assert!(!perms.has(LodgePermissions::ADD_EVENT));
    }
}
