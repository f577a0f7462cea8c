//! Lodge permission codenames using bitflags.
//!
//! Each flag corresponds to one permission codename (e.g. `add_payment`).
//! A user's direct grants are stored as a BIGINT on the `users` row.
//!
//! Bit layout:
//! - Basic (bits 0-2): granted to every new user
//! - Rituals (bits 3-6)
//! - Oversight (bits 7-9): logs and financial reports
//! - Secretariat (bits 10-22): members, notices, events, library, minutes
//! - Treasury (bits 23-33)

use bitflags::bitflags;

bitflags! {
    /// Lodge permissions represented as a 64-bit bitfield.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    pub struct LodgePermissions: u64 {
        // === Basic (bits 0-2) ===
        const VIEW_MEMBERPROFILE     = 1 << 0;
        const VIEW_EVENT             = 1 << 1;
        const VIEW_NOTIFICATION      = 1 << 2;

        // === Rituals (bits 3-6) ===
        const ADD_RITUALPLAN         = 1 << 3;
        const CHANGE_RITUALPLAN      = 1 << 4;
        const DELETE_RITUALPLAN      = 1 << 5;
        /// Approve ritual plans and ritual minutes
        const APPROVE_RITUALPLAN     = 1 << 6;

        // === Oversight (bits 7-9) ===
        const VIEW_SYSTEMLOG         = 1 << 7;
        const VIEW_ERRORLOG          = 1 << 8;
        const VIEW_FINANCIALREPORT   = 1 << 9;

        // === Secretariat (bits 10-22) ===
        const ADD_MEMBERPROFILE      = 1 << 10;
        const CHANGE_MEMBERPROFILE   = 1 << 11;
        const ADD_NOTIFICATION       = 1 << 12;
        const CHANGE_NOTIFICATION    = 1 << 13;
        const DELETE_NOTIFICATION    = 1 << 14;
        const ADD_EVENT              = 1 << 15;
        const CHANGE_EVENT           = 1 << 16;
        const DELETE_EVENT           = 1 << 17;
        const ADD_DOCUMENT           = 1 << 18;
        const CHANGE_DOCUMENT        = 1 << 19;
        const ADD_RITUALMINUTES      = 1 << 20;
        const CHANGE_RITUALMINUTES   = 1 << 21;

        // === Treasury (bits 23-33) ===
        const ADD_FEE                = 1 << 23;
        const CHANGE_FEE             = 1 << 24;
        const DELETE_FEE             = 1 << 25;
        const ADD_PAYMENT            = 1 << 26;
        const CHANGE_PAYMENT         = 1 << 27;
        const DELETE_PAYMENT         = 1 << 28;
        const ADD_INVOICE            = 1 << 29;
        const CHANGE_INVOICE         = 1 << 30;
        const ADD_FINANCIALREPORT    = 1 << 31;
        const CHANGE_FINANCIALREPORT = 1 << 32;
    }
}

/// Codename of every flag, in bit order.
const CODENAMES: &[(LodgePermissions, &str)] = &[
    (LodgePermissions::VIEW_MEMBERPROFILE, "view_memberprofile"),
    (LodgePermissions::VIEW_EVENT, "view_event"),
    (LodgePermissions::VIEW_NOTIFICATION, "view_notification"),
    (LodgePermissions::ADD_RITUALPLAN, "add_ritualplan"),
    (LodgePermissions::CHANGE_RITUALPLAN, "change_ritualplan"),
    (LodgePermissions::DELETE_RITUALPLAN, "delete_ritualplan"),
    (LodgePermissions::APPROVE_RITUALPLAN, "approve_ritualplan"),
    (LodgePermissions::VIEW_SYSTEMLOG, "view_systemlog"),
    (LodgePermissions::VIEW_ERRORLOG, "view_errorlog"),
    (LodgePermissions::VIEW_FINANCIALREPORT, "view_financialreport"),
    (LodgePermissions::ADD_MEMBERPROFILE, "add_memberprofile"),
    (LodgePermissions::CHANGE_MEMBERPROFILE, "change_memberprofile"),
    (LodgePermissions::ADD_NOTIFICATION, "add_notification"),
    (LodgePermissions::CHANGE_NOTIFICATION, "change_notification"),
    (LodgePermissions::DELETE_NOTIFICATION, "delete_notification"),
    (LodgePermissions::ADD_EVENT, "add_event"),
    (LodgePermissions::CHANGE_EVENT, "change_event"),
    (LodgePermissions::DELETE_EVENT, "delete_event"),
    (LodgePermissions::ADD_DOCUMENT, "add_document"),
    (LodgePermissions::CHANGE_DOCUMENT, "change_document"),
    (LodgePermissions::ADD_RITUALMINUTES, "add_ritualminutes"),
    (LodgePermissions::CHANGE_RITUALMINUTES, "change_ritualminutes"),
    (LodgePermissions::ADD_FEE, "add_fee"),
    (LodgePermissions::CHANGE_FEE, "change_fee"),
    (LodgePermissions::DELETE_FEE, "delete_fee"),
    (LodgePermissions::ADD_PAYMENT, "add_payment"),
    (LodgePermissions::CHANGE_PAYMENT, "change_payment"),
    (LodgePermissions::DELETE_PAYMENT, "delete_payment"),
    (LodgePermissions::ADD_INVOICE, "add_invoice"),
    (LodgePermissions::CHANGE_INVOICE, "change_invoice"),
    (LodgePermissions::ADD_FINANCIALREPORT, "add_financialreport"),
    (LodgePermissions::CHANGE_FINANCIALREPORT, "change_financialreport"),
];

impl LodgePermissions {
    // === Preset Combinations ===

    /// Granted to every user on creation.
    pub const BASIC: Self = Self::VIEW_MEMBERPROFILE
        .union(Self::VIEW_EVENT)
        .union(Self::VIEW_NOTIFICATION);

    /// Venerable Maestro.
    pub const WORSHIPFUL_MASTER: Self = Self::ADD_RITUALPLAN
        .union(Self::CHANGE_RITUALPLAN)
        .union(Self::DELETE_RITUALPLAN)
        .union(Self::APPROVE_RITUALPLAN)
        .union(Self::VIEW_SYSTEMLOG)
        .union(Self::VIEW_ERRORLOG)
        .union(Self::VIEW_FINANCIALREPORT);

    /// Primer and Segundo Vigilante.
    pub const WARDEN: Self = Self::ADD_RITUALPLAN
        .union(Self::CHANGE_RITUALPLAN)
        .union(Self::VIEW_MEMBERPROFILE);

    /// Secretario.
    pub const SECRETARY: Self = Self::ADD_MEMBERPROFILE
        .union(Self::CHANGE_MEMBERPROFILE)
        .union(Self::ADD_NOTIFICATION)
        .union(Self::CHANGE_NOTIFICATION)
        .union(Self::DELETE_NOTIFICATION)
        .union(Self::ADD_EVENT)
        .union(Self::CHANGE_EVENT)
        .union(Self::DELETE_EVENT)
        .union(Self::ADD_DOCUMENT)
        .union(Self::CHANGE_DOCUMENT)
        .union(Self::ADD_RITUALMINUTES)
        .union(Self::CHANGE_RITUALMINUTES);

    /// Tesorero.
    pub const TREASURER: Self = Self::ADD_FEE
        .union(Self::CHANGE_FEE)
        .union(Self::DELETE_FEE)
        .union(Self::ADD_PAYMENT)
        .union(Self::CHANGE_PAYMENT)
        .union(Self::DELETE_PAYMENT)
        .union(Self::ADD_INVOICE)
        .union(Self::CHANGE_INVOICE)
        .union(Self::ADD_FINANCIALREPORT)
        .union(Self::CHANGE_FINANCIALREPORT);

    // === Database Conversion ===

    /// Create permissions from a database BIGINT value, ignoring unknown bits.
    #[must_use]
    pub const fn from_db(value: i64) -> Self {
        Self::from_bits_truncate(value as u64)
    }

    /// Convert permissions to a database BIGINT value.
    #[must_use]
    pub const fn to_db(self) -> i64 {
        self.bits() as i64
    }

    // === Permission Checking ===

    /// Check if this permission set includes the specified permission(s).
    ///
    /// # Examples
    ///
    /// ```
    /// use lodge_server::permissions::LodgePermissions;
    ///
    /// let perms = LodgePermissions::BASIC;
    /// assert!(perms.has(LodgePermissions::VIEW_EVENT));
    /// assert!(!perms.has(LodgePermissions::ADD_EVENT));
    /// ```
    #[must_use]
    pub const fn has(self, permission: Self) -> bool {
        self.contains(permission)
    }

    // === Codenames ===

    /// Codename of a single flag, `None` for combinations or empty sets.
    #[must_use]
    pub fn codename(self) -> Option<&'static str> {
        CODENAMES
            .iter()
            .find(|(flag, _)| *flag == self)
            .map(|(_, name)| *name)
    }

    /// Look up a flag by codename.
    #[must_use]
    pub fn from_codename(name: &str) -> Option<Self> {
        CODENAMES
            .iter()
            .find(|(_, codename)| *codename == name)
            .map(|(flag, _)| *flag)
    }

    /// Sorted codenames of every flag in this set.
    #[must_use]
    pub fn codenames(self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = CODENAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        names.sort_unstable();
        names
    }
}

impl Default for LodgePermissions {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<i64> for LodgePermissions {
    fn from(value: i64) -> Self {
        Self::from_db(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_flag_has_a_codename() {
        for flag in LodgePermissions::all().iter() {
            assert!(flag.codename().is_some(), "missing codename for {flag:?}");
        }
        assert_eq!(CODENAMES.len(), LodgePermissions::all().iter().count());
    }

    #[test]
    fn test_codename_lookup_is_symmetric() {
        for (flag, name) in CODENAMES {
            assert_eq!(LodgePermissions::from_codename(name), Some(*flag));
            assert_eq!(flag.codename(), Some(*name));
        }
        assert_eq!(LodgePermissions::from_codename("fly"), None);
    }

    #[test]
    fn test_basic_codenames() {
        assert_eq!(
            LodgePermissions::BASIC.codenames(),
            vec!["view_event", "view_memberprofile", "view_notification"]
        );
    }

    #[test]
    fn test_worshipful_master_preset() {
        let vm = LodgePermissions::WORSHIPFUL_MASTER;
        assert!(vm.has(LodgePermissions::APPROVE_RITUALPLAN));
        assert!(vm.has(LodgePermissions::VIEW_FINANCIALREPORT));
        assert!(!vm.has(LodgePermissions::ADD_PAYMENT));
        assert_eq!(vm.codenames().len(), 7);
    }

    #[test]
    fn test_warden_preset_cannot_delete_or_approve() {
        let warden = LodgePermissions::WARDEN;
        assert!(warden.has(LodgePermissions::ADD_RITUALPLAN | LodgePermissions::CHANGE_RITUALPLAN));
        assert!(!warden.has(LodgePermissions::DELETE_RITUALPLAN));
        assert!(!warden.has(LodgePermissions::APPROVE_RITUALPLAN));
    }

    #[test]
    fn test_secretary_and_treasurer_are_disjoint() {
        assert!(!LodgePermissions::SECRETARY.intersects(LodgePermissions::TREASURER));
        assert_eq!(LodgePermissions::SECRETARY.codenames().len(), 12);
        assert_eq!(LodgePermissions::TREASURER.codenames().len(), 10);
    }

    #[test]
    fn test_high_bit_survives_db_roundtrip() {
        let perms = LodgePermissions::CHANGE_FINANCIALREPORT | LodgePermissions::VIEW_EVENT;
        assert_eq!(LodgePermissions::from_db(perms.to_db()), perms);
    }

    #[test]
    fn test_from_db_truncates_unknown_bits() {
        let perms = LodgePermissions::from_db(i64::MIN | 1);
        assert_eq!(perms, LodgePermissions::VIEW_MEMBERPROFILE);
    }

    #[test]
    fn test_serializes_as_integer() {
        let json = serde_json::to_string(&LodgePermissions::VIEW_EVENT).unwrap();
        assert_eq!(json, "2");
    }
}
