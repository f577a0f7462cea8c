//! Database Models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::permissions::{LodgePermissions, OfficerRoleCode};

/// User model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub symbolic_name: String,
    pub degree: i16,
    pub initiation_date: Option<NaiveDate>,
    pub passing_date: Option<NaiveDate>,
    pub raising_date: Option<NaiveDate>,
    pub phone_number: String,
    pub address: String,
    pub two_factor_enabled: bool,
    #[serde(skip_serializing)]
    pub totp_secret: Option<String>,
    pub totp_confirmed: bool,
    #[sqlx(try_from = "i64")]
    pub permissions: LodgePermissions,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// "First Last", falling back to the username.
    #[must_use]
    pub fn full_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
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

/// Officer role held by a user.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OfficerRole {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: OfficerRoleCode,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Session model (refresh token tracking).
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Password reset token model.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str, symbolic: &str) -> User {
        User {
            id: Uuid::new_v4(),
            username: "jperez".into(),
            email: "jperez@example.org".into(),
            password_hash: "hash".into(),
            first_name: first.into(),
            last_name: last.into(),
            symbolic_name: symbolic.into(),
            degree: 1,
            initiation_date: None,
            passing_date: None,
            raising_date: None,
            phone_number: String::new(),
            address: String::new(),
            two_factor_enabled: false,
            totp_secret: Some("secret".into()),
            totp_confirmed: false,
            permissions: LodgePermissions::BASIC,
            is_active: true,
            is_staff: false,
            is_superuser: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_name_falls_back_to_username() {
        assert_eq!(user("Juan", "Pérez", "").full_name(), "Juan Pérez");
        assert_eq!(user("", "", "").full_name(), "jperez");
    }

    #[test]
    fn test_display_name_prefers_symbolic_name() {
        assert_eq!(user("", "", "Hiram").display_name(), "Hiram");
        assert_eq!(user("", "", "").display_name(), "jperez");
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let json = serde_json::to_value(user("", "", "")).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("totp_secret").is_none());
        assert_eq!(json["permissions"], 7);
    }
}
