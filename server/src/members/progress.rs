//! Degree promotion from progress records.
//!
//! A progress title names the ceremony it records. Titles mentioning an
//! initiation, passing or raising set the matching date on the member and
//! lift their degree.

use chrono::NaiveDate;

use crate::db::User;
use crate::permissions::Degree;

/// Degree ceremony recognised in a progress title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    Initiation,
    Passing,
    Raising,
}

impl Milestone {
    const fn degree(self) -> Degree {
        match self {
            Self::Initiation => Degree::Apprentice,
            Self::Passing => Degree::FellowCraft,
            Self::Raising => Degree::Master,
        }
    }
}

/// First matching milestone, checked in ceremony order.
#[must_use]
pub fn classify_title(title: &str) -> Option<Milestone> {
    let title = title.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| title.contains(w));

    if any(&["iniciación", "iniciado"]) {
        Some(Milestone::Initiation)
    } else if any(&["elevación", "elevado", "segundo grado"]) {
        Some(Milestone::Passing)
    } else if any(&["exaltación", "exaltado", "tercer grado"]) {
        Some(Milestone::Raising)
    } else {
        None
    }
}

/// Apply a progress record to a member. Returns whether the user changed.
///
/// The milestone date is set when empty or when the record predates it; the
/// degree is lifted together with the date and never lowered.
pub fn apply_progress(user: &mut User, title: &str, date: NaiveDate) -> bool {
    let Some(milestone) = classify_title(title) else {
        return false;
    };

    let slot = match milestone {
        Milestone::Initiation => &mut user.initiation_date,
        Milestone::Passing => &mut user.passing_date,
        Milestone::Raising => &mut user.raising_date,
    };

    if slot.is_some_and(|current| current <= date) {
        return false;
    }

    *slot = Some(date);
    user.degree = user.degree.max(milestone.degree().as_i16());
    true
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::permissions::LodgePermissions;

    fn member(degree: i16) -> User {
        User {
            id: Uuid::new_v4(),
            username: "hiram".into(),
            email: "hiram@example.org".into(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            symbolic_name: String::new(),
            degree,
            initiation_date: None,
            passing_date: None,
            raising_date: None,
            phone_number: String::new(),
            address: String::new(),
            two_factor_enabled: false,
            totp_secret: None,
            totp_confirmed: false,
            permissions: LodgePermissions::BASIC,
            is_active: true,
            is_staff: false,
            is_superuser: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_classify_title() {
        assert_eq!(classify_title("Ceremonia de Iniciación"), Some(Milestone::Initiation));
        assert_eq!(classify_title("Elevado al segundo grado"), Some(Milestone::Passing));
        assert_eq!(classify_title("EXALTACIÓN"), Some(Milestone::Raising));
        assert_eq!(classify_title("Paso al tercer grado"), Some(Milestone::Raising));
        assert_eq!(classify_title("Trabajo presentado"), None);
    }

    #[test]
    fn test_raising_promotes_to_master() {
        let mut user = member(2);
        assert!(apply_progress(&mut user, "Exaltación", date(2024, 6, 1)));
        assert_eq!(user.degree, 3);
        assert_eq!(user.raising_date, Some(date(2024, 6, 1)));
    }

    #[test]
    fn test_degree_never_lowered() {
        let mut user = member(3);
        assert!(apply_progress(&mut user, "Iniciación", date(2020, 1, 10)));
        assert_eq!(user.degree, 3);
        assert_eq!(user.initiation_date, Some(date(2020, 1, 10)));
    }

    #[test]
    fn test_earlier_date_replaces_later_one() {
        let mut user = member(2);
        user.passing_date = Some(date(2022, 3, 1));

        assert!(!apply_progress(&mut user, "Elevación", date(2023, 1, 1)));
        assert_eq!(user.passing_date, Some(date(2022, 3, 1)));

        assert!(apply_progress(&mut user, "Elevación", date(2021, 12, 1)));
        assert_eq!(user.passing_date, Some(date(2021, 12, 1)));
    }

    #[test]
    fn test_unrelated_title_changes_nothing() {
        let mut user = member(1);
        assert!(!apply_progress(&mut user, "Plancha sobre simbolismo", date(2024, 1, 1)));
        assert_eq!(user.degree, 1);
    }
}
