//! Masonic degrees.

use serde::{Deserialize, Serialize};

/// Degree held by a member. Stored as SMALLINT 1-3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i16", into = "i16")]
pub enum Degree {
    Apprentice = 1,
    FellowCraft = 2,
    Master = 3,
}

impl Degree {
    /// Parse a stored degree value.
    #[must_use]
    pub const fn from_i16(value: i16) -> Option<Self> {
        match value {
            1 => Some(Self::Apprentice),
            2 => Some(Self::FellowCraft),
            3 => Some(Self::Master),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i16(self) -> i16 {
        self as i16
    }

    /// Display name used by the lodge.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Apprentice => "Aprendiz",
            Self::FellowCraft => "Compañero",
            Self::Master => "Maestro",
        }
    }

    /// Display name for a raw stored value, empty for out-of-range values.
    #[must_use]
    pub fn name_of(value: i16) -> &'static str {
        Self::from_i16(value).map_or("", Self::name)
    }
}

impl TryFrom<i16> for Degree {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Self::from_i16(value).ok_or_else(|| format!("invalid degree {value}, expected 1-3"))
    }
}

impl From<Degree> for i16 {
    fn from(degree: Degree) -> Self {
        degree.as_i16()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degree_ordering() {
        assert!(Degree::Master > Degree::FellowCraft);
        assert!(Degree::FellowCraft > Degree::Apprentice);
    }

    #[test]
    fn test_degree_names() {
        assert_eq!(Degree::name_of(1), "Aprendiz");
        assert_eq!(Degree::name_of(2), "Compañero");
        assert_eq!(Degree::name_of(3), "Maestro");
        assert_eq!(Degree::name_of(4), "");
    }

    #[test]
    fn test_degree_serde_uses_numbers() {
        assert_eq!(serde_json::to_string(&Degree::Master).unwrap(), "3");
        let parsed: Degree = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, Degree::FellowCraft);
        assert!(serde_json::from_str::<Degree>("0").is_err());
    }
}
