//! Shared domain enumerations aligned with the server's wire enums.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentCategory {
    Permanent,
    Contract,
    Casual,
}

impl EmploymentCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            EmploymentCategory::Permanent => "permanent",
            EmploymentCategory::Contract => "contract",
            EmploymentCategory::Casual => "casual",
        }
    }
}

impl TryFrom<&str> for EmploymentCategory {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "permanent" => Ok(EmploymentCategory::Permanent),
            "contract" => Ok(EmploymentCategory::Contract),
            "casual" => Ok(EmploymentCategory::Casual),
            _ => Err(()),
        }
    }
}

/// Closed set of attachment kinds. A record carries at most one attachment per
/// kind; the cache preserves that invariant when patching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Profile,
    Resume,
    Contract,
    Identification,
}

impl AttachmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AttachmentKind::Profile => "profile",
            AttachmentKind::Resume => "resume",
            AttachmentKind::Contract => "contract",
            AttachmentKind::Identification => "identification",
        }
    }
}

impl TryFrom<&str> for AttachmentKind {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "profile" => Ok(AttachmentKind::Profile),
            "resume" => Ok(AttachmentKind::Resume),
            "contract" => Ok(AttachmentKind::Contract),
            "identification" => Ok(AttachmentKind::Identification),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_round_trip() {
        for category in [
            EmploymentCategory::Permanent,
            EmploymentCategory::Contract,
            EmploymentCategory::Casual,
        ] {
            assert_eq!(EmploymentCategory::try_from(category.as_str()), Ok(category));
        }
    }

    #[test]
    fn attachment_kind_round_trip() {
        for kind in [
            AttachmentKind::Profile,
            AttachmentKind::Resume,
            AttachmentKind::Contract,
            AttachmentKind::Identification,
        ] {
            assert_eq!(AttachmentKind::try_from(kind.as_str()), Ok(kind));
        }
    }

    #[test]
    fn unknown_values_are_rejected() {
        assert!(EmploymentCategory::try_from("intern").is_err());
        assert!(AttachmentKind::try_from("payslip").is_err());
    }
}
