//! Principal domain model.
//!
//! # Responsibility
//! - Define the addressable objects of the pages graph.
//! - Map kinds to and from their one-letter storage tags.
//!
//! # Invariants
//! - `id` is assigned by the store on insert and never reused.
//! - `name` is unique within `Group` and within `Page`; things may share names.
//! - `external_id` is present and unique for `Thing`, absent otherwise.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable store-assigned principal identifier.
pub type PrincipalId = i64;

/// Kind tag of one principal.
///
/// Serialized with the same one-letter tags used in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrincipalKind {
    /// Collection of pages or things.
    #[serde(rename = "G")]
    Group,
    /// User-defined collection of things and groups.
    #[serde(rename = "P")]
    Page,
    /// Mirror of an externally managed device.
    #[serde(rename = "T")]
    Thing,
}

impl PrincipalKind {
    /// Returns the storage tag written to `principal.rowtype`.
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::Group => "G",
            Self::Page => "P",
            Self::Thing => "T",
        }
    }

    /// Parses a storage tag; unknown tags yield `None`.
    pub fn from_tag(value: &str) -> Option<Self> {
        match value {
            "G" => Some(Self::Group),
            "P" => Some(Self::Page),
            "T" => Some(Self::Thing),
            _ => None,
        }
    }

    /// Whether principals of this kind are created by caller request.
    pub fn is_user_managed(self) -> bool {
        !matches!(self, Self::Thing)
    }
}

impl Display for PrincipalKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Group => "group",
            Self::Page => "page",
            Self::Thing => "thing",
        };
        f.write_str(label)
    }
}

/// Validation failures for principal records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalValidationError {
    /// Name is empty after trim.
    BlankName,
    /// Thing principal without an external id.
    MissingExternalId,
    /// Group or page principal carrying an external id.
    UnexpectedExternalId(PrincipalKind),
}

impl Display for PrincipalValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "principal name must not be blank"),
            Self::MissingExternalId => write!(f, "thing principal requires an external id"),
            Self::UnexpectedExternalId(kind) => {
                write!(f, "{kind} principal must not carry an external id")
            }
        }
    }
}

impl Error for PrincipalValidationError {}

/// One addressable object of the pages graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Serialized as `rowid` to match the stored column.
    #[serde(rename = "rowid")]
    pub id: PrincipalId,
    #[serde(rename = "rowtype")]
    pub kind: PrincipalKind,
    pub name: String,
    /// Correlates a thing with its device across restarts.
    #[serde(rename = "extid")]
    pub external_id: Option<String>,
}

impl Principal {
    /// Checks the kind/external-id pairing and name presence.
    pub fn validate(&self) -> Result<(), PrincipalValidationError> {
        if self.name.trim().is_empty() {
            return Err(PrincipalValidationError::BlankName);
        }
        match (self.kind, self.external_id.as_deref()) {
            (PrincipalKind::Thing, None) | (PrincipalKind::Thing, Some("")) => {
                Err(PrincipalValidationError::MissingExternalId)
            }
            (PrincipalKind::Thing, Some(_)) => Ok(()),
            (kind, Some(_)) => Err(PrincipalValidationError::UnexpectedExternalId(kind)),
            (_, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Principal, PrincipalKind, PrincipalValidationError};

    fn principal(kind: PrincipalKind, external_id: Option<&str>) -> Principal {
        Principal {
            id: 1,
            kind,
            name: "Lamp".to_string(),
            external_id: external_id.map(str::to_string),
        }
    }

    #[test]
    fn tags_map_both_ways() {
        for kind in [PrincipalKind::Group, PrincipalKind::Page, PrincipalKind::Thing] {
            assert_eq!(PrincipalKind::from_tag(kind.as_tag()), Some(kind));
        }
        assert_eq!(PrincipalKind::from_tag("U"), None);
    }

    #[test]
    fn thing_requires_external_id() {
        assert_eq!(
            principal(PrincipalKind::Thing, None).validate(),
            Err(PrincipalValidationError::MissingExternalId)
        );
        assert!(principal(PrincipalKind::Thing, Some("dev1")).validate().is_ok());
    }

    #[test]
    fn group_rejects_external_id() {
        assert_eq!(
            principal(PrincipalKind::Group, Some("dev1")).validate(),
            Err(PrincipalValidationError::UnexpectedExternalId(
                PrincipalKind::Group
            ))
        );
    }

    #[test]
    fn serializes_with_storage_column_names() {
        let value = serde_json::to_value(principal(PrincipalKind::Page, None)).unwrap();
        assert_eq!(value["rowid"], 1);
        assert_eq!(value["rowtype"], "P");
        assert_eq!(value["name"], "Lamp");
        assert!(value["extid"].is_null());
    }
}
