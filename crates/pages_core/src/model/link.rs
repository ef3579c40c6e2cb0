//! Containment link model.
//!
//! # Invariants
//! - `(container, contained)` pairs are unique.
//! - Links never outlive either endpoint.

use crate::model::principal::{Principal, PrincipalId};
use serde::{Deserialize, Serialize};

/// Stable store-assigned link identifier.
pub type LinkId = i64;

/// Link id reported for the container's own row in a contents listing.
pub const SELF_LINK_ID: LinkId = -1;

/// Directed containment edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "rowid")]
    pub id: LinkId,
    pub container: PrincipalId,
    pub contained: PrincipalId,
    /// Position among the container's children, ascending.
    #[serde(rename = "link_order")]
    pub order: i64,
}

/// One row of a contents listing: the container itself or one direct child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentsEntry {
    #[serde(flatten)]
    pub principal: Principal,
    /// [`SELF_LINK_ID`] for the container row, the real link id otherwise.
    #[serde(rename = "link_rowid")]
    pub link_id: LinkId,
    #[serde(rename = "link_order")]
    pub order: i64,
}

impl ContentsEntry {
    /// Whether this row describes the container rather than a child.
    pub fn is_container(&self) -> bool {
        self.link_id == SELF_LINK_ID
    }
}

/// Requested position for one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOrderUpdate {
    pub link_id: LinkId,
    pub order: i64,
}
