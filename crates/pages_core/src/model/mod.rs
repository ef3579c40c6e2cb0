//! Domain model for the pages graph.
//!
//! # Responsibility
//! - Define principals (groups, pages, things) and containment links.
//! - Keep the JSON row shape consumed by the request layer next to the types.
//!
//! # Invariants
//! - Every principal is identified by a store-assigned `PrincipalId`.
//! - Only things carry an external id.

pub mod link;
pub mod principal;
