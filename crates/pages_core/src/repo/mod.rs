//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the raw principal/link primitives the linking engine builds on.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Principal::validate()` before persistence.
//! - Constraint violations surface as `None`, transport failures as errors.

pub mod pages_repo;
