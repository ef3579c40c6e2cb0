//! JSON request surface over the pages engine.
//!
//! # Responsibility
//! - Route `POST` requests to engine operations.
//! - Map outcomes to status code, content type and serialized content.
//!
//! # Invariants
//! - Request handling never panics.
//! - Engine failures are logged and reported as status 500.

pub mod body;
pub mod handler;

pub use body::{ApiError, ApiRequest, ApiResponse};
pub use handler::{PagesApiHandler, Route};

/// Returns the API crate version.
pub fn api_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
