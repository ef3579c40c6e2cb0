//! Core engine for organizing things into pages and groups.
//! This crate is the single source of truth for linking invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::{ConfigError, DebugChannels, PagesConfig};
pub use db::{create_schema, open_db, open_db_in_memory, share, DbError, SharedConnection};
pub use logging::{
    default_log_level, init_from_config, init_logging, init_stderr_logging, logging_status,
    LoggingError,
};
pub use model::link::{ContentsEntry, Link, LinkId, LinkOrderUpdate, SELF_LINK_ID};
pub use model::principal::{Principal, PrincipalId, PrincipalKind, PrincipalValidationError};
pub use repo::pages_repo::{
    PagesRepoError, PagesRepoResult, PagesRepository, SqlitePagesRepository, ThingUpsert,
};
pub use service::pages_service::{
    with_pages_service, PagesService, PagesServiceError, PagesServiceResult,
    GROUP_CANDIDATE_KINDS, PAGE_CANDIDATE_KINDS,
};
pub use sync::{ActiveThings, SweepConfig, SweepError, ThingBridge, ThingSweeper};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
