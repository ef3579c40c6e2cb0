//! Pages schema migrations and post-migration schema checks.
//!
//! # Responsibility
//! - Bring a store from any older `PRAGMA user_version` to the latest
//!   schema in one transaction.
//! - Confirm the tables and indexes the linking rules rely on are present.
//!
//! # Invariants
//! - Versions are contiguous from 1.
//! - Either every pending step commits with its version, or none does.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

struct Step {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[Step] = &[
    Step {
        version: 1,
        name: "principal_and_link_tables",
        sql: include_str!("0001_init.sql"),
    },
    Step {
        version: 2,
        name: "principal_uniqueness",
        sql: include_str!("0002_principal_uniqueness.sql"),
    },
    Step {
        version: 3,
        name: "link_order",
        sql: include_str!("0003_link_order.sql"),
    },
];

/// `(sqlite_master.type, name)` of objects that must exist once migrated.
///
/// `links1` backs duplicate-link rejection, the `principal_*` unique indexes
/// back duplicate-name and external-id rejection.
pub const REQUIRED_SCHEMA_OBJECTS: &[(&str, &str)] = &[
    ("table", "principal"),
    ("table", "link"),
    ("index", "links1"),
    ("index", "links2"),
    ("index", "principal_kind_name"),
    ("index", "principal_extid"),
];

/// Schema version written by the last step.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Runs every step newer than the stored version.
///
/// Returns the version the store was at before migrating.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<u32> {
    let stored: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = latest_version();
    if stored > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: stored,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Step> = STEPS.iter().filter(|step| step.version > stored).collect();
    if pending.is_empty() {
        return Ok(stored);
    }

    let tx = conn.transaction()?;
    for step in pending {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|source| DbError::MigrationFailed {
                version: step.version,
                name: step.name,
                source,
            })?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        stored, latest
    );
    Ok(stored)
}

/// Fails with the first entry of [`REQUIRED_SCHEMA_OBJECTS`] that is missing.
pub fn verify_schema(conn: &Connection) -> DbResult<()> {
    let mut stmt = conn.prepare(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2
        );",
    )?;
    for &(kind, name) in REQUIRED_SCHEMA_OBJECTS {
        let present: bool = stmt.query_row([kind, name], |row| row.get(0))?;
        if !present {
            return Err(DbError::MissingSchemaObject { kind, name });
        }
    }
    Ok(())
}
