//! Pages graph repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide raw CRUD primitives over `principal` and `link` rows.
//! - Translate uniqueness and endpoint violations into `None` results.
//! - Keep SQL details and ordering behavior inside repository boundary.
//!
//! # Invariants
//! - Each write is one statement, or one immediate transaction when a read
//!   must precede the write.
//! - Contents listing puts the container row first, then children by
//!   `link_order ASC, link rowid ASC`.
//! - Candidate listing is sorted by `name ASC, rowid ASC`.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::link::{ContentsEntry, Link, LinkId, LinkOrderUpdate, SELF_LINK_ID};
use crate::model::principal::{Principal, PrincipalId, PrincipalKind, PrincipalValidationError};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PRINCIPAL_SELECT_SQL: &str = "SELECT
    rowid AS id,
    rowtype AS kind,
    name,
    extid
FROM principal";

const LINK_SELECT_SQL: &str = "SELECT
    rowid AS id,
    container,
    contained,
    link_order
FROM link";

/// Result type used by pages repository operations.
pub type PagesRepoResult<T> = Result<T, PagesRepoError>;

/// Errors from pages repository operations.
#[derive(Debug)]
pub enum PagesRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Record rejected before reaching SQL.
    Validation(PrincipalValidationError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to valid read model.
    InvalidData(String),
}

impl Display for PagesRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "pages repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "pages repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "pages repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid pages data: {message}"),
        }
    }
}

impl Error for PagesRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::MissingRequiredColumn { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for PagesRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for PagesRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<PrincipalValidationError> for PagesRepoError {
    fn from(value: PrincipalValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Outcome of mirroring one external thing into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThingUpsert {
    /// No principal had this external id; one was inserted.
    Created(Principal),
    /// Existing principal renamed in place; id and external id kept.
    Renamed(Principal),
    /// Existing principal already carried this name.
    Unchanged(Principal),
}

impl ThingUpsert {
    /// Returns the principal after the upsert.
    pub fn principal(&self) -> &Principal {
        match self {
            Self::Created(principal) | Self::Renamed(principal) | Self::Unchanged(principal) => {
                principal
            }
        }
    }

    /// Whether the store was written.
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged(_))
    }
}

/// Repository interface for the principal/link store.
pub trait PagesRepository {
    /// Inserts one principal; `None` when `(kind, name)` is already taken
    /// for a group/page, or the external id is already mirrored.
    fn insert_principal(
        &self,
        kind: PrincipalKind,
        name: &str,
        external_id: Option<&str>,
    ) -> PagesRepoResult<Option<Principal>>;
    /// Loads one principal by id.
    fn get_principal(&self, id: PrincipalId) -> PagesRepoResult<Option<Principal>>;
    /// Deletes one principal and, via cascade, every link touching it.
    /// Returns the number of principal rows removed.
    fn delete_principal(&self, id: PrincipalId) -> PagesRepoResult<usize>;
    /// Lists principals of one kind in creation order.
    fn list_principals(&self, kind: PrincipalKind) -> PagesRepoResult<Vec<Principal>>;
    /// Lists the container row followed by its direct children.
    fn list_contents(&self, id: PrincipalId) -> PagesRepoResult<Vec<ContentsEntry>>;
    /// Lists principals of `kinds` not yet contained under `container`.
    fn list_candidates(
        &self,
        container: PrincipalId,
        kinds: &[PrincipalKind],
    ) -> PagesRepoResult<Vec<Principal>>;
    /// Inserts one link; `None` on duplicate pair or missing endpoint.
    fn insert_link(
        &self,
        container: PrincipalId,
        contained: PrincipalId,
        order: Option<i64>,
    ) -> PagesRepoResult<Option<Link>>;
    /// Loads one link by id.
    fn get_link(&self, id: LinkId) -> PagesRepoResult<Option<Link>>;
    /// Deletes one link. Returns the number of rows removed.
    fn delete_link(&self, id: LinkId) -> PagesRepoResult<usize>;
    /// Applies per-link order values atomically. Returns links updated.
    fn update_link_order(&self, updates: &[LinkOrderUpdate]) -> PagesRepoResult<usize>;
    /// Loads the thing mirrored from one external id.
    fn get_by_external_id(&self, external_id: &str) -> PagesRepoResult<Option<Principal>>;
    /// Inserts or renames the thing mirrored from one external id.
    fn upsert_thing(&self, external_id: &str, name: &str) -> PagesRepoResult<ThingUpsert>;
    /// Deletes the thing mirrored from one external id.
    fn delete_thing(&self, external_id: &str) -> PagesRepoResult<usize>;
    /// Deletes every thing whose external id is absent from `active`.
    fn delete_things_not_in(&self, active: &[String]) -> PagesRepoResult<usize>;
}

/// SQLite-backed pages repository.
pub struct SqlitePagesRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePagesRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> PagesRepoResult<Self> {
        ensure_pages_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl PagesRepository for SqlitePagesRepository<'_> {
    fn insert_principal(
        &self,
        kind: PrincipalKind,
        name: &str,
        external_id: Option<&str>,
    ) -> PagesRepoResult<Option<Principal>> {
        let candidate = Principal {
            id: 0,
            kind,
            name: name.to_string(),
            external_id: external_id.map(str::to_string),
        };
        candidate.validate()?;

        // The partial unique indexes make check-and-insert one statement.
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO principal (rowtype, name, extid)
             VALUES (?1, ?2, ?3);",
            params![kind.as_tag(), name, external_id],
        )?;
        if changed == 0 {
            return Ok(None);
        }

        let id = self.conn.last_insert_rowid();
        Ok(Some(Principal { id, ..candidate }))
    }

    fn get_principal(&self, id: PrincipalId) -> PagesRepoResult<Option<Principal>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PRINCIPAL_SELECT_SQL} WHERE rowid = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_principal_row(row)?));
        }
        Ok(None)
    }

    fn delete_principal(&self, id: PrincipalId) -> PagesRepoResult<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM principal WHERE rowid = ?1;", [id])?;
        Ok(changed)
    }

    fn list_principals(&self, kind: PrincipalKind) -> PagesRepoResult<Vec<Principal>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PRINCIPAL_SELECT_SQL}
             WHERE rowtype = ?1
             ORDER BY rowid ASC;"
        ))?;
        let mut rows = stmt.query([kind.as_tag()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_principal_row(row)?);
        }
        Ok(items)
    }

    fn list_contents(&self, id: PrincipalId) -> PagesRepoResult<Vec<ContentsEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, name, extid, link_id, link_order
             FROM (
                SELECT
                    p.rowid AS id,
                    p.rowtype AS kind,
                    p.name AS name,
                    p.extid AS extid,
                    ?2 AS link_id,
                    ?2 AS link_order,
                    0 AS section
                FROM principal p
                WHERE p.rowid = ?1
                UNION ALL
                SELECT
                    p.rowid AS id,
                    p.rowtype AS kind,
                    p.name AS name,
                    p.extid AS extid,
                    l.rowid AS link_id,
                    l.link_order AS link_order,
                    1 AS section
                FROM principal p
                INNER JOIN link l ON l.contained = p.rowid
                WHERE l.container = ?1
             )
             ORDER BY section ASC, link_order ASC, link_id ASC;",
        )?;
        let mut rows = stmt.query(params![id, SELF_LINK_ID])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(ContentsEntry {
                principal: parse_principal_row(row)?,
                link_id: row.get("link_id")?,
                order: row.get("link_order")?,
            });
        }
        Ok(items)
    }

    fn list_candidates(
        &self,
        container: PrincipalId,
        kinds: &[PrincipalKind],
    ) -> PagesRepoResult<Vec<Principal>> {
        if kinds.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; kinds.len()].join(", ");
        let sql = format!(
            "{PRINCIPAL_SELECT_SQL}
             WHERE rowtype IN ({placeholders})
               AND rowid NOT IN (
                 SELECT contained
                 FROM link
                 WHERE container = ?
               )
             ORDER BY name ASC, rowid ASC;"
        );
        let mut bind_values: Vec<Value> = kinds
            .iter()
            .map(|kind| Value::Text(kind.as_tag().to_string()))
            .collect();
        bind_values.push(Value::Integer(container));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_principal_row(row)?);
        }
        Ok(items)
    }

    fn insert_link(
        &self,
        container: PrincipalId,
        contained: PrincipalId,
        order: Option<i64>,
    ) -> PagesRepoResult<Option<Link>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let order = match order {
            Some(order) => order,
            None => next_link_order(&tx, container)?,
        };
        let inserted = tx.execute(
            "INSERT INTO link (container, contained, link_order)
             VALUES (?1, ?2, ?3);",
            params![container, contained, order],
        );
        match inserted {
            Ok(_) => {}
            Err(err) if is_constraint_violation(&err) => return Ok(None),
            Err(err) => return Err(err.into()),
        }

        let link = load_link(&tx, tx.last_insert_rowid())?;
        tx.commit()?;
        Ok(link)
    }

    fn get_link(&self, id: LinkId) -> PagesRepoResult<Option<Link>> {
        load_link(self.conn, id)
    }

    fn delete_link(&self, id: LinkId) -> PagesRepoResult<usize> {
        let changed = self
            .conn
            .execute("DELETE FROM link WHERE rowid = ?1;", [id])?;
        Ok(changed)
    }

    fn update_link_order(&self, updates: &[LinkOrderUpdate]) -> PagesRepoResult<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE link
                 SET link_order = ?2
                 WHERE rowid = ?1;",
            )?;
            for update in updates {
                updated += stmt.execute(params![update.link_id, update.order])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    fn get_by_external_id(&self, external_id: &str) -> PagesRepoResult<Option<Principal>> {
        load_thing(self.conn, external_id)
    }

    fn upsert_thing(&self, external_id: &str, name: &str) -> PagesRepoResult<ThingUpsert> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let outcome = match load_thing(&tx, external_id)? {
            None => {
                let candidate = Principal {
                    id: 0,
                    kind: PrincipalKind::Thing,
                    name: name.to_string(),
                    external_id: Some(external_id.to_string()),
                };
                candidate.validate()?;
                tx.execute(
                    "INSERT INTO principal (rowtype, name, extid)
                     VALUES (?1, ?2, ?3);",
                    params![PrincipalKind::Thing.as_tag(), name, external_id],
                )?;
                ThingUpsert::Created(Principal {
                    id: tx.last_insert_rowid(),
                    ..candidate
                })
            }
            Some(existing) if existing.name == name => ThingUpsert::Unchanged(existing),
            Some(existing) => {
                tx.execute(
                    "UPDATE principal
                     SET name = ?2
                     WHERE rowid = ?1;",
                    params![existing.id, name],
                )?;
                ThingUpsert::Renamed(Principal {
                    name: name.to_string(),
                    ..existing
                })
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    fn delete_thing(&self, external_id: &str) -> PagesRepoResult<usize> {
        let changed = self.conn.execute(
            "DELETE FROM principal
             WHERE rowtype = ?1
               AND extid = ?2;",
            params![PrincipalKind::Thing.as_tag(), external_id],
        )?;
        Ok(changed)
    }

    fn delete_things_not_in(&self, active: &[String]) -> PagesRepoResult<usize> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute_batch(
            "CREATE TEMP TABLE IF NOT EXISTS active_extid (extid TEXT PRIMARY KEY);
             DELETE FROM temp.active_extid;",
        )?;
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO temp.active_extid (extid) VALUES (?1);")?;
            for external_id in active {
                stmt.execute([external_id])?;
            }
        }

        let changed = tx.execute(
            "DELETE FROM principal
             WHERE rowtype = ?1
               AND extid NOT IN (SELECT extid FROM temp.active_extid);",
            [PrincipalKind::Thing.as_tag()],
        )?;
        tx.execute_batch("DELETE FROM temp.active_extid;")?;
        tx.commit()?;
        Ok(changed)
    }
}

/// Position after the container's last child, saturating at `i64::MAX`.
fn next_link_order(conn: &Connection, container: PrincipalId) -> PagesRepoResult<i64> {
    let last: Option<i64> = conn.query_row(
        "SELECT MAX(link_order) FROM link WHERE container = ?1;",
        [container],
        |row| row.get(0),
    )?;
    Ok(last.map_or(0, |last| last.saturating_add(1)))
}

fn load_link(conn: &Connection, id: LinkId) -> PagesRepoResult<Option<Link>> {
    let link = conn
        .query_row(
            &format!("{LINK_SELECT_SQL} WHERE rowid = ?1;"),
            [id],
            parse_link_row,
        )
        .optional()?;
    Ok(link)
}

fn load_thing(conn: &Connection, external_id: &str) -> PagesRepoResult<Option<Principal>> {
    let mut stmt = conn.prepare(&format!(
        "{PRINCIPAL_SELECT_SQL}
         WHERE rowtype = ?1
           AND extid = ?2;"
    ))?;
    let mut rows = stmt.query(params![PrincipalKind::Thing.as_tag(), external_id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_principal_row(row)?));
    }
    Ok(None)
}

fn parse_principal_row(row: &Row<'_>) -> PagesRepoResult<Principal> {
    let kind_text: String = row.get("kind")?;
    let kind = PrincipalKind::from_tag(&kind_text).ok_or_else(|| {
        PagesRepoError::InvalidData(format!(
            "invalid principal kind `{kind_text}` in principal.rowtype"
        ))
    })?;

    let principal = Principal {
        id: row.get("id")?,
        kind,
        name: row.get("name")?,
        external_id: row.get("extid")?,
    };
    if kind == PrincipalKind::Thing && principal.external_id.is_none() {
        return Err(PagesRepoError::InvalidData(format!(
            "thing principal {} has no principal.extid",
            principal.id
        )));
    }
    Ok(principal)
}

fn parse_link_row(row: &Row<'_>) -> rusqlite::Result<Link> {
    Ok(Link {
        id: row.get("id")?,
        container: row.get("container")?,
        contained: row.get("contained")?,
        order: row.get("link_order")?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation)
}

fn ensure_pages_connection_ready(conn: &Connection) -> PagesRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(PagesRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["principal", "link"] {
        if !table_exists(conn, table)? {
            return Err(PagesRepoError::MissingRequiredTable(table));
        }
    }

    if !table_has_column(conn, "link", "link_order")? {
        return Err(PagesRepoError::MissingRequiredColumn {
            table: "link",
            column: "link_order",
        });
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> PagesRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> PagesRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
