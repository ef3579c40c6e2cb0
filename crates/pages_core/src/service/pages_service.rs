//! Pages linking use-case service.
//!
//! # Responsibility
//! - Expose listing, containment and principal lifecycle operations.
//! - Mirror external things and reconcile them against the live set.
//!
//! # Invariants
//! - Duplicate principals and rejected links are `Ok(None)`, never errors.
//! - Candidate listing degrades to an empty list on storage failure.
//! - Containment is permissive: any kind may contain any kind, self-links
//!   and cycles included.

use crate::db::SharedConnection;
use crate::model::link::{ContentsEntry, Link, LinkId, LinkOrderUpdate};
use crate::model::principal::{Principal, PrincipalId, PrincipalKind};
use crate::repo::pages_repo::{PagesRepoError, PagesRepository, SqlitePagesRepository, ThingUpsert};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Kinds offered when filling a group.
pub const GROUP_CANDIDATE_KINDS: &[PrincipalKind] = &[PrincipalKind::Thing];
/// Kinds offered when filling a page.
pub const PAGE_CANDIDATE_KINDS: &[PrincipalKind] = &[PrincipalKind::Group, PrincipalKind::Thing];

/// Errors from pages service operations.
#[derive(Debug)]
pub enum PagesServiceError {
    /// Name is blank after trim.
    InvalidName,
    /// External id is blank after trim.
    InvalidExternalId,
    /// Kind is mirrored from the device registry, not created on request.
    NotUserManaged(PrincipalKind),
    /// Repository-level failure.
    Repo(PagesRepoError),
}

impl Display for PagesServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName => write!(f, "name must not be blank"),
            Self::InvalidExternalId => write!(f, "external id must not be blank"),
            Self::NotUserManaged(kind) => {
                write!(f, "{kind} principals cannot be created by request")
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PagesServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PagesRepoError> for PagesServiceError {
    fn from(value: PagesRepoError) -> Self {
        Self::Repo(value)
    }
}

pub type PagesServiceResult<T> = Result<T, PagesServiceError>;

/// Linking engine facade over a pages repository.
pub struct PagesService<R: PagesRepository> {
    repo: R,
}

impl<R: PagesRepository> PagesService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Lists every principal of `kind` in creation order.
    pub fn list_by_kind(&self, kind: PrincipalKind) -> PagesServiceResult<Vec<Principal>> {
        self.repo.list_principals(kind).map_err(Into::into)
    }

    pub fn list_groups(&self) -> PagesServiceResult<Vec<Principal>> {
        self.list_by_kind(PrincipalKind::Group)
    }

    pub fn list_pages(&self) -> PagesServiceResult<Vec<Principal>> {
        self.list_by_kind(PrincipalKind::Page)
    }

    /// Loads one principal by id.
    pub fn get_principal(&self, id: PrincipalId) -> PagesServiceResult<Option<Principal>> {
        self.repo.get_principal(id).map_err(Into::into)
    }

    /// Returns the container row (link id `-1`) followed by its direct
    /// children. Unknown ids yield an empty list.
    pub fn get_contents(&self, id: PrincipalId) -> PagesServiceResult<Vec<ContentsEntry>> {
        self.repo.list_contents(id).map_err(Into::into)
    }

    /// Creates one group or page.
    ///
    /// Returns `Ok(None)` when a principal of the same kind already uses the
    /// trimmed name.
    pub fn add_principal(
        &self,
        kind: PrincipalKind,
        name: impl Into<String>,
    ) -> PagesServiceResult<Option<Principal>> {
        if !kind.is_user_managed() {
            return Err(PagesServiceError::NotUserManaged(kind));
        }
        let normalized = normalize_required(name.into(), PagesServiceError::InvalidName)?;

        let created = self.repo.insert_principal(kind, normalized.as_str(), None)?;
        match &created {
            Some(principal) => info!(
                "event=principal_add module=service status=ok kind={} id={}",
                kind, principal.id
            ),
            None => debug!(
                "event=principal_add module=service status=duplicate kind={}",
                kind
            ),
        }
        Ok(created)
    }

    pub fn add_group(&self, name: impl Into<String>) -> PagesServiceResult<Option<Principal>> {
        self.add_principal(PrincipalKind::Group, name)
    }

    pub fn add_page(&self, name: impl Into<String>) -> PagesServiceResult<Option<Principal>> {
        self.add_principal(PrincipalKind::Page, name)
    }

    /// Deletes one principal and every link touching it. Missing ids are a no-op.
    pub fn delete_principal(&self, id: PrincipalId) -> PagesServiceResult<()> {
        let removed = self.repo.delete_principal(id)?;
        info!(
            "event=principal_delete module=service status=ok id={} removed={}",
            id, removed
        );
        Ok(())
    }

    /// Lists principals of `kinds` not yet linked under `container`, by name.
    ///
    /// Advisory listing: storage failures are logged and produce an empty list.
    pub fn get_available_links(
        &self,
        container: PrincipalId,
        kinds: &[PrincipalKind],
    ) -> Vec<Principal> {
        match self.repo.list_candidates(container, kinds) {
            Ok(items) => items,
            Err(err) => {
                warn!(
                    "event=available_links module=service status=degraded container={} error={}",
                    container, err
                );
                Vec::new()
            }
        }
    }

    /// Things that can still be added to a group.
    pub fn list_available_for_group(&self, group: PrincipalId) -> Vec<Principal> {
        self.get_available_links(group, GROUP_CANDIDATE_KINDS)
    }

    /// Groups and things that can still be added to a page.
    pub fn list_available_for_page(&self, page: PrincipalId) -> Vec<Principal> {
        self.get_available_links(page, PAGE_CANDIDATE_KINDS)
    }

    /// Links `contained` under `container`.
    ///
    /// `order` defaults to after the container's last child. Returns
    /// `Ok(None)` when the pair already exists or an endpoint is missing.
    pub fn insert_link(
        &self,
        container: PrincipalId,
        contained: PrincipalId,
        order: Option<i64>,
    ) -> PagesServiceResult<Option<Link>> {
        let link = self.repo.insert_link(container, contained, order)?;
        if link.is_none() {
            debug!(
                "event=link_insert module=service status=rejected container={} contained={}",
                container, contained
            );
        }
        Ok(link)
    }

    pub fn get_link(&self, id: LinkId) -> PagesServiceResult<Option<Link>> {
        self.repo.get_link(id).map_err(Into::into)
    }

    /// Deletes one link. Missing ids are a no-op.
    pub fn delete_link(&self, id: LinkId) -> PagesServiceResult<()> {
        self.repo.delete_link(id)?;
        Ok(())
    }

    /// Persists new positions for the listed links; unknown ids are skipped.
    /// Returns the number of links updated.
    pub fn update_link_order(&self, updates: &[LinkOrderUpdate]) -> PagesServiceResult<usize> {
        let updated = self.repo.update_link_order(updates)?;
        debug!(
            "event=link_reorder module=service status=ok requested={} updated={}",
            updates.len(),
            updated
        );
        Ok(updated)
    }

    /// Mirrors one active device: inserts, renames, or leaves it alone.
    pub fn upsert_thing(
        &self,
        external_id: impl Into<String>,
        name: impl Into<String>,
    ) -> PagesServiceResult<ThingUpsert> {
        let external_id =
            normalize_required(external_id.into(), PagesServiceError::InvalidExternalId)?;
        let name = normalize_required(name.into(), PagesServiceError::InvalidName)?;

        let outcome = self.repo.upsert_thing(external_id.as_str(), name.as_str())?;
        if outcome.changed() {
            info!(
                "event=thing_upsert module=service status=ok id={} changed=true",
                outcome.principal().id
            );
        }
        Ok(outcome)
    }

    /// Deletes the thing mirrored from `external_id`, cascading its links.
    /// Returns whether a principal was removed.
    pub fn delete_thing(&self, external_id: &str) -> PagesServiceResult<bool> {
        let removed = self.repo.delete_thing(external_id.trim())?;
        Ok(removed > 0)
    }

    /// Deletes every thing whose external id is not in `active`.
    /// Returns the number of things removed.
    pub fn reconcile_active_things<I, S>(&self, active: I) -> PagesServiceResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let active: Vec<String> = active.into_iter().map(Into::into).collect();
        let removed = self.repo.delete_things_not_in(&active)?;
        info!(
            "event=thing_reconcile module=service status=ok active={} removed={}",
            active.len(),
            removed
        );
        Ok(removed)
    }
}

fn normalize_required(value: String, err: PagesServiceError) -> PagesServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(err);
    }
    Ok(trimmed.to_string())
}

/// Runs `op` against a service bound to the locked shared connection.
///
/// The lock is held for the duration of `op`, which serializes engine
/// operations issued from the request layer, the bridge and the sweeper.
pub fn with_pages_service<T>(
    conn: &SharedConnection,
    op: impl FnOnce(&PagesService<SqlitePagesRepository<'_>>) -> PagesServiceResult<T>,
) -> PagesServiceResult<T> {
    let guard = conn.lock();
    let repo = SqlitePagesRepository::try_new(&guard)?;
    op(&PagesService::new(repo))
}
