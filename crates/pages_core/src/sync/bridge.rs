//! Notification bridge between the device registry and the store.

use crate::db::SharedConnection;
use crate::repo::pages_repo::ThingUpsert;
use crate::service::pages_service::{with_pages_service, PagesServiceResult};
use log::info;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

/// External ids reported live since process start.
#[derive(Debug, Default)]
pub struct ActiveThings {
    ids: Mutex<BTreeSet<String>>,
}

impl ActiveThings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_active(&self, external_id: &str) {
        self.ids.lock().insert(external_id.trim().to_string());
    }

    pub fn mark_inactive(&self, external_id: &str) {
        self.ids.lock().remove(external_id.trim());
    }

    pub fn contains(&self, external_id: &str) -> bool {
        self.ids.lock().contains(external_id.trim())
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }

    /// Returns the live ids in sorted order.
    pub fn snapshot(&self) -> Vec<String> {
        self.ids.lock().iter().cloned().collect()
    }
}

/// Applies device registry notifications to the pages store.
#[derive(Clone)]
pub struct ThingBridge {
    conn: SharedConnection,
    active: Arc<ActiveThings>,
}

impl ThingBridge {
    pub fn new(conn: SharedConnection, active: Arc<ActiveThings>) -> Self {
        Self { conn, active }
    }

    pub fn active(&self) -> &Arc<ActiveThings> {
        &self.active
    }

    /// Records a device as live and mirrors its current title.
    pub fn thing_appeared(&self, external_id: &str, name: &str) -> PagesServiceResult<ThingUpsert> {
        self.active.mark_active(external_id);
        with_pages_service(&self.conn, |service| service.upsert_thing(external_id, name))
    }

    /// Forgets a device and deletes its thing, cascading the thing's links.
    ///
    /// Returns whether a thing was removed.
    pub fn thing_disappeared(&self, external_id: &str) -> PagesServiceResult<bool> {
        self.active.mark_inactive(external_id);
        let removed = with_pages_service(&self.conn, |service| service.delete_thing(external_id))?;
        info!("event=thing_disappeared module=sync status=ok removed={}", removed);
        Ok(removed)
    }
}
