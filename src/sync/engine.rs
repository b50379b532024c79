//! Reconciliation of persisted connections against the desired source set
//!
//! Every add or remove of one identifier runs under that identifier's lock and in its
//! own units of work, so one failing source never blocks or undoes another.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::{Error, Result};
use crate::graph::GraphStore;
use crate::model::{DomainObject, WorkspaceManager};
use crate::uow::UnitOfWork;
use super::source::{
    ExternalSource, MetadataRefresher, Origin, RefreshMode, SourceAction, SourceEvent, SourceInventory,
};

/// What adding one source did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddOutcome {
    Added,
    /// Removed and recreated from the new record
    Updated,
    /// Already persisted; only a metadata refresh was requested
    AlreadyPresent,
    /// Derived from this system's own published output
    SkippedSelfLoop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveOutcome {
    Removed,
    NotPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", content = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    Add(AddOutcome),
    Remove(RemoveOutcome),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileFailure {
    pub id: String,
    pub error: String,
}

/// Summary of one full reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub removed: Vec<String>,
    pub skipped: Vec<String>,
    pub failures: Vec<ReconcileFailure>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.id.as_str()).collect()
    }

    fn fail(&mut self, id: &str, err: &Error) {
        warn!(source = %id, error = %err, "reconciliation item failed, skipping");
        self.failures.push(ReconcileFailure {
            id: id.to_string(),
            error: err.to_string(),
        });
    }
}

pub struct ReconciliationEngine {
    store: Arc<GraphStore>,
    workspace: WorkspaceManager,
    inventory: Arc<dyn SourceInventory>,
    refresher: Arc<dyn MetadataRefresher>,
    // one entry per identifier with an operation in flight
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<GraphStore>,
        workspace: WorkspaceManager,
        inventory: Arc<dyn SourceInventory>,
        refresher: Arc<dyn MetadataRefresher>,
    ) -> Self {
        Self {
            store,
            workspace,
            inventory,
            refresher,
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn workspace(&self) -> &WorkspaceManager {
        &self.workspace
    }

    pub fn inventory(&self) -> &dyn SourceInventory {
        self.inventory.as_ref()
    }

    /// Run `f` holding the lock for `id`; the entry is dropped once no one else wants it
    fn with_lock<T>(&self, id: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.locks.entry(id.to_string()).or_default().clone();
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        drop(lock);
        self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    // ========== Transactions ==========

    /// Run `f` in a fresh unit of work that never persists
    fn read<T>(&self, name: &str, f: impl FnOnce(&mut UnitOfWork) -> Result<T>) -> Result<T> {
        let mut uow = self.store.begin_as("reconciler", name, true)?;
        let result = f(&mut uow);
        if !uow.state().is_terminal() {
            uow.rollback()?;
        }
        result
    }

    /// Run `f` in a fresh unit of work holding the write lock, committing on success
    fn write<T>(&self, name: &str, f: impl FnOnce(&mut UnitOfWork) -> Result<T>) -> Result<T> {
        let mut uow = self.store.begin_write_as("reconciler", name)?;
        match f(&mut uow) {
            Ok(value) => {
                uow.commit()?;
                Ok(value)
            }
            Err(err) => {
                if !uow.state().is_terminal() {
                    uow.rollback()?;
                }
                Err(err)
            }
        }
    }

    // ========== Queries ==========

    /// Identifier and fingerprint of every persisted connection
    pub fn persisted(&self) -> Result<BTreeMap<String, Option<String>>> {
        self.read("list-persisted", |uow| {
            let mut persisted = BTreeMap::new();
            for connection in self.workspace.connections(uow)? {
                if let Some(id) = connection.source_id(uow)? {
                    let fingerprint = connection.fingerprint(uow)?;
                    persisted.insert(id, fingerprint);
                }
            }
            Ok(persisted)
        })
    }

    pub fn is_persisted(&self, id: &str) -> Result<bool> {
        self.read("find-connection", |uow| Ok(self.workspace.find_connection(uow, id)?.is_some()))
    }

    /// True when `source` is this system's own published output
    pub fn is_self_loop(&self, source: &ExternalSource) -> Result<bool> {
        if source.origin == Origin::SelfPublished {
            return Ok(true);
        }
        self.read("find-dataservice", |uow| {
            Ok(self.workspace.find_dataservice_by_source_id(uow, &source.id)?.is_some())
        })
    }

    // ========== Per-Item Operations ==========

    /// Add one source. With `update`, an existing copy is removed first.
    pub fn add_source(&self, source: &ExternalSource, update: bool) -> Result<AddOutcome> {
        self.with_lock(&source.id, || self.add_locked(source, update))
    }

    fn add_locked(&self, source: &ExternalSource, update: bool) -> Result<AddOutcome> {
        if self.is_self_loop(source)? {
            info!(source = %source.id, "source is published by this system, skipping");
            return Ok(AddOutcome::SkippedSelfLoop);
        }

        let present = self.is_persisted(&source.id)?;
        if present && !update {
            debug!(source = %source.id, "already persisted");
            self.request_refresh(source, RefreshMode::Refresh);
            return Ok(AddOutcome::AlreadyPresent);
        }
        // a failed teardown fails the update and leaves the old copy for the next pass
        if present {
            self.remove_locked(&source.id)?;
        }

        self.inventory
            .connect(source)
            .map_err(|err| as_external(&source.id, err))?;

        let persisted = self.write("add-source", |uow| {
            self.workspace.create_connection(uow, source).map(|_| ())
        });
        if let Err(err) = persisted {
            if let Err(disconnect_err) = self.inventory.disconnect(&source.id) {
                warn!(source = %source.id, error = %disconnect_err, "disconnect after failed persist also failed");
            }
            return Err(err);
        }

        let (outcome, mode) = if present {
            (AddOutcome::Updated, RefreshMode::Refresh)
        } else {
            (AddOutcome::Added, RefreshMode::MakeLive)
        };
        self.request_refresh(source, mode);
        info!(source = %source.id, outcome = ?outcome, "source persisted");
        Ok(outcome)
    }

    fn request_refresh(&self, source: &ExternalSource, mode: RefreshMode) {
        if let Err(err) = self.refresher.request_refresh(source, mode) {
            warn!(source = %source.id, mode = mode.as_str(), error = %err, "metadata refresh request failed");
        }
    }

    /// Remove one source: schema first, then always the connection itself
    pub fn remove_source(&self, id: &str) -> Result<RemoveOutcome> {
        self.with_lock(id, || self.remove_locked(id))
    }

    fn remove_locked(&self, id: &str) -> Result<RemoveOutcome> {
        if !self.is_persisted(id)? {
            debug!(source = %id, "not persisted, nothing to remove");
            return Ok(RemoveOutcome::NotPresent);
        }

        let schema = self.write("remove-schema", |uow| match self.workspace.find_connection(uow, id)? {
            Some(connection) => connection.remove_schema(uow),
            None => Ok(false),
        });
        if let Err(err) = schema {
            warn!(source = %id, error = %err, "schema delete failed, removing connection anyway");
        }

        self.inventory.disconnect(id).map_err(|err| as_external(id, err))?;

        self.write("remove-connection", |uow| {
            if let Some(connection) = self.workspace.find_connection(uow, id)? {
                self.workspace.remove(uow, &DomainObject::Connection(connection))?;
            }
            Ok(())
        })?;
        info!(source = %id, "source removed");
        Ok(RemoveOutcome::Removed)
    }

    // ========== Event & Full Reconciliation ==========

    /// Apply one change notification
    pub fn handle(&self, event: &SourceEvent) -> Result<EventOutcome> {
        debug!(source = %event.id, action = %event.action, "handling source event");
        match event.action {
            SourceAction::Created | SourceAction::Updated => {
                let source = self
                    .inventory
                    .fetch(&event.id)
                    .map_err(|err| as_external(&event.id, err))?
                    .ok_or_else(|| Error::external(&event.id, "not listed in the source inventory"))?;
                let update = event.action == SourceAction::Updated;
                self.add_source(&source, update).map(EventOutcome::Add)
            }
            SourceAction::Deleted => self.remove_source(&event.id).map(EventOutcome::Remove),
        }
    }

    /// Bring persisted connections in line with `desired`.
    ///
    /// Only reading the persisted set can fail the whole pass; item failures are
    /// collected in the report and retried by the next pass.
    pub fn synchronize(&self, desired: &[ExternalSource]) -> Result<ReconcileReport> {
        let persisted = self.persisted()?;
        let mut report = ReconcileReport::default();
        let mut seen = HashSet::new();

        for source in desired {
            if !seen.insert(source.id.as_str()) {
                warn!(source = %source.id, "duplicate desired source, keeping the first");
                continue;
            }
            let update = persisted
                .get(&source.id)
                .is_some_and(|stored| stored.as_deref() != Some(source.fingerprint().as_str()));

            match self.add_source(source, update) {
                Ok(AddOutcome::Added) => report.added.push(source.id.clone()),
                Ok(AddOutcome::Updated) => report.updated.push(source.id.clone()),
                Ok(AddOutcome::AlreadyPresent) => report.unchanged.push(source.id.clone()),
                Ok(AddOutcome::SkippedSelfLoop) => report.skipped.push(source.id.clone()),
                Err(err) => report.fail(&source.id, &err),
            }
        }

        for id in persisted.keys().filter(|id| !seen.contains(id.as_str())) {
            match self.remove_source(id) {
                Ok(RemoveOutcome::Removed) => report.removed.push(id.clone()),
                Ok(RemoveOutcome::NotPresent) => {}
                Err(err) => report.fail(id, &err),
            }
        }

        info!(
            added = report.added.len(),
            updated = report.updated.len(),
            removed = report.removed.len(),
            failed = report.failures.len(),
            "reconciliation finished"
        );
        Ok(report)
    }

    /// Reconcile against a fresh snapshot of the inventory
    pub fn synchronize_inventory(&self) -> Result<ReconcileReport> {
        let desired = self.inventory.list_desired()?;
        self.synchronize(&desired)
    }
}

/// Collaborator failures count as external-source errors for the item
fn as_external(id: &str, err: Error) -> Error {
    match err {
        Error::ExternalSource { .. } => err,
        other => Error::external(id, other),
    }
}
