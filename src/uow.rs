//! The transaction boundary around every graph read and write

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use serde::Serialize;
use tracing::{debug, warn};
use crate::{Error, Result};
use crate::graph::{GraphSession, LockMode, NodePath, NodeSnapshot, Property};

static NEXT_UOW_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one unit of work; domain facades remember the one that produced them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UowId(u64);

impl fmt::Display for UowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uow-{}", self.0)
    }
}

/// `NotStarted -> Running -> (Committed | RolledBack | Error)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    NotStarted,
    Running,
    Committed,
    RolledBack,
    Error,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::NotStarted => "NOT_STARTED",
            TransactionState::Running => "RUNNING",
            TransactionState::Committed => "COMMITTED",
            TransactionState::RolledBack => "ROLLED_BACK",
            TransactionState::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::RolledBack | TransactionState::Error
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single transaction over one storage session.
///
/// Every operation takes `&mut self`, so one unit of work is driven by one caller at a
/// time. The first read or write opens the underlying transaction. Writes stay invisible
/// to other units of work until [`UnitOfWork::commit`]. Dropping a running unit of work
/// rolls it back.
pub struct UnitOfWork {
    id: UowId,
    name: String,
    user: String,
    rollback_only: bool,
    lock_mode: LockMode,
    state: TransactionState,
    error: Option<Error>,
    session: Box<dyn GraphSession>,
}

impl UnitOfWork {
    pub fn new(name: &str, user: &str, rollback_only: bool, session: Box<dyn GraphSession>) -> Self {
        Self {
            id: UowId(NEXT_UOW_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.to_string(),
            user: user.to_string(),
            rollback_only,
            lock_mode: LockMode::Deferred,
            state: TransactionState::NotStarted,
            error: None,
            session,
        }
    }

    /// Take the database write lock when the transaction starts rather than on first write
    pub fn with_lock_mode(mut self, mode: LockMode) -> Self {
        self.lock_mode = mode;
        self
    }

    pub fn id(&self) -> UowId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn user_name(&self) -> &str {
        &self.user
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// The error that moved this unit of work to `ERROR`
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn has_changes(&self) -> bool {
        self.state == TransactionState::Running && self.session.has_pending_changes()
    }

    fn invalid_state(&self, action: &str) -> Error {
        Error::TransactionState(format!(
            "cannot {} in transaction '{}' ({}): it is {}",
            action, self.name, self.id, self.state
        ))
    }

    /// Check that this unit of work can still be used; fails fast once terminal
    pub fn ensure_live(&self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.invalid_state("read or write"));
        }
        Ok(())
    }

    fn fail(&mut self, err: Error) {
        if let Err(rollback_err) = self.session.discard() {
            warn!(transaction = %self.name, error = %rollback_err, "rollback after failure also failed");
        }
        debug!(transaction = %self.name, id = %self.id, error = %err, "transaction -> ERROR");
        self.state = TransactionState::Error;
        self.error = Some(err);
    }

    /// Run one session operation, starting the transaction on first use
    fn run<T>(&mut self, op: impl FnOnce(&mut dyn GraphSession) -> Result<T>) -> Result<T> {
        self.ensure_live()?;
        if self.state == TransactionState::NotStarted {
            if let Err(err) = self.session.begin(self.lock_mode) {
                if err.poisons_transaction() {
                    self.fail(err.clone());
                }
                return Err(err);
            }
            self.state = TransactionState::Running;
            debug!(transaction = %self.name, id = %self.id, user = %self.user, "transaction -> RUNNING");
        }

        let result = op(self.session.as_mut());
        if let Err(err) = &result {
            if err.poisons_transaction() {
                self.fail(err.clone());
            }
        }
        result
    }

    // ========== Node Operations ==========

    /// Create a child node; same-named siblings get an index suffix
    pub fn create_node(&mut self, parent: &NodePath, name: &str, node_type: &str) -> Result<NodePath> {
        self.run(|s| s.create_node(parent, name, node_type))
    }

    /// Stored type discriminator, `None` if no node lives at `path`
    pub fn node_type(&mut self, path: &NodePath) -> Result<Option<String>> {
        self.run(|s| s.node_type(path))
    }

    pub fn exists(&mut self, path: &NodePath) -> Result<bool> {
        Ok(self.node_type(path)?.is_some())
    }

    pub fn children(&mut self, path: &NodePath) -> Result<Vec<NodePath>> {
        self.run(|s| s.children(path))
    }

    /// The child whose name is exactly `name`, if any
    pub fn child(&mut self, parent: &NodePath, name: &str) -> Result<Option<NodePath>> {
        let path = parent.child(name)?;
        Ok(self.exists(&path)?.then_some(path))
    }

    /// Return the named child, creating it with `node_type` when missing
    pub fn ensure_child(&mut self, parent: &NodePath, name: &str, node_type: &str) -> Result<NodePath> {
        match self.child(parent, name)? {
            Some(path) => Ok(path),
            None => self.create_node(parent, name, node_type),
        }
    }

    /// Remove a node with its whole subtree
    pub fn remove_node(&mut self, path: &NodePath) -> Result<()> {
        self.run(|s| s.remove_node(path))
    }

    /// Nodes of one type at or below `under`, ordered by path
    pub fn nodes_of_type(&mut self, node_type: &str, under: &NodePath) -> Result<Vec<NodePath>> {
        self.run(|s| s.nodes_of_type(node_type, under))
    }

    // ========== Property Operations ==========

    pub fn set_property(&mut self, path: &NodePath, name: &str, value: impl Into<Property>) -> Result<()> {
        let value = value.into();
        self.run(|s| s.set_property(path, name, Some(&value)))
    }

    pub fn remove_property(&mut self, path: &NodePath, name: &str) -> Result<()> {
        self.run(|s| s.set_property(path, name, None))
    }

    pub fn property(&mut self, path: &NodePath, name: &str) -> Result<Option<Property>> {
        self.run(|s| s.property(path, name))
    }

    pub fn string_property(&mut self, path: &NodePath, name: &str) -> Result<Option<String>> {
        Ok(self.property(path, name)?.and_then(|p| p.as_str().map(str::to_string)))
    }

    pub fn properties(&mut self, path: &NodePath) -> Result<Vec<(String, Property)>> {
        self.run(|s| s.properties(path))
    }

    /// Copy a subtree into a serializable snapshot
    pub fn snapshot(&mut self, path: &NodePath) -> Result<NodeSnapshot> {
        let node_type = self
            .node_type(path)?
            .ok_or_else(|| Error::NodeNotFound(path.to_string()))?;
        let properties = self.properties(path)?;
        let children = self
            .children(path)?
            .iter()
            .map(|child| self.snapshot(child))
            .collect::<Result<Vec<_>>>()?;
        Ok(NodeSnapshot {
            name: path.name().to_string(),
            node_type,
            properties,
            children,
        })
    }

    // ========== Completion ==========

    /// Persist all writes. A rollback-only unit of work rolls back instead.
    pub fn commit(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.invalid_state("commit"));
        }
        if self.rollback_only {
            debug!(transaction = %self.name, "rollback-only transaction, rolling back on commit");
            return self.rollback();
        }
        if self.state == TransactionState::Running {
            if let Err(err) = self.session.save() {
                self.fail(err.clone());
                return Err(err);
            }
        }
        self.state = TransactionState::Committed;
        debug!(transaction = %self.name, id = %self.id, "transaction -> COMMITTED");
        Ok(())
    }

    /// Discard all writes
    pub fn rollback(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.invalid_state("roll back"));
        }
        if self.state == TransactionState::Running {
            if let Err(err) = self.session.discard() {
                self.state = TransactionState::Error;
                self.error = Some(err.clone());
                return Err(err);
            }
        }
        self.state = TransactionState::RolledBack;
        debug!(transaction = %self.name, id = %self.id, "transaction -> ROLLED_BACK");
        Ok(())
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.state == TransactionState::Running {
            debug!(transaction = %self.name, id = %self.id, "dropped while running, rolling back");
            if let Err(err) = self.session.discard() {
                warn!(transaction = %self.name, error = %err, "implicit rollback failed");
            }
            self.state = TransactionState::RolledBack;
        }
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("state", &self.state)
            .field("rollback_only", &self.rollback_only)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;

    fn root() -> NodePath {
        NodePath::root()
    }

    #[test]
    fn test_first_operation_starts_transaction() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("start").unwrap();
        assert_eq!(uow.state(), TransactionState::NotStarted);
        uow.children(&root()).unwrap();
        assert_eq!(uow.state(), TransactionState::Running);
        assert!(!uow.has_changes());
        uow.create_node(&root(), "x", "t").unwrap();
        assert!(uow.has_changes());
        uow.commit().unwrap();
        assert_eq!(uow.state(), TransactionState::Committed);
    }

    #[test]
    fn test_commit_without_work() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("idle").unwrap();
        uow.commit().unwrap();
        assert_eq!(uow.state(), TransactionState::Committed);
    }

    #[test]
    fn test_terminal_state_rejects_everything() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("done").unwrap();
        uow.create_node(&root(), "x", "t").unwrap();
        uow.commit().unwrap();

        let err = uow.create_node(&root(), "y", "t").unwrap_err();
        assert!(matches!(err, Error::TransactionState(_)));
        assert!(err.is_programming_error());
        assert!(matches!(uow.commit(), Err(Error::TransactionState(_))));
        assert!(matches!(uow.rollback(), Err(Error::TransactionState(_))));
        assert!(matches!(uow.children(&root()), Err(Error::TransactionState(_))));
    }

    #[test]
    fn test_rollback_discards() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("discard").unwrap();
        uow.create_node(&root(), "x", "t").unwrap();
        uow.rollback().unwrap();
        assert_eq!(uow.state(), TransactionState::RolledBack);

        let mut check = store.begin("check").unwrap();
        assert!(!check.exists(&NodePath::parse("/x").unwrap()).unwrap());
    }

    #[test]
    fn test_rollback_only_commit_rolls_back() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin_as("alice", "preview", true).unwrap();
        assert_eq!(uow.user_name(), "alice");
        assert!(uow.is_rollback_only());
        uow.create_node(&root(), "x", "t").unwrap();
        uow.commit().unwrap();
        assert_eq!(uow.state(), TransactionState::RolledBack);

        let mut check = store.begin("check").unwrap();
        assert!(!check.exists(&NodePath::parse("/x").unwrap()).unwrap());
    }

    #[test]
    fn test_drop_while_running_rolls_back() {
        let store = GraphStore::open_temporary().unwrap();
        {
            let mut uow = store.begin("dropped").unwrap();
            uow.create_node(&root(), "x", "t").unwrap();
        }
        let mut check = store.begin("check").unwrap();
        assert!(!check.exists(&NodePath::parse("/x").unwrap()).unwrap());
    }

    #[test]
    fn test_ordinary_errors_keep_transaction_running() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("lenient").unwrap();
        let missing = NodePath::parse("/missing").unwrap();
        assert!(matches!(uow.create_node(&missing, "x", "t"), Err(Error::NodeNotFound(_))));
        assert_eq!(uow.state(), TransactionState::Running);
        uow.create_node(&root(), "x", "t").unwrap();
        uow.commit().unwrap();
    }

    #[test]
    fn test_snapshot() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("snap").unwrap();
        let a = uow.create_node(&root(), "a", "t").unwrap();
        uow.set_property(&a, "p", "v").unwrap();
        uow.create_node(&a, "b", "u").unwrap();

        let snap = uow.snapshot(&a).unwrap();
        assert_eq!(snap.node_type, "t");
        assert_eq!(snap.property("p").and_then(|p| p.as_str()), Some("v"));
        assert_eq!(snap.child("b").unwrap().node_type, "u");
        assert_eq!(snap.node_count(), 2);
    }
}
