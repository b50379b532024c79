//! # Datagraph - Sequenced Metadata Graph
//!
//! Turns parsed SQL commands and VDB documents into a persistent node graph and keeps a
//! set of externally declared data sources mirrored in that graph.
//!
//! Datagraph provides:
//! - A path-addressed node graph over SQLite with session-scoped transactions
//! - A `UnitOfWork` transaction boundary with a strict state machine
//! - A sequencer mapping command/document trees onto node subtrees
//! - A type resolver registry exposing typed domain facades over raw nodes
//! - A reconciliation engine that diffs desired sources against persisted ones

pub mod graph;
pub mod uow;
pub mod lexicon;
pub mod sequencer;
pub mod model;
pub mod sync;
pub mod server;
pub mod watcher;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use graph::{GraphStore, LockMode, NodePath, Property, PropertyValue, NodeSnapshot};
pub use uow::{UnitOfWork, TransactionState, UowId};
pub use sequencer::{Sequencer, SequenceOutcome};
pub use model::{TypeRegistry, DomainObject, DomainKind, WorkspaceManager};
pub use sync::{ReconciliationEngine, ReconcileReport, ExternalSource, SourceEvent};

/// Result type alias for Datagraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Datagraph operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Sequencing error: {0}")]
    Sequencing(String),

    #[error("Invalid transaction state: {0}")]
    TransactionState(String),

    #[error("Type mismatch at {path}: expected {expected}, found {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("External source '{id}': {message}")]
    ExternalSource { id: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Misuse of the API rather than a runtime condition; not recoverable within a request.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Error::TransactionState(_) | Error::TypeMismatch { .. })
    }

    /// Failures a caller may retry in a later transaction or reconciliation cycle.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::ExternalSource { .. })
    }

    /// Whether this error leaves the surrounding transaction unusable.
    pub(crate) fn poisons_transaction(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::Storage(_))
    }

    pub(crate) fn external(id: &str, message: impl std::fmt::Display) -> Self {
        Error::ExternalSource {
            id: id.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, _) = &err {
            if matches!(
                failure.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) {
                return Error::Conflict(err.to_string());
            }
        }
        Error::Storage(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_maps_to_conflict() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".into()),
        );
        assert!(matches!(Error::from(err), Error::Conflict(_)));
    }

    #[test]
    fn test_other_sqlite_errors_map_to_storage() {
        let err = rusqlite::Error::QueryReturnedNoRows;
        assert!(matches!(Error::from(err), Error::Storage(_)));
    }

    #[test]
    fn test_classification() {
        assert!(Error::TransactionState("done".into()).is_programming_error());
        assert!(Error::TypeMismatch {
            path: "/a".into(),
            expected: "x".into(),
            actual: "y".into()
        }
        .is_programming_error());
        assert!(Error::Conflict("busy".into()).is_recoverable());
        assert!(Error::external("pg1", "refused").is_recoverable());
        assert!(!Error::Parse("bad".into()).is_recoverable());
    }
}
