//! Keeping persisted connections in line with an external source inventory

mod engine;
mod inventory;
pub mod source;

pub use engine::{AddOutcome, EventOutcome, ReconcileFailure, ReconcileReport, ReconciliationEngine, RemoveOutcome};
pub use inventory::{FileInventory, MemoryInventory};
pub use source::{
    ConnectionHandle, ExternalSource, LoggingRefresher, MetadataRefresher, Origin, RefreshMode, SourceAction,
    SourceEvent, SourceInventory,
};
