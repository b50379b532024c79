//! Domain model: typed views over graph nodes

mod facades;
mod resolver;
mod workspace;

pub use facades::{Connection, Dataservice, Model, ModelSource, ObjectRef, Schema, Statement, Vdb};
pub use resolver::{DomainKind, DomainObject, DomainType, TypeRegistry, TypeResolver};
pub use workspace::{WorkspaceManager, sanitize_name};
