//! Workspace layout and the create/find helpers built on it
//!
//! ```text
//! /workspace
//!   connections/    one dv:connection per persisted source
//!   dataservices/
//!   vdbs/           sequenced VDB documents
//!   statements/     sequenced SQL commands
//! ```

use std::sync::Arc;
use tracing::debug;
use crate::Result;
use crate::graph::NodePath;
use crate::lexicon::{dg, dv};
use crate::sync::ExternalSource;
use crate::uow::UnitOfWork;
use super::facades::{Connection, Dataservice, Statement};
use super::resolver::{DomainObject, DomainType, TypeRegistry, typed_children};

/// Replace characters a node name cannot hold
pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if matches!(c, '/' | '[' | ']') || c.is_control() { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" => "_".to_string(),
        "." | ".." => cleaned.replace('.', "_"),
        _ => cleaned,
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    registry: Arc<TypeRegistry>,
}

impl Default for WorkspaceManager {
    fn default() -> Self {
        Self::new(Arc::new(TypeRegistry::standard()))
    }
}

impl WorkspaceManager {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn workspace_path() -> NodePath {
        NodePath::root().join(dg::WORKSPACE_NAME)
    }

    /// Existing folder path, without creating anything
    fn folder_path(name: &str) -> NodePath {
        Self::workspace_path().join(name)
    }

    /// The named workspace folder, created on first use
    pub fn folder(&self, uow: &mut UnitOfWork, name: &str) -> Result<NodePath> {
        let workspace = uow.ensure_child(&NodePath::root(), dg::WORKSPACE_NAME, dg::WORKSPACE)?;
        uow.ensure_child(&workspace, name, dg::FOLDER)
    }

    pub fn vdbs_folder(&self, uow: &mut UnitOfWork) -> Result<NodePath> {
        self.folder(uow, dg::VDBS_FOLDER)
    }

    pub fn statements_folder(&self, uow: &mut UnitOfWork) -> Result<NodePath> {
        self.folder(uow, dg::STATEMENTS_FOLDER)
    }

    /// Typed children of a folder; a missing folder reads as empty
    fn list<T: DomainType>(&self, uow: &mut UnitOfWork, folder: &str) -> Result<Vec<T>> {
        let path = Self::folder_path(folder);
        if !uow.exists(&path)? {
            return Ok(Vec::new());
        }
        typed_children(uow, &path)
    }

    // ========== Connections ==========

    /// Persist `source` as a new connection node
    pub fn create_connection(&self, uow: &mut UnitOfWork, source: &ExternalSource) -> Result<Connection> {
        let folder = self.folder(uow, dg::CONNECTIONS_FOLDER)?;
        let path = uow.create_node(&folder, &sanitize_name(&source.id), dv::CONNECTION)?;
        uow.set_property(&path, dv::SOURCE_ID, source.id.as_str())?;
        uow.set_property(&path, dv::DISPLAY_NAME, source.name.as_str())?;
        uow.set_property(&path, dv::CONNECTION_TYPE, source.connection_type.as_str())?;
        uow.set_property(&path, dv::TRANSLATOR, source.translator.as_str())?;
        uow.set_property(&path, dv::ORIGIN, source.origin.as_str())?;

        let connection = self.registry.resolve_as::<Connection>(uow, &path)?;
        connection.set_address(uow, source.address.as_deref())?;
        connection.set_fingerprint(uow, &source.fingerprint())?;
        debug!(source = %source.id, path = %path, "connection node created");
        Ok(connection)
    }

    pub fn connections(&self, uow: &mut UnitOfWork) -> Result<Vec<Connection>> {
        self.list(uow, dg::CONNECTIONS_FOLDER)
    }

    pub fn find_connection(&self, uow: &mut UnitOfWork, source_id: &str) -> Result<Option<Connection>> {
        for connection in self.connections(uow)? {
            if connection.source_id(uow)?.as_deref() == Some(source_id) {
                return Ok(Some(connection));
            }
        }
        Ok(None)
    }

    // ========== Dataservices ==========

    pub fn create_dataservice(
        &self,
        uow: &mut UnitOfWork,
        name: &str,
        published_source_id: Option<&str>,
    ) -> Result<Dataservice> {
        let folder = self.folder(uow, dg::DATASERVICES_FOLDER)?;
        let path = uow.create_node(&folder, &sanitize_name(name), dv::DATASERVICE)?;
        let service = self.registry.resolve_as::<Dataservice>(uow, &path)?;
        service.set_published_source_id(uow, published_source_id)?;
        Ok(service)
    }

    pub fn dataservices(&self, uow: &mut UnitOfWork) -> Result<Vec<Dataservice>> {
        self.list(uow, dg::DATASERVICES_FOLDER)
    }

    /// The dataservice this system publishes under `source_id`, if any
    pub fn find_dataservice_by_source_id(&self, uow: &mut UnitOfWork, source_id: &str) -> Result<Option<Dataservice>> {
        for service in self.dataservices(uow)? {
            if service.published_source_id(uow)?.as_deref() == Some(source_id) {
                return Ok(Some(service));
            }
        }
        Ok(None)
    }

    // ========== Statements ==========

    pub fn statements(&self, uow: &mut UnitOfWork) -> Result<Vec<Statement>> {
        self.list(uow, dg::STATEMENTS_FOLDER)
    }

    /// Remove a resolved object with its subtree
    pub fn remove(&self, uow: &mut UnitOfWork, obj: &DomainObject) -> Result<()> {
        obj.object().check(uow)?;
        uow.remove_node(obj.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;
    use crate::sync::Origin;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("pg1"), "pg1");
        assert_eq!(sanitize_name("a/b[2]"), "a_b_2_");
        assert_eq!(sanitize_name(".."), "__");
        assert_eq!(sanitize_name(""), "_");
    }

    #[test]
    fn test_connection_round_trip() {
        let store = GraphStore::open_temporary().unwrap();
        let manager = WorkspaceManager::default();
        let mut source = ExternalSource::new("pg1", "postgresql");
        source.address = Some("localhost:5432".into());

        let mut uow = store.begin("create").unwrap();
        let created = manager.create_connection(&mut uow, &source).unwrap();
        assert_eq!(created.path().as_str(), "/workspace/connections/pg1");
        uow.commit().unwrap();

        let mut uow = store.begin("find").unwrap();
        let found = manager.find_connection(&mut uow, "pg1").unwrap().unwrap();
        assert_eq!(found.connection_type(&mut uow).unwrap().as_deref(), Some("postgresql"));
        assert_eq!(found.origin(&mut uow).unwrap(), Origin::External);
        assert_eq!(found.address(&mut uow).unwrap().as_deref(), Some("localhost:5432"));
        assert_eq!(found.fingerprint(&mut uow).unwrap(), Some(source.fingerprint()));
        assert!(manager.find_connection(&mut uow, "mysql1").unwrap().is_none());
    }

    #[test]
    fn test_reads_do_not_create_folders() {
        let store = GraphStore::open_temporary().unwrap();
        let manager = WorkspaceManager::default();
        let mut uow = store.begin("read").unwrap();
        assert!(manager.connections(&mut uow).unwrap().is_empty());
        assert!(manager.dataservices(&mut uow).unwrap().is_empty());
        assert!(!uow.has_changes());
    }

    #[test]
    fn test_find_dataservice_by_source_id() {
        let store = GraphStore::open_temporary().unwrap();
        let manager = WorkspaceManager::default();
        let mut uow = store.begin("services").unwrap();
        manager.create_dataservice(&mut uow, "Portfolio", Some("portfolio_svc")).unwrap();
        manager.create_dataservice(&mut uow, "Internal", None).unwrap();

        let found = manager.find_dataservice_by_source_id(&mut uow, "portfolio_svc").unwrap().unwrap();
        assert_eq!(found.name(), "Portfolio");
        assert!(manager.find_dataservice_by_source_id(&mut uow, "pg1").unwrap().is_none());
    }

    #[test]
    fn test_remove_object() {
        let store = GraphStore::open_temporary().unwrap();
        let manager = WorkspaceManager::default();
        let mut uow = store.begin("remove").unwrap();
        let conn = manager.create_connection(&mut uow, &ExternalSource::new("pg1", "postgresql")).unwrap();
        conn.ensure_schema(&mut uow).unwrap();

        manager.remove(&mut uow, &DomainObject::Connection(conn.clone())).unwrap();
        assert!(manager.connections(&mut uow).unwrap().is_empty());
        assert!(!uow.exists(&conn.path().join(dv::SCHEMA_NODE)).unwrap());
    }
}
