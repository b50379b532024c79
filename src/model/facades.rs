//! Typed facades over resolved nodes
//!
//! A facade holds only the node path and the id of the unit of work that resolved it.
//! Every accessor takes that unit of work back and refuses any other one, or one that
//! has already terminated.

use std::str::FromStr;
use crate::{Error, Result};
use crate::graph::{NodePath, NodeSnapshot, Property};
use crate::lexicon::{dv, vdb};
use crate::sync::Origin;
use crate::uow::{UnitOfWork, UowId};
use super::resolver::{resolve_standard, typed_children};

/// Path plus owning transaction: the whole state of a resolved object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    path: NodePath,
    owner: UowId,
}

impl ObjectRef {
    pub(crate) fn new(path: NodePath, owner: UowId) -> Self {
        Self { path, owner }
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn owner(&self) -> UowId {
        self.owner
    }

    /// The unit of work must be the one that resolved this object, and still live
    pub(crate) fn check(&self, uow: &UnitOfWork) -> Result<()> {
        uow.ensure_live()?;
        if uow.id() != self.owner {
            return Err(Error::TransactionState(format!(
                "{} belongs to {}, not {}",
                self.path,
                self.owner,
                uow.id()
            )));
        }
        Ok(())
    }

    fn string(&self, uow: &mut UnitOfWork, name: &str) -> Result<Option<String>> {
        self.check(uow)?;
        uow.string_property(&self.path, name)
    }

    fn set(&self, uow: &mut UnitOfWork, name: &str, value: impl Into<Property>) -> Result<()> {
        self.check(uow)?;
        uow.set_property(&self.path, name, value)
    }

    fn set_opt(&self, uow: &mut UnitOfWork, name: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => self.set(uow, name, value),
            None => {
                self.check(uow)?;
                uow.remove_property(&self.path, name)
            }
        }
    }
}

macro_rules! facade {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name(ObjectRef);

        impl $name {
            pub(crate) fn new(object: ObjectRef) -> Self {
                Self(object)
            }

            pub(crate) fn object(&self) -> &ObjectRef {
                &self.0
            }

            pub fn path(&self) -> &NodePath {
                self.0.path()
            }

            pub fn name(&self) -> &str {
                self.0.path().name()
            }
        }
    };
}

facade!(
    /// A published service wrapping one or more VDBs
    Dataservice
);
facade!(Vdb);
facade!(Model);
facade!(ModelSource);
facade!(
    /// Persisted mirror of one external source
    Connection
);
facade!(
    /// Metadata schema read from a connection
    Schema
);
facade!(
    /// Root node of a sequenced SQL command
    Statement
);

// ========== Connection ==========

impl Connection {
    pub fn source_id(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, dv::SOURCE_ID)
    }

    pub fn display_name(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, dv::DISPLAY_NAME)
    }

    pub fn connection_type(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, dv::CONNECTION_TYPE)
    }

    pub fn translator(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, dv::TRANSLATOR)
    }

    /// Stored origin tag; untagged records count as external
    pub fn origin(&self, uow: &mut UnitOfWork) -> Result<Origin> {
        match self.0.string(uow, dv::ORIGIN)? {
            Some(tag) => Origin::from_str(&tag),
            None => Ok(Origin::External),
        }
    }

    pub fn address(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, dv::ADDRESS)
    }

    pub fn fingerprint(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, dv::FINGERPRINT)
    }

    pub(crate) fn set_fingerprint(&self, uow: &mut UnitOfWork, fingerprint: &str) -> Result<()> {
        self.0.set(uow, dv::FINGERPRINT, fingerprint)
    }

    pub(crate) fn set_address(&self, uow: &mut UnitOfWork, address: Option<&str>) -> Result<()> {
        self.0.set_opt(uow, dv::ADDRESS, address)
    }

    pub fn schema(&self, uow: &mut UnitOfWork) -> Result<Option<Schema>> {
        self.0.check(uow)?;
        match uow.child(self.path(), dv::SCHEMA_NODE)? {
            Some(path) => resolve_standard(uow, &path).map(Some),
            None => Ok(None),
        }
    }

    pub fn ensure_schema(&self, uow: &mut UnitOfWork) -> Result<Schema> {
        self.0.check(uow)?;
        let path = uow.ensure_child(self.path(), dv::SCHEMA_NODE, dv::SCHEMA)?;
        resolve_standard(uow, &path)
    }

    /// Drop the schema subtree; true when there was one
    pub fn remove_schema(&self, uow: &mut UnitOfWork) -> Result<bool> {
        self.0.check(uow)?;
        match uow.child(self.path(), dv::SCHEMA_NODE)? {
            Some(path) => {
                uow.remove_node(&path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ========== Dataservice ==========

impl Dataservice {
    pub fn description(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, dv::DESCRIPTION)
    }

    pub fn set_description(&self, uow: &mut UnitOfWork, description: Option<&str>) -> Result<()> {
        self.0.set_opt(uow, dv::DESCRIPTION, description)
    }

    /// Source identifier under which this service is itself published, if any
    pub fn published_source_id(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, dv::PUBLISHED_SOURCE_ID)
    }

    pub fn set_published_source_id(&self, uow: &mut UnitOfWork, id: Option<&str>) -> Result<()> {
        self.0.set_opt(uow, dv::PUBLISHED_SOURCE_ID, id)
    }

    pub fn service_vdb(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, dv::SERVICE_VDB)
    }

    pub fn set_service_vdb(&self, uow: &mut UnitOfWork, name: &str) -> Result<()> {
        self.0.set(uow, dv::SERVICE_VDB, name)
    }

    pub fn vdbs(&self, uow: &mut UnitOfWork) -> Result<Vec<Vdb>> {
        self.0.check(uow)?;
        typed_children(uow, self.path())
    }
}

// ========== VDB documents ==========

impl Vdb {
    pub fn version(&self, uow: &mut UnitOfWork) -> Result<Option<i64>> {
        self.0.check(uow)?;
        Ok(uow.property(self.path(), vdb::VERSION)?.and_then(|p| p.as_long()))
    }

    pub fn description(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, vdb::DESCRIPTION)
    }

    pub fn models(&self, uow: &mut UnitOfWork) -> Result<Vec<Model>> {
        self.0.check(uow)?;
        typed_children(uow, self.path())
    }

    /// Value of a declared VDB property
    pub fn property(&self, uow: &mut UnitOfWork, key: &str) -> Result<Option<String>> {
        self.0.check(uow)?;
        let Some(node) = uow.child(self.path(), key)? else {
            return Ok(None);
        };
        if uow.node_type(&node)?.as_deref() != Some(vdb::PROPERTY) {
            return Ok(None);
        }
        uow.string_property(&node, vdb::VALUE)
    }
}

impl Model {
    pub fn model_type(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, vdb::MODEL_TYPE)
    }

    pub fn visible(&self, uow: &mut UnitOfWork) -> Result<bool> {
        self.0.check(uow)?;
        Ok(uow
            .property(self.path(), vdb::VISIBLE)?
            .and_then(|p| p.as_bool())
            .unwrap_or(true))
    }

    pub fn metadata_type(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, vdb::METADATA_TYPE)
    }

    /// Embedded DDL text
    pub fn definition(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, vdb::MODEL_DEFINITION)
    }

    pub fn sources(&self, uow: &mut UnitOfWork) -> Result<Vec<ModelSource>> {
        self.0.check(uow)?;
        typed_children(uow, self.path())
    }
}

impl ModelSource {
    pub fn translator(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, vdb::SOURCE_TRANSLATOR)
    }

    pub fn jndi_name(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, vdb::SOURCE_JNDI_NAME)
    }
}

// ========== Schema & Statement ==========

impl Schema {
    pub fn ddl(&self, uow: &mut UnitOfWork) -> Result<Option<String>> {
        self.0.string(uow, dv::DDL)
    }

    pub fn set_ddl(&self, uow: &mut UnitOfWork, ddl: &str) -> Result<()> {
        self.0.set(uow, dv::DDL, ddl)
    }

    pub fn statements(&self, uow: &mut UnitOfWork) -> Result<Vec<Statement>> {
        self.0.check(uow)?;
        typed_children(uow, self.path())
    }
}

impl Statement {
    pub fn command_type(&self, uow: &mut UnitOfWork) -> Result<String> {
        self.0.check(uow)?;
        uow.node_type(self.path())?
            .ok_or_else(|| Error::NodeNotFound(self.path().to_string()))
    }

    pub fn snapshot(&self, uow: &mut UnitOfWork) -> Result<NodeSnapshot> {
        self.0.check(uow)?;
        uow.snapshot(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;
    use crate::model::TypeRegistry;

    #[test]
    fn test_connection_accessors() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("facade").unwrap();
        let path = uow.create_node(&NodePath::root(), "pg1", dv::CONNECTION).unwrap();
        uow.set_property(&path, dv::SOURCE_ID, "pg1").unwrap();
        uow.set_property(&path, dv::ORIGIN, "self_published").unwrap();

        let conn = TypeRegistry::standard().resolve_as::<Connection>(&mut uow, &path).unwrap();
        assert_eq!(conn.source_id(&mut uow).unwrap().as_deref(), Some("pg1"));
        assert_eq!(conn.origin(&mut uow).unwrap(), Origin::SelfPublished);
        assert!(conn.schema(&mut uow).unwrap().is_none());

        let schema = conn.ensure_schema(&mut uow).unwrap();
        schema.set_ddl(&mut uow, "CREATE FOREIGN TABLE t (id integer);").unwrap();
        assert_eq!(conn.schema(&mut uow).unwrap(), Some(schema));
        assert!(conn.remove_schema(&mut uow).unwrap());
        assert!(!conn.remove_schema(&mut uow).unwrap());
    }

    #[test]
    fn test_facade_rejects_terminated_transaction() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("facade").unwrap();
        let path = uow.create_node(&NodePath::root(), "svc", dv::DATASERVICE).unwrap();
        let service = TypeRegistry::standard().resolve_as::<Dataservice>(&mut uow, &path).unwrap();
        uow.commit().unwrap();

        let err = service.description(&mut uow).unwrap_err();
        assert!(matches!(err, Error::TransactionState(_)));
        assert!(err.is_programming_error());
    }

    #[test]
    fn test_facade_rejects_foreign_transaction() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("one").unwrap();
        let path = uow.create_node(&NodePath::root(), "svc", dv::DATASERVICE).unwrap();
        let service = TypeRegistry::standard().resolve_as::<Dataservice>(&mut uow, &path).unwrap();
        uow.commit().unwrap();

        let mut other = store.begin("two").unwrap();
        assert!(matches!(
            service.published_source_id(&mut other),
            Err(Error::TransactionState(_))
        ));
    }

    #[test]
    fn test_optional_setter_clears() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("facade").unwrap();
        let path = uow.create_node(&NodePath::root(), "svc", dv::DATASERVICE).unwrap();
        let service = TypeRegistry::standard().resolve_as::<Dataservice>(&mut uow, &path).unwrap();

        service.set_published_source_id(&mut uow, Some("svc_source")).unwrap();
        assert_eq!(service.published_source_id(&mut uow).unwrap().as_deref(), Some("svc_source"));
        service.set_published_source_id(&mut uow, None).unwrap();
        assert!(service.published_source_id(&mut uow).unwrap().is_none());

        service.set_description(&mut uow, Some("customer accounts")).unwrap();
        service.set_service_vdb(&mut uow, "PortfolioService").unwrap();
        assert_eq!(service.description(&mut uow).unwrap().as_deref(), Some("customer accounts"));
        assert_eq!(service.service_vdb(&mut uow).unwrap().as_deref(), Some("PortfolioService"));
        service.set_description(&mut uow, None).unwrap();
        assert!(service.description(&mut uow).unwrap().is_none());
    }
}
