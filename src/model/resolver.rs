//! Typed resolution of raw nodes into domain facades

use std::collections::HashMap;
use std::fmt;
use serde::Serialize;
use crate::{Error, Result};
use crate::graph::NodePath;
use crate::lexicon::{dv, sql, vdb};
use crate::uow::{UnitOfWork, UowId};
use super::facades::{Connection, Dataservice, Model, ModelSource, ObjectRef, Schema, Statement, Vdb};

/// The closed set of domain variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    Dataservice,
    Vdb,
    Model,
    ModelSource,
    Connection,
    Schema,
    Statement,
}

impl DomainKind {
    pub const ALL: [DomainKind; 7] = [
        DomainKind::Dataservice,
        DomainKind::Vdb,
        DomainKind::Model,
        DomainKind::ModelSource,
        DomainKind::Connection,
        DomainKind::Schema,
        DomainKind::Statement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainKind::Dataservice => "dataservice",
            DomainKind::Vdb => "vdb",
            DomainKind::Model => "model",
            DomainKind::ModelSource => "model_source",
            DomainKind::Connection => "connection",
            DomainKind::Schema => "schema",
            DomainKind::Statement => "statement",
        }
    }

    /// Node types the built-in resolver for this kind claims
    pub fn node_types(&self) -> &'static [&'static str] {
        match self {
            DomainKind::Dataservice => &[dv::DATASERVICE],
            DomainKind::Vdb => &[vdb::VIRTUAL_DATABASE],
            DomainKind::Model => &[vdb::MODEL],
            DomainKind::ModelSource => &[vdb::MODEL_SOURCE],
            DomainKind::Connection => &[dv::CONNECTION],
            DomainKind::Schema => &[dv::SCHEMA],
            DomainKind::Statement => sql::COMMAND_TYPES,
        }
    }

    fn construct(&self) -> fn(ObjectRef) -> DomainObject {
        match self {
            DomainKind::Dataservice => |o| DomainObject::Dataservice(Dataservice::new(o)),
            DomainKind::Vdb => |o| DomainObject::Vdb(Vdb::new(o)),
            DomainKind::Model => |o| DomainObject::Model(Model::new(o)),
            DomainKind::ModelSource => |o| DomainObject::ModelSource(ModelSource::new(o)),
            DomainKind::Connection => |o| DomainObject::Connection(Connection::new(o)),
            DomainKind::Schema => |o| DomainObject::Schema(Schema::new(o)),
            DomainKind::Statement => |o| DomainObject::Statement(Statement::new(o)),
        }
    }
}

impl fmt::Display for DomainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resolved node, typed as one domain variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainObject {
    Dataservice(Dataservice),
    Vdb(Vdb),
    Model(Model),
    ModelSource(ModelSource),
    Connection(Connection),
    Schema(Schema),
    Statement(Statement),
}

impl DomainObject {
    pub fn kind(&self) -> DomainKind {
        match self {
            DomainObject::Dataservice(_) => DomainKind::Dataservice,
            DomainObject::Vdb(_) => DomainKind::Vdb,
            DomainObject::Model(_) => DomainKind::Model,
            DomainObject::ModelSource(_) => DomainKind::ModelSource,
            DomainObject::Connection(_) => DomainKind::Connection,
            DomainObject::Schema(_) => DomainKind::Schema,
            DomainObject::Statement(_) => DomainKind::Statement,
        }
    }

    pub(crate) fn object(&self) -> &ObjectRef {
        match self {
            DomainObject::Dataservice(o) => o.object(),
            DomainObject::Vdb(o) => o.object(),
            DomainObject::Model(o) => o.object(),
            DomainObject::ModelSource(o) => o.object(),
            DomainObject::Connection(o) => o.object(),
            DomainObject::Schema(o) => o.object(),
            DomainObject::Statement(o) => o.object(),
        }
    }

    pub fn path(&self) -> &NodePath {
        self.object().path()
    }

    pub fn owner(&self) -> UowId {
        self.object().owner()
    }
}

/// Implemented by every facade so callers can ask for a specific variant
pub trait DomainType: Sized {
    const KIND: DomainKind;

    fn from_object(obj: DomainObject) -> Option<Self>;
}

macro_rules! domain_type {
    ($facade:ident) => {
        impl DomainType for $facade {
            const KIND: DomainKind = DomainKind::$facade;

            fn from_object(obj: DomainObject) -> Option<Self> {
                match obj {
                    DomainObject::$facade(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

domain_type!(Dataservice);
domain_type!(Vdb);
domain_type!(Model);
domain_type!(ModelSource);
domain_type!(Connection);
domain_type!(Schema);
domain_type!(Statement);

/// One variant's resolution rule: the discriminators it claims and its constructor
#[derive(Clone)]
pub struct TypeResolver {
    kind: DomainKind,
    node_types: &'static [&'static str],
    construct: fn(ObjectRef) -> DomainObject,
}

impl TypeResolver {
    /// A resolver mapping extra discriminators onto an existing variant
    pub fn new(kind: DomainKind, node_types: &'static [&'static str]) -> Self {
        Self {
            kind,
            node_types,
            construct: kind.construct(),
        }
    }

    /// The built-in resolver for `kind`
    pub fn standard(kind: DomainKind) -> Self {
        Self::new(kind, kind.node_types())
    }

    pub fn kind(&self) -> DomainKind {
        self.kind
    }

    pub fn node_types(&self) -> &'static [&'static str] {
        self.node_types
    }

    fn claims(&self, node_type: &str) -> bool {
        self.node_types.contains(&node_type)
    }

    /// Whether the node's stored discriminator is one this resolver claims
    pub fn resolvable(&self, uow: &mut UnitOfWork, path: &NodePath) -> Result<bool> {
        Ok(uow.node_type(path)?.is_some_and(|t| self.claims(&t)))
    }

    /// Validate the stored discriminator and construct the facade
    pub fn resolve_path(&self, uow: &mut UnitOfWork, path: &NodePath) -> Result<DomainObject> {
        let actual = uow
            .node_type(path)?
            .ok_or_else(|| Error::NodeNotFound(path.to_string()))?;
        if !self.claims(&actual) {
            return Err(Error::TypeMismatch {
                path: path.to_string(),
                expected: self.node_types.join(" | "),
                actual,
            });
        }
        Ok((self.construct)(ObjectRef::new(path.clone(), uow.id())))
    }

    /// Re-cast an object already typed as this variant; otherwise validate and construct
    pub fn resolve(&self, uow: &mut UnitOfWork, obj: &DomainObject) -> Result<DomainObject> {
        if obj.kind() == self.kind && obj.owner() == uow.id() {
            uow.ensure_live()?;
            return Ok(obj.clone());
        }
        self.resolve_path(uow, obj.path())
    }
}

impl fmt::Debug for TypeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeResolver")
            .field("kind", &self.kind)
            .field("node_types", &self.node_types)
            .finish()
    }
}

/// Resolve `path` as `T` with the built-in resolver
pub(crate) fn resolve_standard<T: DomainType>(uow: &mut UnitOfWork, path: &NodePath) -> Result<T> {
    let obj = TypeResolver::standard(T::KIND).resolve_path(uow, path)?;
    T::from_object(obj).ok_or_else(|| Error::TypeMismatch {
        path: path.to_string(),
        expected: T::KIND.to_string(),
        actual: "other variant".to_string(),
    })
}

/// Children of `parent` that resolve as `T`, in sibling order
pub(crate) fn typed_children<T: DomainType>(uow: &mut UnitOfWork, parent: &NodePath) -> Result<Vec<T>> {
    let resolver = TypeResolver::standard(T::KIND);
    let mut found = Vec::new();
    for child in uow.children(parent)? {
        if resolver.resolvable(uow, &child)? {
            found.extend(T::from_object(resolver.resolve_path(uow, &child)?));
        }
    }
    Ok(found)
}

/// Map from stored discriminator to the resolver that claims it, built at startup
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    by_type: HashMap<&'static str, TypeResolver>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl TypeRegistry {
    pub fn empty() -> Self {
        Self {
            by_type: HashMap::new(),
        }
    }

    /// Every built-in variant
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for kind in DomainKind::ALL {
            registry.register(TypeResolver::standard(kind));
        }
        registry
    }

    /// Add a resolver; a discriminator claimed twice goes to the later resolver
    pub fn register(&mut self, resolver: TypeResolver) {
        for node_type in resolver.node_types() {
            self.by_type.insert(node_type, resolver.clone());
        }
    }

    pub fn resolver_for(&self, node_type: &str) -> Option<&TypeResolver> {
        self.by_type.get(node_type)
    }

    /// Discriminators with a resolver, sorted
    pub fn node_types(&self) -> Vec<&'static str> {
        let mut types: Vec<&'static str> = self.by_type.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Typed facade for the node at `path`, or `None` when no variant claims its type
    pub fn resolve(&self, uow: &mut UnitOfWork, path: &NodePath) -> Result<Option<DomainObject>> {
        let node_type = uow
            .node_type(path)?
            .ok_or_else(|| Error::NodeNotFound(path.to_string()))?;
        match self.by_type.get(node_type.as_str()) {
            Some(resolver) => resolver.resolve_path(uow, path).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve `path` as `T`, failing with `TypeMismatch` when its type belongs elsewhere
    pub fn resolve_as<T: DomainType>(&self, uow: &mut UnitOfWork, path: &NodePath) -> Result<T> {
        let node_type = uow
            .node_type(path)?
            .ok_or_else(|| Error::NodeNotFound(path.to_string()))?;
        let mismatch = || Error::TypeMismatch {
            path: path.to_string(),
            expected: T::KIND.to_string(),
            actual: node_type.clone(),
        };
        let resolver = self
            .by_type
            .get(node_type.as_str())
            .filter(|r| r.kind() == T::KIND)
            .ok_or_else(mismatch)?;
        let obj = resolver.resolve_path(uow, path)?;
        T::from_object(obj).ok_or_else(mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;

    fn connection_node(uow: &mut UnitOfWork) -> NodePath {
        uow.create_node(&NodePath::root(), "pg1", dv::CONNECTION).unwrap()
    }

    #[test]
    fn test_resolves_by_stored_type() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("resolve").unwrap();
        let path = connection_node(&mut uow);

        let registry = TypeRegistry::standard();
        let obj = registry.resolve(&mut uow, &path).unwrap().unwrap();
        assert_eq!(obj.kind(), DomainKind::Connection);
        assert_eq!(obj.owner(), uow.id());
        assert!(registry.resolve_as::<Connection>(&mut uow, &path).is_ok());
        assert_eq!(registry.resolver_for(dv::CONNECTION).map(|r| r.kind()), Some(DomainKind::Connection));
        assert!(registry.resolver_for("sql:select").is_none());
    }

    #[test]
    fn test_mismatch_is_rejected() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("resolve").unwrap();
        let path = connection_node(&mut uow);

        let err = TypeRegistry::standard()
            .resolve_as::<Dataservice>(&mut uow, &path)
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert!(err.is_programming_error());

        let err = TypeResolver::standard(DomainKind::Vdb)
            .resolve_path(&mut uow, &path)
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { actual, .. } if actual == dv::CONNECTION));
    }

    #[test]
    fn test_unclaimed_type_resolves_to_none() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("resolve").unwrap();
        let path = uow.create_node(&NodePath::root(), "misc", "nt:unstructured").unwrap();
        assert!(TypeRegistry::standard().resolve(&mut uow, &path).unwrap().is_none());
    }

    #[test]
    fn test_fast_path_recasts_typed_object() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("resolve").unwrap();
        let path = connection_node(&mut uow);
        let resolver = TypeResolver::standard(DomainKind::Connection);
        let obj = resolver.resolve_path(&mut uow, &path).unwrap();

        // the fast path does not consult the stored type again
        uow.remove_node(&path).unwrap();
        let again = resolver.resolve(&mut uow, &obj).unwrap();
        assert_eq!(again, obj);

        // a different variant goes through validation
        let err = TypeResolver::standard(DomainKind::Schema).resolve(&mut uow, &obj).unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(_)));
    }

    #[test]
    fn test_registered_discriminator_extends_variant() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("resolve").unwrap();
        let path = uow.create_node(&NodePath::root(), "merge", "acme:merge").unwrap();

        let mut registry = TypeRegistry::standard();
        assert!(registry.resolve(&mut uow, &path).unwrap().is_none());
        registry.register(TypeResolver::new(DomainKind::Statement, &["acme:merge"]));
        let obj = registry.resolve_as::<Statement>(&mut uow, &path).unwrap();
        assert_eq!(obj.path(), &path);
    }

    #[test]
    fn test_resolution_does_not_mutate() {
        let store = GraphStore::open_temporary().unwrap();
        let mut uow = store.begin("resolve").unwrap();
        let path = connection_node(&mut uow);
        uow.commit().unwrap();

        let mut reader = store.begin("read").unwrap();
        TypeRegistry::standard().resolve(&mut reader, &path).unwrap();
        let _ = TypeRegistry::standard().resolve_as::<Vdb>(&mut reader, &path);
        assert!(!reader.has_changes());
    }
}
