//! Path-addressed node graph: value types, the session seam and the SQLite store

mod path;
mod schema;
mod sqlite;

pub use path::{NodePath, validate_name};
pub use sqlite::{GraphStore, GraphStats, SqliteSession, StoreOptions};

use serde::{Deserialize, Serialize};
use crate::Result;

/// A single typed property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    String(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Binary(Vec<u8>),
}

impl PropertyValue {
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::String(_) => "string",
            PropertyValue::Long(_) => "long",
            PropertyValue::Double(_) => "double",
            PropertyValue::Boolean(_) => "boolean",
            PropertyValue::Binary(_) => "binary",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            PropertyValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::String(s) => write!(f, "{}", s),
            PropertyValue::Long(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::Boolean(v) => write!(f, "{}", v),
            PropertyValue::Binary(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Long(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(value: Vec<u8>) -> Self {
        PropertyValue::Binary(value)
    }
}

/// A named property: one value, or an ordered list for multi-valued properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Property {
    Single(PropertyValue),
    Multiple(Vec<PropertyValue>),
}

impl Property {
    pub fn is_multiple(&self) -> bool {
        matches!(self, Property::Multiple(_))
    }

    pub fn values(&self) -> &[PropertyValue] {
        match self {
            Property::Single(v) => std::slice::from_ref(v),
            Property::Multiple(vs) => vs,
        }
    }

    /// The single value, or the first value of a multi-valued property
    pub fn first(&self) -> Option<&PropertyValue> {
        self.values().first()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.first().and_then(PropertyValue::as_str)
    }

    pub fn as_long(&self) -> Option<i64> {
        self.first().and_then(PropertyValue::as_long)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.first().and_then(PropertyValue::as_bool)
    }
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Property::Single(v) => write!(f, "{}", v),
            Property::Multiple(vs) => {
                let parts: Vec<String> = vs.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<PropertyValue> for Property {
    fn from(value: PropertyValue) -> Self {
        Property::Single(value)
    }
}

impl From<&str> for Property {
    fn from(value: &str) -> Self {
        Property::Single(value.into())
    }
}

impl From<String> for Property {
    fn from(value: String) -> Self {
        Property::Single(value.into())
    }
}

impl From<i64> for Property {
    fn from(value: i64) -> Self {
        Property::Single(value.into())
    }
}

impl From<bool> for Property {
    fn from(value: bool) -> Self {
        Property::Single(value.into())
    }
}

impl From<Vec<PropertyValue>> for Property {
    fn from(values: Vec<PropertyValue>) -> Self {
        Property::Multiple(values)
    }
}

/// A serializable copy of a subtree, in sibling order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<(String, Property)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    pub fn child(&self, name: &str) -> Option<&NodeSnapshot> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Total number of nodes in this subtree, including itself
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeSnapshot::node_count).sum::<usize>()
    }
}

/// When a transaction takes the database write lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    /// On the first write. Upgrading fails at once if another writer holds the lock.
    #[default]
    Deferred,
    /// At begin, waiting out other writers up to the busy timeout
    Immediate,
}

/// One storage session. A `UnitOfWork` owns exactly one and never shares it.
///
/// Writes made through a session stay invisible to other sessions until `save`.
pub trait GraphSession: Send {
    /// Open the underlying transaction
    fn begin(&mut self, mode: LockMode) -> Result<()>;

    /// Create a child under `parent`, disambiguating same-named siblings.
    /// Returns the path actually assigned.
    fn create_node(&mut self, parent: &NodePath, name: &str, node_type: &str) -> Result<NodePath>;

    /// Stored type discriminator, or `None` when no node lives at `path`
    fn node_type(&mut self, path: &NodePath) -> Result<Option<String>>;

    /// Set a property; `None` removes it
    fn set_property(&mut self, path: &NodePath, name: &str, value: Option<&Property>) -> Result<()>;

    fn property(&mut self, path: &NodePath, name: &str) -> Result<Option<Property>>;

    /// All properties in the order they were first set
    fn properties(&mut self, path: &NodePath) -> Result<Vec<(String, Property)>>;

    /// Direct children in insertion order
    fn children(&mut self, path: &NodePath) -> Result<Vec<NodePath>>;

    /// Remove a node and its whole subtree
    fn remove_node(&mut self, path: &NodePath) -> Result<()>;

    /// Nodes with the given discriminator at or below `under`, ordered by path
    fn nodes_of_type(&mut self, node_type: &str, under: &NodePath) -> Result<Vec<NodePath>>;

    /// Whether anything was written since `begin`
    fn has_pending_changes(&self) -> bool;

    /// Commit the transaction
    fn save(&mut self) -> Result<()>;

    /// Roll back the transaction
    fn discard(&mut self) -> Result<()>;
}
