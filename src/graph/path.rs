//! Absolute node paths

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use crate::{Error, Result};

/// An absolute, slash-delimited node path.
///
/// The root is `/`. Every other path is its parent's path plus `/name`, where a
/// name may carry a same-name-sibling index suffix such as `sql:select[2]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(String);

impl NodePath {
    pub fn root() -> Self {
        NodePath("/".to_string())
    }

    /// Parse and validate an absolute path
    pub fn parse(s: &str) -> Result<Self> {
        if s == "/" {
            return Ok(Self::root());
        }
        let Some(rest) = s.strip_prefix('/') else {
            return Err(Error::InvalidPath(format!("path must be absolute: {}", s)));
        };
        for segment in rest.split('/') {
            let (base, index) = split_index(segment)
                .ok_or_else(|| Error::InvalidPath(format!("bad segment '{}' in {}", segment, s)))?;
            validate_name(base)?;
            if index == Some(1) {
                return Err(Error::InvalidPath(format!("index [1] is implicit in {}", s)));
            }
        }
        Ok(NodePath(s.to_string()))
    }

    /// Wrap a path read back from storage
    pub(crate) fn from_stored(s: String) -> Self {
        NodePath(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Join a segment (already validated, possibly indexed)
    pub(crate) fn join(&self, segment: &str) -> NodePath {
        if self.is_root() {
            NodePath(format!("/{}", segment))
        } else {
            NodePath(format!("{}/{}", self.0, segment))
        }
    }

    /// Path of a child named `name`
    pub fn child(&self, name: &str) -> Result<NodePath> {
        validate_name(name)?;
        Ok(self.join(name))
    }

    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(NodePath(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Last segment including any index suffix; empty for the root
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => "",
        }
    }

    /// Last segment without the index suffix
    pub fn base_name(&self) -> &str {
        let name = self.name();
        split_index(name).map(|(base, _)| base).unwrap_or(name)
    }

    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches('/').count()
        }
    }

    pub fn is_ancestor_of(&self, other: &NodePath) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }
}

/// Split `name[k]` into `("name", Some(k))`
fn split_index(segment: &str) -> Option<(&str, Option<u32>)> {
    match segment.strip_suffix(']') {
        Some(head) => {
            let open = head.rfind('[')?;
            let index = head[open + 1..].parse::<u32>().ok().filter(|k| *k >= 1)?;
            Some((&head[..open], Some(index)))
        }
        None => Some((segment, None)),
    }
}

/// Check a node name supplied by a caller (no index suffix allowed)
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::InvalidPath(format!("invalid node name '{}'", name)));
    }
    if let Some(c) = name.chars().find(|c| matches!(c, '/' | '[' | ']') || c.is_control()) {
        return Err(Error::InvalidPath(format!(
            "node name '{}' contains '{}'",
            name,
            c.escape_default()
        )));
    }
    Ok(())
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NodePath::parse(s)
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        NodePath::parse(&s).map_err(serde::de::Error::custom)
    }
}
