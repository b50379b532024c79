//! SQLite storage implementation

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use rusqlite::{Connection, OptionalExtension, params};
use rusqlite::types::Value;
use serde::Serialize;
use tempfile::TempDir;
use tracing::debug;
use crate::{Error, Result};
use crate::uow::UnitOfWork;
use super::{GraphSession, LockMode, NodePath, Property, PropertyValue, schema, validate_name};

/// Connection settings applied to every session
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long a session waits on a locked database before reporting a conflict
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

/// Node counts reported by `datagraph stats`
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub properties: usize,
    pub node_types: Vec<(String, usize)>,
}

/// SQLite-backed node graph.
///
/// The store itself holds no session; every `UnitOfWork` opens its own connection.
pub struct GraphStore {
    path: PathBuf,
    options: StoreOptions,
    // owns the directory of a temporary store; removed on drop
    _scratch: Option<TempDir>,
}

impl GraphStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, StoreOptions::default())
    }

    pub fn open_with(path: &Path, options: StoreOptions) -> Result<Self> {
        let conn = Connection::open(path)?;
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "opened graph store");
        initialize_schema(&conn)?;
        Ok(Self {
            path: path.to_path_buf(),
            options,
            _scratch: None,
        })
    }

    /// Open a throwaway store in a fresh temporary directory (for testing).
    ///
    /// It is an ordinary WAL file, so concurrent sessions lock and see snapshots exactly
    /// as with `open`. The directory is deleted when the store is dropped.
    pub fn open_temporary() -> Result<Self> {
        let scratch = tempfile::Builder::new().prefix("datagraph-").tempdir()?;
        let mut store = Self::open_with(&scratch.path().join("graph.db"), StoreOptions::default())?;
        store._scratch = Some(scratch);
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.options.busy_timeout)?;
        Ok(conn)
    }

    /// Open a fresh storage session
    pub fn session(&self) -> Result<SqliteSession> {
        Ok(SqliteSession::new(self.connect()?))
    }

    /// Start a unit of work on behalf of the system user
    pub fn begin(&self, name: &str) -> Result<UnitOfWork> {
        self.begin_as("system", name, false)
    }

    /// Start a unit of work; a rollback-only one never persists its writes
    pub fn begin_as(&self, user: &str, name: &str, rollback_only: bool) -> Result<UnitOfWork> {
        let session = self.session()?;
        Ok(UnitOfWork::new(name, user, rollback_only, Box::new(session)))
    }

    /// Start a unit of work that takes the write lock up front.
    ///
    /// Concurrent writers queue behind each other for up to the busy timeout instead of
    /// failing when a deferred transaction tries to upgrade.
    pub fn begin_write(&self, name: &str) -> Result<UnitOfWork> {
        self.begin_write_as("system", name)
    }

    pub fn begin_write_as(&self, user: &str, name: &str) -> Result<UnitOfWork> {
        Ok(self.begin_as(user, name, false)?.with_lock_mode(LockMode::Immediate))
    }

    /// Committed node and property counts
    pub fn stats(&self) -> Result<GraphStats> {
        let conn = self.connect()?;
        let nodes: i64 = conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        let properties: i64 = conn.query_row("SELECT COUNT(*) FROM properties", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT node_type, COUNT(*) FROM nodes GROUP BY node_type ORDER BY COUNT(*) DESC, node_type",
        )?;
        let node_types = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(GraphStats {
            nodes: nodes as usize,
            properties: properties as usize,
            node_types,
        })
    }
}

/// Initialize the database schema
fn initialize_schema(conn: &Connection) -> Result<()> {
    for stmt in schema::all_schema_statements() {
        conn.execute(stmt, [])?;
    }
    Ok(())
}

/// One connection with at most one open transaction
pub struct SqliteSession {
    conn: Connection,
    dirty: bool,
}

impl SqliteSession {
    fn new(conn: Connection) -> Self {
        Self { conn, dirty: false }
    }

    fn exists(&self, path: &NodePath) -> Result<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM nodes WHERE path = ?1", [path.as_str()], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn require(&self, path: &NodePath) -> Result<()> {
        if self.exists(path)? {
            Ok(())
        } else {
            Err(Error::NodeNotFound(path.to_string()))
        }
    }

    /// Lowest free same-name-sibling path: `name`, then `name[2]`, `name[3]`, ...
    fn free_sibling_path(&self, parent: &NodePath, name: &str) -> Result<NodePath> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT path FROM nodes WHERE parent = ?1 AND name = ?2")?;
        let taken = stmt
            .query_map([parent.as_str(), name], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;

        let first = parent.join(name);
        if !taken.contains(first.as_str()) {
            return Ok(first);
        }
        let mut index = 2u32;
        loop {
            let candidate = parent.join(&format!("{}[{}]", name, index));
            if !taken.contains(candidate.as_str()) {
                return Ok(candidate);
            }
            index += 1;
        }
    }

    fn load_values(&self, path: &NodePath, name: &str, multiple: bool) -> Result<Property> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT kind, value FROM property_values WHERE path = ?1 AND name = ?2 ORDER BY idx",
        )?;
        let values = stmt
            .query_map([path.as_str(), name], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Value>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(kind, value)| row_to_value(&kind, value))
            .collect::<Result<Vec<_>>>()?;

        if multiple {
            return Ok(Property::Multiple(values));
        }
        values
            .into_iter()
            .next()
            .map(Property::Single)
            .ok_or_else(|| Error::Storage(format!("property {} on {} has no value", name, path)))
    }
}

fn value_to_sql(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::String(s) => Value::Text(s.clone()),
        PropertyValue::Long(v) => Value::Integer(*v),
        PropertyValue::Double(v) => Value::Real(*v),
        PropertyValue::Boolean(v) => Value::Integer(i64::from(*v)),
        PropertyValue::Binary(b) => Value::Blob(b.clone()),
    }
}

fn row_to_value(kind: &str, value: Value) -> Result<PropertyValue> {
    match (kind, value) {
        ("string", Value::Text(s)) => Ok(PropertyValue::String(s)),
        ("long", Value::Integer(v)) => Ok(PropertyValue::Long(v)),
        ("double", Value::Real(v)) => Ok(PropertyValue::Double(v)),
        ("double", Value::Integer(v)) => Ok(PropertyValue::Double(v as f64)),
        ("boolean", Value::Integer(v)) => Ok(PropertyValue::Boolean(v != 0)),
        ("binary", Value::Blob(b)) => Ok(PropertyValue::Binary(b)),
        (kind, value) => Err(Error::Storage(format!(
            "stored value {:?} does not match kind '{}'",
            value.data_type(),
            kind
        ))),
    }
}

/// Matches `?1` itself and everything beneath it
const SUBTREE_FILTER: &str = "(path = ?1 OR substr(path, 1, length(?1) + 1) = ?1 || '/')";

impl GraphSession for SqliteSession {
    fn begin(&mut self, mode: LockMode) -> Result<()> {
        match mode {
            LockMode::Deferred => self.conn.execute_batch("BEGIN DEFERRED")?,
            LockMode::Immediate => self.conn.execute_batch("BEGIN IMMEDIATE")?,
        }
        self.dirty = false;
        Ok(())
    }

    // ========== Node Operations ==========

    fn create_node(&mut self, parent: &NodePath, name: &str, node_type: &str) -> Result<NodePath> {
        validate_name(name)?;
        self.require(parent)?;
        let path = self.free_sibling_path(parent, name)?;
        let position: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM nodes WHERE parent = ?1",
            [parent.as_str()],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO nodes (path, parent, name, node_type, position) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![path.as_str(), parent.as_str(), name, node_type, position],
        )?;
        self.dirty = true;
        Ok(path)
    }

    fn node_type(&mut self, path: &NodePath) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT node_type FROM nodes WHERE path = ?1",
                [path.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn children(&mut self, path: &NodePath) -> Result<Vec<NodePath>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT path FROM nodes WHERE parent = ?1 ORDER BY position")?;
        let children = stmt
            .query_map([path.as_str()], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(children.into_iter().map(NodePath::from_stored).collect())
    }

    fn remove_node(&mut self, path: &NodePath) -> Result<()> {
        if path.is_root() {
            return Err(Error::InvalidPath("the root node cannot be removed".into()));
        }
        self.require(path)?;
        for table in ["property_values", "properties", "nodes"] {
            self.conn.execute(
                &format!("DELETE FROM {} WHERE {}", table, SUBTREE_FILTER),
                [path.as_str()],
            )?;
        }
        self.dirty = true;
        Ok(())
    }

    fn nodes_of_type(&mut self, node_type: &str, under: &NodePath) -> Result<Vec<NodePath>> {
        let paths = if under.is_root() {
            let mut stmt = self
                .conn
                .prepare_cached("SELECT path FROM nodes WHERE node_type = ?1 ORDER BY path")?;
            let rows = stmt
                .query_map([node_type], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        } else {
            let mut stmt = self.conn.prepare_cached(
                "SELECT path FROM nodes WHERE node_type = ?2
                 AND (path = ?1 OR substr(path, 1, length(?1) + 1) = ?1 || '/')
                 ORDER BY path",
            )?;
            let rows = stmt
                .query_map([under.as_str(), node_type], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        Ok(paths.into_iter().map(NodePath::from_stored).collect())
    }

    // ========== Property Operations ==========

    fn set_property(&mut self, path: &NodePath, name: &str, value: Option<&Property>) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidPath(format!("empty property name on {}", path)));
        }
        self.require(path)?;
        self.conn.execute(
            "DELETE FROM property_values WHERE path = ?1 AND name = ?2",
            [path.as_str(), name],
        )?;

        let Some(property) = value else {
            self.conn.execute(
                "DELETE FROM properties WHERE path = ?1 AND name = ?2",
                [path.as_str(), name],
            )?;
            self.dirty = true;
            return Ok(());
        };

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT position FROM properties WHERE path = ?1 AND name = ?2",
                [path.as_str(), name],
                |row| row.get(0),
            )
            .optional()?;
        let position = match existing {
            Some(position) => position,
            None => self.conn.query_row(
                "SELECT COALESCE(MAX(position), 0) + 1 FROM properties WHERE path = ?1",
                [path.as_str()],
                |row| row.get(0),
            )?,
        };

        self.conn.execute(
            "INSERT OR REPLACE INTO properties (path, name, position, multiple) VALUES (?1, ?2, ?3, ?4)",
            params![path.as_str(), name, position, property.is_multiple()],
        )?;
        let mut insert = self.conn.prepare_cached(
            "INSERT INTO property_values (path, name, idx, kind, value) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (idx, value) in property.values().iter().enumerate() {
            insert.execute(params![
                path.as_str(),
                name,
                idx as i64,
                value.kind(),
                value_to_sql(value)
            ])?;
        }
        self.dirty = true;
        Ok(())
    }

    fn property(&mut self, path: &NodePath, name: &str) -> Result<Option<Property>> {
        let multiple: Option<bool> = self
            .conn
            .query_row(
                "SELECT multiple FROM properties WHERE path = ?1 AND name = ?2",
                [path.as_str(), name],
                |row| row.get(0),
            )
            .optional()?;
        match multiple {
            Some(multiple) => self.load_values(path, name, multiple).map(Some),
            None => Ok(None),
        }
    }

    fn properties(&mut self, path: &NodePath) -> Result<Vec<(String, Property)>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT name, multiple FROM properties WHERE path = ?1 ORDER BY position",
        )?;
        let names = stmt
            .query_map([path.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);

        names
            .into_iter()
            .map(|(name, multiple)| {
                let property = self.load_values(path, &name, multiple)?;
                Ok((name, property))
            })
            .collect()
    }

    // ========== Transaction Operations ==========

    fn has_pending_changes(&self) -> bool {
        self.dirty
    }

    fn save(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        self.dirty = false;
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        self.dirty = false;
        Ok(())
    }
}
