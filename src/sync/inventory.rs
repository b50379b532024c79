//! Source inventories: a TOML file on disk and an in-process map

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::{Error, Result};
use super::source::{ConnectionHandle, ExternalSource, SourceInventory};

#[derive(Debug, Default, Serialize, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    sources: Vec<ExternalSource>,
}

/// Sources declared in a TOML file as `[[sources]]` tables.
///
/// The file is re-read on every listing. Sources with an `address` are checked over
/// TCP on connect, bounded by the connect timeout.
pub struct FileInventory {
    path: PathBuf,
    connect_timeout: Duration,
    live: Mutex<HashMap<String, ConnectionHandle>>,
}

impl FileInventory {
    pub fn new(path: &Path, connect_timeout: Duration) -> Self {
        Self {
            path: path.to_path_buf(),
            connect_timeout,
            live: Mutex::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `sources` as an inventory file
    pub fn write(path: &Path, sources: &[ExternalSource]) -> Result<()> {
        let file = InventoryFile {
            sources: sources.to_vec(),
        };
        let contents = toml::to_string_pretty(&file).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn read(&self) -> Result<Vec<ExternalSource>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let file: InventoryFile = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", self.path.display(), e)))?;
        Ok(file.sources)
    }

    fn check_reachable(&self, source: &ExternalSource, address: &str) -> Result<String> {
        let target = address
            .to_socket_addrs()
            .map_err(|e| Error::external(&source.id, format!("cannot resolve {}: {}", address, e)))?
            .next()
            .ok_or_else(|| Error::external(&source.id, format!("{} resolves to no address", address)))?;
        TcpStream::connect_timeout(&target, self.connect_timeout)
            .map_err(|e| Error::external(&source.id, format!("connect to {} failed: {}", target, e)))?;
        Ok(target.to_string())
    }

    fn live(&self) -> MutexGuard<'_, HashMap<String, ConnectionHandle>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SourceInventory for FileInventory {
    fn list_desired(&self) -> Result<Vec<ExternalSource>> {
        self.read()
    }

    fn fetch(&self, id: &str) -> Result<Option<ExternalSource>> {
        Ok(self.read()?.into_iter().find(|s| s.id == id))
    }

    fn connect(&self, source: &ExternalSource) -> Result<ConnectionHandle> {
        let detail = match source.address.as_deref() {
            Some(address) => self.check_reachable(source, address)?,
            None => format!("{} via {}", source.connection_type, source.translator),
        };
        debug!(source = %source.id, %detail, "connected");
        let handle = ConnectionHandle {
            id: source.id.clone(),
            detail,
        };
        self.live().insert(source.id.clone(), handle.clone());
        Ok(handle)
    }

    fn disconnect(&self, id: &str) -> Result<()> {
        if self.live().remove(id).is_some() {
            debug!(source = %id, "disconnected");
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    sources: BTreeMap<String, ExternalSource>,
    failing_connect: HashSet<String>,
    failing_disconnect: HashSet<String>,
    connects: HashMap<String, usize>,
    disconnects: HashMap<String, usize>,
}

/// In-process inventory with per-identifier failure injection
#[derive(Debug, Default)]
pub struct MemoryInventory {
    state: Mutex<MemoryState>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(sources: impl IntoIterator<Item = ExternalSource>) -> Self {
        let inventory = Self::new();
        for source in sources {
            inventory.put(source);
        }
        inventory
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a source
    pub fn put(&self, source: ExternalSource) {
        self.state().sources.insert(source.id.clone(), source);
    }

    pub fn remove(&self, id: &str) -> Option<ExternalSource> {
        self.state().sources.remove(id)
    }

    pub fn fail_connect(&self, id: &str) {
        self.state().failing_connect.insert(id.to_string());
    }

    pub fn fail_disconnect(&self, id: &str) {
        self.state().failing_disconnect.insert(id.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing_connect.clear();
        state.failing_disconnect.clear();
    }

    pub fn connect_calls(&self, id: &str) -> usize {
        self.state().connects.get(id).copied().unwrap_or(0)
    }

    pub fn disconnect_calls(&self, id: &str) -> usize {
        self.state().disconnects.get(id).copied().unwrap_or(0)
    }
}

impl SourceInventory for MemoryInventory {
    fn list_desired(&self) -> Result<Vec<ExternalSource>> {
        Ok(self.state().sources.values().cloned().collect())
    }

    fn fetch(&self, id: &str) -> Result<Option<ExternalSource>> {
        Ok(self.state().sources.get(id).cloned())
    }

    fn connect(&self, source: &ExternalSource) -> Result<ConnectionHandle> {
        let mut state = self.state();
        *state.connects.entry(source.id.clone()).or_default() += 1;
        if state.failing_connect.contains(&source.id) {
            return Err(Error::external(&source.id, "connection refused"));
        }
        Ok(ConnectionHandle {
            id: source.id.clone(),
            detail: "memory".to_string(),
        })
    }

    fn disconnect(&self, id: &str) -> Result<()> {
        let mut state = self.state();
        *state.disconnects.entry(id.to_string()).or_default() += 1;
        if state.failing_disconnect.contains(id) {
            return Err(Error::external(id, "disconnect rejected"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_file_inventory_reads_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.toml");
        std::fs::write(
            &path,
            r#"
[[sources]]
id = "pg1"
name = "Postgres One"
connection_type = "postgresql"
translator = "postgresql"

[[sources]]
id = "svc"
name = "Published"
connection_type = "teiid"
translator = "teiid"
origin = "self_published"
"#,
        )
        .unwrap();

        let inventory = FileInventory::new(&path, Duration::from_millis(200));
        let sources = inventory.list_desired().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "Postgres One");
        assert_eq!(inventory.fetch("svc").unwrap().unwrap().origin, crate::sync::Origin::SelfPublished);
        assert!(inventory.fetch("mysql1").unwrap().is_none());
    }

    #[test]
    fn test_missing_file_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = FileInventory::new(&dir.path().join("absent.toml"), Duration::from_millis(200));
        assert!(inventory.list_desired().unwrap().is_empty());
    }

    #[test]
    fn test_write_then_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sources.toml");
        FileInventory::write(&path, &[ExternalSource::new("pg1", "postgresql")]).unwrap();
        let inventory = FileInventory::new(&path, Duration::from_millis(200));
        assert_eq!(inventory.list_desired().unwrap(), vec![ExternalSource::new("pg1", "postgresql")]);
    }

    #[test]
    fn test_connect_reaches_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut source = ExternalSource::new("pg1", "postgresql");
        source.address = Some(listener.local_addr().unwrap().to_string());

        let dir = tempfile::tempdir().unwrap();
        let inventory = FileInventory::new(&dir.path().join("sources.toml"), Duration::from_millis(500));
        let handle = inventory.connect(&source).unwrap();
        assert_eq!(handle.detail, listener.local_addr().unwrap().to_string());
        inventory.disconnect("pg1").unwrap();
    }

    #[test]
    fn test_unresolvable_address_is_external_error() {
        let mut source = ExternalSource::new("pg1", "postgresql");
        source.address = Some("no port here".into());
        let dir = tempfile::tempdir().unwrap();
        let inventory = FileInventory::new(&dir.path().join("sources.toml"), Duration::from_millis(200));
        assert!(matches!(inventory.connect(&source), Err(Error::ExternalSource { .. })));
    }

    #[test]
    fn test_memory_failure_injection() {
        let inventory = MemoryInventory::with_sources([ExternalSource::new("pg1", "postgresql")]);
        inventory.fail_connect("pg1");
        let source = inventory.fetch("pg1").unwrap().unwrap();
        assert!(inventory.connect(&source).is_err());
        inventory.clear_failures();
        assert!(inventory.connect(&source).is_ok());
        assert_eq!(inventory.connect_calls("pg1"), 2);
    }
}
