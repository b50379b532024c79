use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Metadata version stamped on sequenced nodes when none is configured
pub const DEFAULT_METADATA_VERSION: &str = "8.12";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3_000;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DatagraphConfig {
    pub database: Option<String>,
    /// Inventory file listing the desired sources
    pub sources: Option<String>,
    pub metadata_version: Option<String>,
    pub busy_timeout_ms: Option<u64>,
    pub max_depth: Option<usize>,
    pub connect_timeout_ms: Option<u64>,
    /// Period of the server's reconciliation tick; unset disables it
    pub sync_interval_secs: Option<u64>,
}

impl DatagraphConfig {
    pub fn metadata_version(&self) -> &str {
        self.metadata_version.as_deref().unwrap_or(DEFAULT_METADATA_VERSION)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS))
    }

    pub fn sync_interval(&self) -> Option<Duration> {
        self.sync_interval_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("datagraph.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".datagraph").join("graph.db")
}

pub fn default_sources_path_in(base: &Path) -> PathBuf {
    base.join("sources.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<DatagraphConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: DatagraphConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &DatagraphConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn ensure_gitignore(project_root: &Path) -> anyhow::Result<()> {
    let gitignore_path = project_root.join(".gitignore");
    let entry = ".datagraph/";

    let mut content = if gitignore_path.exists() {
        std::fs::read_to_string(&gitignore_path)?
    } else {
        String::new()
    };
    if content.lines().any(|line| line.trim() == entry) {
        return Ok(());
    }
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(entry);
    content.push('\n');
    std::fs::write(&gitignore_path, content)?;
    Ok(())
}
