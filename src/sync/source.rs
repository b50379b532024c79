//! External source records, events and the collaborators reconciliation consumes

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use tracing::info;
use crate::{Error, Result};

/// Where a source record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Declared outside this system
    #[default]
    External,
    /// Derived from a dataservice this system published itself
    SelfPublished,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::External => "external",
            Origin::SelfPublished => "self_published",
        }
    }
}

impl FromStr for Origin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "external" => Ok(Origin::External),
            "self_published" => Ok(Origin::SelfPublished),
            _ => Err(Error::Config(format!("unknown source origin '{}'", s))),
        }
    }
}

/// Desired-state record for one external data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSource {
    /// Stable external identifier
    pub id: String,
    pub name: String,
    pub connection_type: String,
    pub translator: String,
    #[serde(default)]
    pub origin: Origin,
    /// `host:port` dialed when connecting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl ExternalSource {
    pub fn new(id: &str, connection_type: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            connection_type: connection_type.to_string(),
            translator: connection_type.to_string(),
            origin: Origin::External,
            address: None,
        }
    }

    /// Content hash of every field; a change means the persisted copy is stale
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for field in [
            self.id.as_str(),
            self.name.as_str(),
            self.connection_type.as_str(),
            self.translator.as_str(),
            self.origin.as_str(),
            self.address.as_deref().unwrap_or(""),
        ] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceAction {
    Created,
    Updated,
    Deleted,
}

impl SourceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceAction::Created => "created",
            SourceAction::Updated => "updated",
            SourceAction::Deleted => "deleted",
        }
    }
}

impl FromStr for SourceAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "created" => Ok(SourceAction::Created),
            "updated" => Ok(SourceAction::Updated),
            "deleted" => Ok(SourceAction::Deleted),
            _ => Err(Error::Config(format!("unknown source action '{}'", s))),
        }
    }
}

impl fmt::Display for SourceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A change notification for one source. No ordering across identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEvent {
    pub id: String,
    pub action: SourceAction,
}

/// A live connection opened for a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionHandle {
    pub id: String,
    pub detail: String,
}

/// The external inventory of data sources.
///
/// `connect` and `disconnect` may block; implementations bound them with their own
/// timeouts and report failures as [`Error::ExternalSource`].
pub trait SourceInventory: Send + Sync {
    /// Point-in-time snapshot of every desired source
    fn list_desired(&self) -> Result<Vec<ExternalSource>>;

    fn fetch(&self, id: &str) -> Result<Option<ExternalSource>>;

    fn connect(&self, source: &ExternalSource) -> Result<ConnectionHandle>;

    fn disconnect(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// First materialization of a source
    MakeLive,
    /// Re-read metadata of a source that was already live
    Refresh,
}

impl RefreshMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshMode::MakeLive => "make_live",
            RefreshMode::Refresh => "refresh",
        }
    }
}

/// Asks the metadata layer to (re)load a source's schema after it was added
pub trait MetadataRefresher: Send + Sync {
    fn request_refresh(&self, source: &ExternalSource, mode: RefreshMode) -> Result<()>;
}

/// Records refresh requests in the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRefresher;

impl MetadataRefresher for LoggingRefresher {
    fn request_refresh(&self, source: &ExternalSource, mode: RefreshMode) -> Result<()> {
        info!(source = %source.id, mode = mode.as_str(), "metadata refresh requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_tracks_every_field() {
        let base = ExternalSource::new("pg1", "postgresql");
        let same = ExternalSource::new("pg1", "postgresql");
        assert_eq!(base.fingerprint(), same.fingerprint());

        let mut renamed = base.clone();
        renamed.name = "Postgres One".into();
        assert_ne!(base.fingerprint(), renamed.fingerprint());

        let mut moved = base.clone();
        moved.address = Some("db:5432".into());
        assert_ne!(base.fingerprint(), moved.fingerprint());
    }

    #[test]
    fn test_event_json() {
        let event: SourceEvent = serde_json::from_str(r#"{"id":"pg1","action":"deleted"}"#).unwrap();
        assert_eq!(event.action, SourceAction::Deleted);
        assert!(serde_json::from_str::<SourceEvent>(r#"{"id":"pg1","action":"renamed"}"#).is_err());
    }

    #[test]
    fn test_origin_defaults_to_external() {
        let source: ExternalSource = serde_json::from_str(
            r#"{"id":"pg1","name":"pg1","connection_type":"postgresql","translator":"postgresql"}"#,
        )
        .unwrap();
        assert_eq!(source.origin, Origin::External);
        assert_eq!("self_published".parse::<Origin>().unwrap(), Origin::SelfPublished);
    }
}
