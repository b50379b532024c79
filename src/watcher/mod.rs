use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::time::Duration;
use crate::sync::{ReconcileReport, ReconciliationEngine};
use crate::ui;

/// Quiet period that folds an editor's burst of writes into one pass
const SETTLE: Duration = Duration::from_millis(300);

/// Re-runs full reconciliation whenever the inventory file changes
pub struct Watcher {
    sources: PathBuf,
    engine: Arc<ReconciliationEngine>,
}

impl Watcher {
    pub fn new(sources: PathBuf, engine: Arc<ReconciliationEngine>) -> Self {
        Self { sources, engine }
    }

    pub fn run(&self) -> anyhow::Result<()> {
        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(tx, Config::default())?;

        // editors often replace the file, so watch its directory
        let dir = match self.sources.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        println!("{} Watching {} for source changes...", ui::Icons::EYE, ui::path(&self.sources.display().to_string()));
        self.reconcile();

        loop {
            let event = match rx.recv() {
                Ok(Ok(event)) => event,
                Ok(Err(e)) => {
                    ui::warn(&format!("watch error: {}", e));
                    continue;
                }
                Err(_) => break,
            };
            if !self.is_relevant(&event) {
                continue;
            }
            // drain the rest of the burst
            loop {
                match rx.recv_timeout(SETTLE) {
                    Ok(_) => continue,
                    Err(RecvTimeoutError::Timeout) => break,
                    Err(RecvTimeoutError::Disconnected) => return Ok(()),
                }
            }
            self.reconcile();
        }

        Ok(())
    }

    fn is_relevant(&self, event: &notify::Event) -> bool {
        matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_))
            && event.paths.iter().any(|p| same_file_name(p, &self.sources))
    }

    fn reconcile(&self) -> Option<ReconcileReport> {
        match self.engine.synchronize_inventory() {
            Ok(report) => {
                ui::reconcile_report(&report);
                Some(report)
            }
            Err(e) => {
                ui::error(&format!("reconciliation failed: {}", e));
                None
            }
        }
    }
}

fn same_file_name(changed: &Path, watched: &Path) -> bool {
    changed.file_name().is_some() && changed.file_name() == watched.file_name()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphStore;
    use crate::model::WorkspaceManager;
    use crate::sync::{ExternalSource, FileInventory, LoggingRefresher};

    #[test]
    fn test_same_file_name() {
        assert!(same_file_name(Path::new("/tmp/x/sources.toml"), Path::new("sources.toml")));
        assert!(!same_file_name(Path::new("/tmp/x/sources.toml~"), Path::new("sources.toml")));
    }

    #[test]
    fn test_reconcile_reads_inventory_file() {
        let dir = tempfile::tempdir().unwrap();
        let sources = dir.path().join("sources.toml");
        FileInventory::write(&sources, &[ExternalSource::new("pg1", "postgresql")]).unwrap();

        let engine = Arc::new(ReconciliationEngine::new(
            Arc::new(GraphStore::open_temporary().unwrap()),
            WorkspaceManager::default(),
            Arc::new(FileInventory::new(&sources, Duration::from_millis(200))),
            Arc::new(LoggingRefresher),
        ));
        let watcher = Watcher::new(sources, engine);
        let report = watcher.reconcile().unwrap();
        assert_eq!(report.added, vec!["pg1"]);
    }
}
