//! Datagraph CLI - sequence documents into the node graph and mirror external sources

mod output;

use clap::{Parser, Subcommand};
use datagraph::config::{self, DatagraphConfig};
use datagraph::graph::StoreOptions;
use datagraph::model::WorkspaceManager;
use datagraph::sequencer::ast::LanguageObject;
use datagraph::sync::{FileInventory, LoggingRefresher, SourceAction};
use datagraph::ui::{self, Icons};
use datagraph::{GraphStore, NodePath, NodeSnapshot, ReconciliationEngine, Sequencer, SourceEvent};
use output::{emit_success, OutputMode};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "datagraph")]
#[command(version)]
#[command(about = "Sequenced metadata graph with external source reconciliation")]
#[command(long_about = r#"
Datagraph persists parsed SQL commands and VDB documents as a typed node graph,
and keeps a set of externally declared data sources mirrored in that graph.

Example usage:
  datagraph init
  datagraph sequence query.json
  datagraph show /workspace/statements/sql:query
  datagraph sync
  datagraph event pg1 created
  datagraph serve --port 7070
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Path to the source inventory file (overrides config)
    #[arg(short, long, global = true)]
    sources: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the database
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Sequence a serialized command or document tree into the graph
    Sequence {
        /// File holding the tree
        file: PathBuf,

        /// Parent node (defaults to the statements or vdbs folder)
        #[arg(short, long)]
        parent: Option<String>,

        /// Metadata version stamped on created nodes
        #[arg(long)]
        metadata_version: Option<String>,
    },

    /// Print the subtree at a node path
    Show {
        /// Absolute node path
        path: String,
    },

    /// List desired and persisted sources side by side
    Sources,

    /// Reconcile persisted connections with the inventory
    Sync,

    /// Apply one source change notification
    Event {
        /// Source identifier
        id: String,

        /// created, updated or deleted
        action: String,
    },

    /// Reconcile whenever the inventory file changes
    Watch,

    /// Receive source events over HTTP
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "7070")]
        port: u16,

        /// Seconds between reconciliation ticks (0 disables)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show statistics about the stored graph
    Stats,
}

/// Config file values with command-line overrides applied
struct Settings {
    config: DatagraphConfig,
    database: PathBuf,
    sources: PathBuf,
}

impl Settings {
    fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let config = config::load_config(cli.config.as_deref())?.unwrap_or_default();
        let base = Path::new(".");
        let database = cli
            .database
            .clone()
            .or_else(|| config.database.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| config::default_database_path_in(base));
        let sources = cli
            .sources
            .clone()
            .or_else(|| config.sources.as_ref().map(PathBuf::from))
            .unwrap_or_else(|| config::default_sources_path_in(base));
        Ok(Self { config, database, sources })
    }

    fn open_store(&self) -> anyhow::Result<GraphStore> {
        config::ensure_db_dir(&self.database)?;
        let options = StoreOptions {
            busy_timeout: self.config.busy_timeout(),
        };
        Ok(GraphStore::open_with(&self.database, options)?)
    }

    fn inventory(&self) -> FileInventory {
        FileInventory::new(&self.sources, self.config.connect_timeout())
    }

    fn engine(&self) -> anyhow::Result<Arc<ReconciliationEngine>> {
        Ok(Arc::new(ReconciliationEngine::new(
            Arc::new(self.open_store()?),
            WorkspaceManager::default(),
            Arc::new(self.inventory()),
            Arc::new(LoggingRefresher),
        )))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mode = OutputMode::from_flag(cli.json);
    let settings = Settings::resolve(&cli)?;

    match cli.command {
        Commands::Init { force } => run_init(&cli, &settings, force, mode),
        Commands::Sequence { ref file, ref parent, ref metadata_version } => {
            run_sequence(&settings, file, parent.as_deref(), metadata_version.as_deref(), mode)
        }
        Commands::Show { ref path } => run_show(&settings, path, mode),
        Commands::Sources => run_sources(&settings, mode),
        Commands::Sync => run_sync(&settings, mode),
        Commands::Event { ref id, ref action } => run_event(&settings, id, action, mode),
        Commands::Watch => {
            let watcher = datagraph::watcher::Watcher::new(settings.sources.clone(), settings.engine()?);
            watcher.run()
        }
        Commands::Serve { port, interval } => {
            let interval = match interval {
                Some(secs) => (secs > 0).then(|| std::time::Duration::from_secs(secs)),
                None => settings.config.sync_interval(),
            };
            let engine = settings.engine()?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(datagraph::server::start_server(port, engine, interval))
        }
        Commands::Stats => run_stats(&settings, mode),
    }
}

fn run_init(cli: &Cli, settings: &Settings, force: bool, mode: OutputMode) -> anyhow::Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let config = DatagraphConfig {
        database: Some(settings.database.display().to_string()),
        sources: Some(settings.sources.display().to_string()),
        ..settings.config.clone()
    };
    config::write_config(&config_path, &config, force)?;
    settings.open_store()?;
    if settings.database.starts_with(".datagraph") || settings.database.starts_with("./.datagraph") {
        config::ensure_gitignore(Path::new("."))?;
    }

    if mode.is_chatty() {
        ui::success(&format!("Wrote {}", config_path.display()));
        ui::status(Icons::DATABASE, "Database", &settings.database.display().to_string());
        ui::status(Icons::PLUG, "Sources", &settings.sources.display().to_string());
    }
    emit_success(mode, "init", &config)
}

fn run_sequence(
    settings: &Settings,
    file: &Path,
    parent: Option<&str>,
    metadata_version: Option<&str>,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)?;
    let mut sequencer = Sequencer::default()
        .with_metadata_version(metadata_version.unwrap_or(settings.config.metadata_version()));
    if let Some(max_depth) = settings.config.max_depth {
        sequencer = sequencer.with_max_depth(max_depth);
    }
    let tree = sequencer.parse(&text)?;

    let store = settings.open_store()?;
    let workspace = WorkspaceManager::default();
    let mut uow = store.begin_write("sequence")?;
    let parent = match parent {
        Some(path) => NodePath::parse(path)?,
        None if matches!(tree, LanguageObject::Vdb(_)) => workspace.vdbs_folder(&mut uow)?,
        None => workspace.statements_folder(&mut uow)?,
    };

    let outcome = sequencer.sequence_tree(&mut uow, &tree, &parent);
    if mode.is_human() {
        for diagnostic in &outcome.diagnostics {
            ui::warn(&diagnostic.to_string());
        }
    }
    if let Some(err) = &outcome.error {
        uow.rollback()?;
        anyhow::bail!("sequencing {} failed: {}", file.display(), err);
    }
    uow.commit()?;

    let root = outcome.root.as_ref().map(|p| p.to_string()).unwrap_or_default();
    if mode.is_chatty() {
        ui::success(&format!("Sequenced {}", file.display()));
        ui::status(Icons::TREE, "Root", &ui::path(&root));
    }
    emit_success(
        mode,
        "sequence",
        serde_json::json!({ "root": root, "diagnostics": outcome.diagnostics }),
    )
}

fn run_show(settings: &Settings, path: &str, mode: OutputMode) -> anyhow::Result<()> {
    let store = settings.open_store()?;
    let mut uow = store.begin_as("cli", "show", true)?;
    let snapshot = uow.snapshot(&NodePath::parse(path)?)?;
    uow.rollback()?;

    if mode.is_human() {
        print_snapshot(&snapshot, 0);
    }
    emit_success(mode, "show", &snapshot)
}

fn print_snapshot(node: &NodeSnapshot, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{}{} {}", indent, ui::path(&node.name), ui::dim(&format!("[{}]", node.node_type)));
    for (name, value) in &node.properties {
        println!("{}  {} = {}", indent, ui::dim(name), value);
    }
    for child in &node.children {
        print_snapshot(child, depth + 1);
    }
}

fn run_sources(settings: &Settings, mode: OutputMode) -> anyhow::Result<()> {
    let engine = settings.engine()?;
    let desired = engine.inventory().list_desired()?;
    let persisted = engine.persisted()?;

    let mut rows = Vec::new();
    let mut listed = BTreeSet::new();
    for source in &desired {
        listed.insert(source.id.clone());
        let state = match persisted.get(&source.id) {
            None => "pending",
            Some(fingerprint) if fingerprint.as_deref() == Some(source.fingerprint().as_str()) => "persisted",
            Some(_) => "stale",
        };
        rows.push(ui::SourceRow {
            id: source.id.clone(),
            name: source.name.clone(),
            connection_type: source.connection_type.clone(),
            translator: source.translator.clone(),
            origin: source.origin.as_str().to_string(),
            state: state.to_string(),
        });
    }
    for id in persisted.keys().filter(|id| !listed.contains(*id)) {
        rows.push(ui::SourceRow {
            id: id.clone(),
            name: "-".into(),
            connection_type: "-".into(),
            translator: "-".into(),
            origin: "-".into(),
            state: "orphaned".into(),
        });
    }

    if mode.is_human() {
        if rows.is_empty() {
            ui::info("Sources", "none declared or persisted");
        } else {
            println!("{}", ui::sources_table(&rows));
        }
    }
    let data: Vec<_> = rows
        .iter()
        .map(|r| serde_json::json!({ "id": r.id, "state": r.state }))
        .collect();
    emit_success(mode, "sources", data)
}

fn run_sync(settings: &Settings, mode: OutputMode) -> anyhow::Result<()> {
    let engine = settings.engine()?;
    let started = Instant::now();
    let spinner = mode.is_chatty().then(|| ui::Spinner::new("Reconciling sources..."));
    let report = engine.synchronize_inventory();
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }
    let report = report?;

    if mode.is_chatty() {
        ui::header("Reconciliation");
        ui::reconcile_report(&report);
        ui::timing(&format!("{:.2?}", started.elapsed()));
    }
    emit_success(mode, "sync", &report)
}

fn run_event(settings: &Settings, id: &str, action: &str, mode: OutputMode) -> anyhow::Result<()> {
    let event = SourceEvent {
        id: id.to_string(),
        action: action.parse::<SourceAction>()?,
    };
    let engine = settings.engine()?;
    let outcome = engine.handle(&event)?;

    if mode.is_chatty() {
        ui::success(&format!("{} {}: {:?}", event.action, ui::path(id), outcome));
    }
    emit_success(mode, "event", serde_json::json!({ "id": id, "outcome": outcome }))
}

fn run_stats(settings: &Settings, mode: OutputMode) -> anyhow::Result<()> {
    let store = settings.open_store()?;
    let stats = store.stats()?;

    if mode.is_human() {
        println!("{} Datagraph Statistics ({})", Icons::STATS, settings.database.display());
        let nodes = stats.nodes.to_string();
        let properties = stats.properties.to_string();
        println!("{}", ui::stats_table(&[("Nodes", nodes.as_str()), ("Properties", properties.as_str())]));

        if !stats.node_types.is_empty() {
            let mut builder = ui::TableBuilder::new();
            for (node_type, count) in &stats.node_types {
                builder.add_row(node_type, &count.to_string());
            }
            ui::section("Node types");
            println!("{}", builder.build());
        }
    }
    emit_success(mode, "stats", &stats)
}
