//! modscope - Incremental, cancellable search over a module registry.
//!
//! Usage:
//!   modscope search <SNAPSHOT> [FILTERS]   List modules matching the filters
//!   modscope inspect <SNAPSHOT> <ID>       Show one module in detail
//!   modscope --help                        Show help

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{bail, Context, Result};
use itertools::Itertools;
use serde::de::DeserializeOwned;
use tokio_stream::StreamExt;

use modscope_core::{
    ComponentState, CriteriaSettings, EngineConfig, KnownModules, LoadedState, MatcherSpec,
    MemoryRegistry, ModuleFixture, ModuleId, ModuleRecord, ModuleRegistry, NamedState,
    RegistrySnapshot, VisibleSnapshot,
};
use modscope_scan::Engine;

#[derive(Parser)]
#[command(
    name = "modscope",
    version,
    about = "Incremental, cancellable search over a module registry",
    long_about = "modscope indexes a registry snapshot in small batches and filters \
                  the modules by name, source, load state, exported properties and \
                  component status."
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the modules matching the given filters
    Search {
        /// Registry snapshot (JSON)
        snapshot: PathBuf,

        /// Known-module matchers (JSON array)
        #[arg(short, long)]
        known: Option<PathBuf>,

        /// Saved criteria (JSON); flags below override it
        #[arg(short, long)]
        criteria: Option<PathBuf>,

        /// Engine configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Case-insensitive pattern matched against module names
        #[arg(long)]
        name: Option<String>,

        /// Case-insensitive pattern matched against module source
        #[arg(long)]
        code: Option<String>,

        /// Load state filter
        #[arg(long)]
        loaded: Option<LoadedArg>,

        /// Name presence filter
        #[arg(long)]
        named: Option<NamedArg>,

        /// Component filter
        #[arg(long)]
        component: Option<ComponentArg>,

        /// Property the exports must define (repeatable)
        #[arg(short, long = "property")]
        properties: Vec<String>,

        /// Field the exports' prototype must define (repeatable)
        #[arg(long = "prototype-field")]
        prototype_fields: Vec<String>,

        /// Items processed between suspension points
        #[arg(long)]
        yield_every: Option<usize>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Report indexing progress on stderr
        #[arg(long)]
        progress: bool,
    },

    /// Show one module in detail
    Inspect {
        /// Registry snapshot (JSON)
        snapshot: PathBuf,

        /// Module id
        id: usize,

        /// Known-module matchers (JSON array)
        #[arg(short, long)]
        known: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LoadedArg {
    Ignore,
    NotLoaded,
    IsLoaded,
}

impl From<LoadedArg> for LoadedState {
    fn from(arg: LoadedArg) -> Self {
        match arg {
            LoadedArg::Ignore => Self::Ignore,
            LoadedArg::NotLoaded => Self::RequireUnloaded,
            LoadedArg::IsLoaded => Self::RequireLoaded,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NamedArg {
    Ignore,
    NoName,
    HasName,
}

impl From<NamedArg> for NamedState {
    fn from(arg: NamedArg) -> Self {
        match arg {
            NamedArg::Ignore => Self::Ignore,
            NamedArg::NoName => Self::RequireUnnamed,
            NamedArg::HasName => Self::RequireNamed,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ComponentArg {
    Ignore,
    NotComponent,
    IsComponent,
}

impl From<ComponentArg> for ComponentState {
    fn from(arg: ComponentArg) -> Self {
        match arg {
            ComponentArg::Ignore => Self::Ignore,
            ComponentArg::NotComponent => Self::RequireNot,
            ComponentArg::IsComponent => Self::RequireIs,
        }
    }
}

/// Criteria flags given on the command line.
struct CriteriaArgs {
    name: Option<String>,
    code: Option<String>,
    loaded: Option<LoadedArg>,
    named: Option<NamedArg>,
    component: Option<ComponentArg>,
    properties: Vec<String>,
    prototype_fields: Vec<String>,
}

impl CriteriaArgs {
    /// Overlay the flags on saved settings.
    fn apply(self, mut settings: CriteriaSettings) -> CriteriaSettings {
        if let Some(name) = self.name {
            settings.name_search = Some(name);
        }
        if let Some(code) = self.code {
            settings.code_search = Some(code);
        }
        if let Some(loaded) = self.loaded {
            settings.loaded = loaded.into();
        }
        if let Some(named) = self.named {
            settings.named = named.into();
        }
        if let Some(component) = self.component {
            settings.component = component.into();
        }
        if !self.properties.is_empty() {
            settings.properties = self.properties;
        }
        if !self.prototype_fields.is_empty() {
            settings.prototype_fields = self.prototype_fields;
        }
        settings
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    match cli.command {
        Command::Search {
            snapshot,
            known,
            criteria,
            config,
            name,
            code,
            loaded,
            named,
            component,
            properties,
            prototype_fields,
            yield_every,
            format,
            progress,
        } => {
            let args = CriteriaArgs {
                name,
                code,
                loaded,
                named,
                component,
                properties,
                prototype_fields,
            };
            run_search(
                &snapshot,
                known.as_deref(),
                criteria.as_deref(),
                config.as_deref(),
                args,
                yield_every,
                format,
                progress,
            )
            .await?;
        }
        Command::Inspect {
            snapshot,
            id,
            known,
        } => {
            run_inspect(&snapshot, ModuleId::new(id), known.as_deref())?;
        }
    }

    Ok(())
}

fn setup_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("modscope=debug,info"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run the engine over a snapshot and print the visible modules.
#[allow(clippy::too_many_arguments)]
async fn run_search(
    snapshot_path: &Path,
    known_path: Option<&Path>,
    criteria_path: Option<&Path>,
    config_path: Option<&Path>,
    args: CriteriaArgs,
    yield_every: Option<usize>,
    format: OutputFormat,
    progress: bool,
) -> Result<()> {
    let snapshot = RegistrySnapshot::load(snapshot_path).context("Failed to load snapshot")?;
    let registry = MemoryRegistry::from_snapshot(&snapshot).context("Invalid snapshot")?;
    let known = load_known(known_path)?;

    let mut config: EngineConfig = match config_path {
        Some(path) => read_json(path).context("Failed to load engine config")?,
        None => EngineConfig::default(),
    };
    if let Some(yield_every) = yield_every {
        if yield_every == 0 {
            bail!("--yield-every must be at least 1");
        }
        config.yield_every = yield_every;
    }
    if let Err(reason) = config.validate() {
        bail!("Invalid engine config: {reason}");
    }

    let saved: CriteriaSettings = match criteria_path {
        Some(path) => read_json(path).context("Failed to load criteria")?,
        None => CriteriaSettings::default(),
    };
    let settings = args.apply(saved);
    tracing::debug!(?settings, "search criteria");

    eprintln!("Indexing {} modules...", registry.size());

    let (engine, handle) = Engine::new(Arc::new(registry), known, config);
    handle.set_criteria(&settings).context("Invalid criteria")?;

    if progress {
        let mut updates = handle.progress_stream();
        tokio::spawn(async move {
            while let Some(update) = updates.next().await {
                if update.filtering {
                    eprintln!(
                        " Updating filters {}/{} ({:.0}%)",
                        update.filtered,
                        update.filter_total,
                        update.filter_percentage()
                    );
                } else {
                    eprintln!(
                        " Indexed {}/{} ({:.0}%)",
                        update.loaded,
                        update.total,
                        update.percentage()
                    );
                }
            }
        });
    }

    let engine_task = tokio::spawn(engine.run());
    let visible = handle.settled().await;
    handle.shutdown();
    engine_task.await.context("Engine task failed")?;

    match format {
        OutputFormat::Text => print_visible(&visible),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(visible.as_ref())?),
    }

    Ok(())
}

/// Show a single module.
fn run_inspect(snapshot_path: &Path, id: ModuleId, known_path: Option<&Path>) -> Result<()> {
    let snapshot = RegistrySnapshot::load(snapshot_path).context("Failed to load snapshot")?;
    let registry = MemoryRegistry::from_snapshot(&snapshot).context("Invalid snapshot")?;
    let known = load_known(known_path)?;
    let config = EngineConfig::default();

    let (Some(entry), Some(fixture)) = (registry.get(id), snapshot.module(id)) else {
        bail!("No module with id {id}");
    };
    let record = ModuleRecord::observe(id, entry, &known);

    println!();
    println!("{}", "─".repeat(70));
    println!(" Module {id}");
    println!("{}", "─".repeat(70));
    println!(" Status:        {}", record.load_state);
    println!(
        " Display name:  {}",
        record.display_name.as_deref().unwrap_or("-")
    );
    println!(
        " Known module:  {}",
        record.known_name.as_deref().unwrap_or("-")
    );

    if record.load_state.is_instantiated() {
        let component = match record.is_component(&config.component_marker) {
            Ok(true) => "yes".to_string(),
            Ok(false) => "no".to_string(),
            Err(err) => format!("unknown ({err})"),
        };
        println!(" Component:     {component}");

        if let Some(exports) = exported(fixture) {
            let keys = exports
                .as_object()
                .map(|fields| fields.keys().join(", "))
                .unwrap_or_default();
            println!(" Export keys:   {}", if keys.is_empty() { "-" } else { keys.as_str() });
            println!();
            println!(" Exports:");
            println!("{}", serde_json::to_string_pretty(exports)?);

            if let Some(prototype) = prototype_of(exports) {
                println!();
                println!(" Prototype:");
                println!("{}", serde_json::to_string_pretty(prototype)?);
            }
        }
    }

    println!();
    println!(" Code:");
    println!("{}", record.source_text());

    Ok(())
}

/// Exports recorded for an instantiated module.
fn exported(fixture: &ModuleFixture) -> Option<&serde_json::Value> {
    fixture
        .exports
        .as_ref()
        .filter(|_| fixture.state.is_instantiated())
}

/// The exports' own prototype, else the default export's.
fn prototype_of(exports: &serde_json::Value) -> Option<&serde_json::Value> {
    exports
        .get("prototype")
        .or_else(|| exports.get("default").and_then(|default| default.get("prototype")))
        .filter(|prototype| !prototype.is_null())
}

/// Print the visible set as a table.
fn print_visible(visible: &VisibleSnapshot) {
    println!();
    println!("{}", "─".repeat(70));
    println!(" {} module(s) match", visible.len());
    println!("{}", "─".repeat(70));

    for entry in &visible.entries {
        println!(
            " {:>6}  {:<40} {:<7} {}",
            entry.id.index(),
            truncate(entry.name.as_deref().unwrap_or("-"), 40),
            if entry.component { "React" } else { "" },
            entry.load_state
        );
    }
    println!();
}

fn load_known(path: Option<&Path>) -> Result<KnownModules> {
    let specs: Vec<MatcherSpec> = match path {
        Some(path) => read_json(path).context("Failed to load known modules")?,
        None => Vec::new(),
    };
    Ok(KnownModules::from_specs(specs))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Malformed JSON in {}", path.display()))
}

/// Truncate a string to max length.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 1).collect();
        format!("{head}…")
    }
}
