//! aufgaben CLI: parse time-tracking notes against the task catalog.

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use aufgaben::config::{AppConfig, StoreKind};
use aufgaben::llm::{OllamaClient, TextCompletion};
use aufgaben::paths::AppPaths;
use aufgaben::pipeline::ParsedEntry;
use aufgaben::service::{open_store, TimeTracker};

#[derive(Parser)]
#[command(name = "aufgaben", version, about = "Time-tracking notes to structured entries")]
struct Cli {
    /// Config file (TOML). Defaults to $XDG_CONFIG_HOME/aufgaben/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog JSON file.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Data directory for persistent storage.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Keep everything in memory; nothing is written to disk.
    #[arg(long, global = true)]
    memory: bool,

    /// Ollama model name.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Ollama base URL.
    #[arg(long, global = true)]
    ollama_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flatten the catalog and replace the stored task list.
    Import,

    /// Show the catalog context for one owner and month.
    Tasks {
        /// Two-letter owner code, e.g. SK.
        #[arg(long)]
        owner: String,
        /// Month as YYYY-MM.
        #[arg(long)]
        month: String,
    },

    /// Parse notes into structured entries (reads stdin without --text/--file).
    Parse {
        /// Notes given inline.
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        /// File containing the notes.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Persist the parsed entries.
        #[arg(long)]
        save: bool,
    },

    /// Persist entries from a JSON array file.
    Save {
        /// JSON file with an array of entries.
        #[arg(long)]
        file: PathBuf,
    },

    /// List saved entries.
    Saved {
        /// Group by date.
        #[arg(long)]
        by_date: bool,
    },

    /// Check that the generation backend is reachable and has the model.
    Check,
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

/// Load the index from the last import, importing the catalog if there is none.
fn ensure_catalog<C: TextCompletion>(tracker: &TimeTracker<C>, config: &AppConfig) -> Result<()> {
    if tracker.restore_index()? == 0 {
        let summary = tracker.import_catalog_file(&config.catalog_path)?;
        eprintln!("Imported {summary}");
    }
    Ok(())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let paths = AppPaths::resolve().ok();
    let mut config = AppConfig::load(cli.config.as_deref(), paths.as_ref())?;
    if let Some(catalog) = cli.catalog {
        config.catalog_path = catalog;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = Some(data_dir);
    }
    if cli.memory {
        config.store = StoreKind::Memory;
    }
    if let Some(model) = cli.model {
        config.ollama.model = model;
    }
    if let Some(url) = cli.ollama_url {
        config.ollama.base_url = url;
    }

    if let Commands::Check = cli.command {
        let mut client = OllamaClient::new(config.ollama.clone());
        if !client.probe() {
            miette::bail!("Ollama is not reachable at {}", config.ollama.base_url);
        }
        if client.has_model() {
            println!("Ollama OK, model \"{}\" is available", client.model());
        } else {
            println!(
                "Ollama OK, but model \"{}\" is missing (available: {})",
                client.model(),
                client.available_models().join(", ")
            );
        }
        return Ok(());
    }

    let store = open_store(&config, paths.as_ref())?;
    let tracker = TimeTracker::new(OllamaClient::new(config.ollama.clone()), store);

    match cli.command {
        Commands::Import => {
            if config.reset_entries_on_start {
                tracker.reset_entries()?;
            }
            let summary = tracker.import_catalog_file(&config.catalog_path)?;
            println!("Imported {summary} from {}", config.catalog_path.display());
        }

        Commands::Tasks { owner, month } => {
            ensure_catalog(&tracker, &config)?;
            print_json(&tracker.catalog_context(&owner, &month))?;
        }

        Commands::Parse { text, file, save } => {
            let raw = match (text, file) {
                (Some(text), _) => text,
                (None, Some(file)) => std::fs::read_to_string(&file).into_diagnostic()?,
                (None, None) => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf).into_diagnostic()?;
                    buf
                }
            };

            ensure_catalog(&tracker, &config)?;
            let outcome = tracker.parse(&raw)?;
            eprintln!(
                "owner {} / month {}: {} entries",
                outcome.metadata.owner,
                outcome.metadata.month,
                outcome.entries.len()
            );
            if save {
                let saved = tracker.save(outcome.entries)?;
                print_json(&saved)?;
            } else {
                print_json(&outcome.entries)?;
            }
        }

        Commands::Save { file } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            let entries: Vec<ParsedEntry> = serde_json::from_str(&content).into_diagnostic()?;
            let saved = tracker.save(entries)?;
            println!("Saved {} entries", saved.len());
        }

        Commands::Saved { by_date } => {
            if by_date {
                print_json(&tracker.saved_by_date()?)?;
            } else {
                print_json(&tracker.saved()?)?;
            }
        }

        Commands::Check => {}
    }

    Ok(())
}
