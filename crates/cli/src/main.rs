//! factctx CLI, the main entry point.
//!
//! Commands:
//! - `fact`: Add, update, inspect and delete stored facts
//! - `prompt`: Build a prompt with relevant facts for a request
//! - `config`: Create or show the configuration file
//! - `status`: Show store and selection status

use clap::{Parser, Subcommand};
use factctx_core::Scope;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "factctx",
    about = "factctx: scoped fact store with injection-safe prompt assembly",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Fact store database file (overrides config and FACTCTX_STORE_PATH)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage stored facts
    Fact {
        #[command(subcommand)]
        action: FactAction,
    },

    /// Build a prompt for a request type, injecting relevant facts
    Prompt {
        /// Request type used to pick relevant categories (e.g. coding, chat)
        request_type: String,

        /// Caller input; read from stdin when omitted
        input: Option<String>,

        /// Print prompt, conflicts and metadata as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show store and selection status
    Status,
}

#[derive(Subcommand)]
enum FactAction {
    /// Record a new fact; fails if the key already exists in the scope
    Add {
        /// session, project, user or org
        scope: Scope,
        category: String,
        key: String,
        value: String,

        /// Parse VALUE as JSON (number, bool or object)
        #[arg(long)]
        json: bool,

        #[arg(short, long, default_value_t = 1.0)]
        confidence: f64,

        #[arg(short, long, default_value = "cli")]
        source: String,
    },

    /// Replace the value of an existing fact
    Update {
        scope: Scope,
        key: String,
        value: String,

        /// Parse VALUE as JSON (number, bool or object)
        #[arg(long)]
        json: bool,

        #[arg(short, long, default_value_t = 1.0)]
        confidence: f64,

        #[arg(short, long, default_value = "cli")]
        source: String,
    },

    /// Show one fact by id
    Get { id: String },

    /// List facts in insertion order
    List {
        #[arg(long)]
        scope: Option<Scope>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        min_confidence: Option<f64>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a fact by id
    Delete { id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file if none exists
    Init,
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so prompts on stdout stay clean
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let store = cli.store.as_deref();

    match cli.command {
        Commands::Fact { action } => match action {
            FactAction::Add {
                scope,
                category,
                key,
                value,
                json,
                confidence,
                source,
            } => {
                let value = commands::fact::parse_value(&value, json)?;
                commands::fact::add(store, scope, category, key, value, confidence, source).await?
            }
            FactAction::Update {
                scope,
                key,
                value,
                json,
                confidence,
                source,
            } => {
                let value = commands::fact::parse_value(&value, json)?;
                commands::fact::update(store, scope, &key, value, confidence, source).await?
            }
            FactAction::Get { id } => commands::fact::get(store, &id).await?,
            FactAction::List {
                scope,
                category,
                min_confidence,
                json,
            } => commands::fact::list(store, scope, category, min_confidence, json).await?,
            FactAction::Delete { id } => commands::fact::delete(store, &id).await?,
        },
        Commands::Prompt {
            request_type,
            input,
            json,
        } => commands::prompt::run(store, &request_type, input, json).await?,
        Commands::Config { action } => match action {
            ConfigAction::Init => commands::config_cmd::init().await?,
            ConfigAction::Show => commands::config_cmd::show(store).await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
        Commands::Status => commands::status::run(store).await?,
    }

    Ok(())
}
