//! Schema Inventory - database structure snapshots and change detection
//!
//! `create` captures the users, tables, fields, privileges and indexes of a
//! database into a JSON inventory. `changes` diffs two inventories into an
//! ordered change log. `serve` exposes both over HTTP with a versioned
//! in-memory snapshot store.

mod changes;
mod commands;
mod config;
mod connection;
mod error;
mod introspection;
mod inventory;
mod routes;
mod snapshot;
mod state;

use crate::config::{LogFormat, LoggingConfig, Settings};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "info,schema_inventory=debug,tower_http=debug";

#[derive(Debug, Parser)]
#[command(name = "schema-inventory")]
#[command(about = "Capture database inventories and report what changed", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to config.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Capture a database into an inventory document
    Create(commands::create::CreateArgs),
    /// Report changes between two inventory documents
    Changes(commands::changes::ChangesArgs),
    /// Run the HTTP API
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;
    init_tracing(&settings.logging);
    debug!("Configuration loaded");

    match cli.command {
        Commands::Create(args) => commands::create::execute(args, &settings).await,
        Commands::Changes(args) => commands::changes::execute(args, &settings).map(|_| ()),
        Commands::Serve => commands::serve::execute(settings).await,
    }
}

/// Initialize tracing with structured logging on stderr
fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(logging.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER))
    });

    let (compact, json) = match logging.format {
        LogFormat::Compact => (
            Some(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true)
                    .compact(),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(fmt::layer().with_writer(std::io::stderr).json()),
        ),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(compact)
        .with(json)
        .init();
}
