//! Capture a live database into an inventory document

use crate::config::Settings;
use crate::connection;
use crate::introspection::{CaptureOptions, PostgresIntrospector};
use crate::snapshot::{save_inventory, write_inventory};
use anyhow::Context;
use clap::Args;
use std::io;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Write the inventory here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Only capture the first few tables of each user
    #[arg(short, long)]
    pub debug: bool,

    /// Overrides `create.database_url`
    #[arg(long)]
    pub database_url: Option<String>,
}

pub async fn execute(args: CreateArgs, settings: &Settings) -> anyhow::Result<()> {
    let database_url = match args.database_url {
        Some(url) => url,
        None => settings.create.resolve_database_url()?,
    };

    let (params, pool) = connection::connect(&database_url).await?;
    info!("Connected to {}", params.to_display_string());

    let options = CaptureOptions {
        users: settings.create.users.clone(),
        debug: args.debug,
    };
    let inventory = PostgresIntrospector::introspect(&pool, &options).await?;

    match args.output {
        Some(path) => save_inventory(&path, &inventory)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => write_inventory(io::stdout().lock(), &inventory)?,
    }

    Ok(())
}
