//! Diff two inventory files

use crate::changes::{ChangeDetector, ChangeSink, ChangeSummary, JsonLinesSink, TracingSink};
use crate::config::{Settings, SinkKind};
use crate::inventory::Inventory;
use crate::snapshot::read_inventory;
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Args;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Args)]
pub struct ChangesArgs {
    /// Earlier inventory
    pub old: PathBuf,

    /// Later inventory
    pub new: PathBuf,

    /// As-of time for the changes (RFC 3339); defaults to NEW's modification time
    #[arg(long)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Emit JSON lines regardless of `changes.sink`
    #[arg(long)]
    pub json: bool,

    /// JSON lines destination; overrides `changes.output`
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn execute(args: ChangesArgs, settings: &Settings) -> anyhow::Result<ChangeSummary> {
    let old = read_inventory(&args.old)
        .with_context(|| format!("Failed to load {}", args.old.display()))?;
    let new = read_inventory(&args.new)
        .with_context(|| format!("Failed to load {}", args.new.display()))?;
    let timestamp = args.timestamp.unwrap_or(new.modified_at);

    let kind = if args.json { SinkKind::Json } else { settings.changes.sink };
    let output = args.output.or_else(|| settings.changes.output.clone());

    let summary = match (kind, output) {
        (SinkKind::Log, _) => run(TracingSink, &old.inventory, &new.inventory, timestamp)?,
        (SinkKind::Json, Some(path)) => {
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let sink = JsonLinesSink::new(BufWriter::new(file));
            run(sink, &old.inventory, &new.inventory, timestamp)?
        }
        (SinkKind::Json, None) => {
            let sink = JsonLinesSink::new(io::stdout().lock());
            run(sink, &old.inventory, &new.inventory, timestamp)?
        }
    };

    if summary.is_empty() {
        info!("No changes between {} and {}", args.old.display(), args.new.display());
    }
    eprintln!("Total changes: {}", summary.total_changes);
    Ok(summary)
}

fn run<S: ChangeSink>(
    sink: S,
    old: &Inventory,
    new: &Inventory,
    timestamp: DateTime<Utc>,
) -> anyhow::Result<ChangeSummary> {
    let mut detector = ChangeDetector::new(sink);
    Ok(detector.detect(old, new, timestamp)?)
}
