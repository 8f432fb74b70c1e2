//! On-disk inventory documents
//!
//! Inventories are stored as pretty-printed JSON with sorted keys. The
//! file's modification time is the inventory's as-of time.

use crate::inventory::{self, Inventory, SnapshotError};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// An inventory read from disk together with its as-of time
#[derive(Debug, Clone)]
pub struct LoadedInventory {
    pub inventory: Inventory,
    pub modified_at: DateTime<Utc>,
}

/// Read and validate an inventory document
pub fn read_inventory(path: &Path) -> Result<LoadedInventory, SnapshotError> {
    let file = File::open(path)?;
    let modified_at = DateTime::<Utc>::from(file.metadata()?.modified()?);

    let mut json = String::new();
    BufReader::new(file).read_to_string(&mut json)?;
    let inventory = inventory::from_str(&json)?;

    debug!(
        "Read inventory {} ({} users, {} tables)",
        path.display(),
        inventory.len(),
        inventory::table_count(&inventory)
    );

    Ok(LoadedInventory {
        inventory,
        modified_at,
    })
}

/// Serialize an inventory to any writer
pub fn write_inventory<W: Write>(mut writer: W, inventory: &Inventory) -> Result<(), SnapshotError> {
    serde_json::to_writer_pretty(&mut writer, inventory)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Serialize an inventory to a file, replacing it if present
pub fn save_inventory(path: &Path, inventory: &Inventory) -> Result<(), SnapshotError> {
    let file = File::create(path)?;
    write_inventory(BufWriter::new(file), inventory)?;
    debug!("Wrote inventory {}", path.display());
    Ok(())
}
