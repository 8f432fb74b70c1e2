//! Inventory Snapshot Module
//!
//! Where inventories live between captures:
//! - JSON documents on disk (the CLI workflow)
//! - A versioned in-memory store (the HTTP API)

pub mod file;
pub mod store;

pub use file::{read_inventory, save_inventory, write_inventory};
pub use store::{SnapshotMetadata, SnapshotStore, StoredSnapshot};
