//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::config::Settings;
use crate::snapshot::SnapshotStore;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Versioned inventories per source database
    pub snapshots: SnapshotStore,

    /// Settings the server was started with
    pub settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            snapshots: SnapshotStore::new(),
            settings,
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
