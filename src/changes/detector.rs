//! Change detection orchestrator
//!
//! Runs the diff engine over two inventories and forwards every change,
//! in order, to an injected sink.

use super::diff::DiffEngine;
use super::record::{Change, ChangeSummary};
use super::sink::{ChangeSink, SinkError};
use crate::inventory::{self, Inventory, SnapshotError};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Instant;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Old inventory rejected: {0}")]
    OldInventory(#[source] SnapshotError),

    #[error("New inventory rejected: {0}")]
    NewInventory(#[source] SnapshotError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Detects changes between inventories and hands them to a sink
pub struct ChangeDetector<S: ChangeSink> {
    sink: S,
}

impl<S: ChangeSink> ChangeDetector<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Diff two loaded inventories.
    ///
    /// `timestamp` is the as-of time of `new` and is stamped on every record.
    pub fn detect(
        &mut self,
        old: &Inventory,
        new: &Inventory,
        timestamp: DateTime<Utc>,
    ) -> Result<ChangeSummary, SinkError> {
        let started = Instant::now();
        let changes = DiffEngine::diff(old, new, timestamp);
        debug!(
            "Diffed {} -> {} users in {:?}",
            old.len(),
            new.len(),
            started.elapsed()
        );

        self.emit(&changes)
    }

    /// Parse and diff two raw documents.
    ///
    /// Both documents are validated before anything reaches the sink, so a
    /// malformed inventory never produces a partial change log.
    pub fn detect_documents(
        &mut self,
        old: Value,
        new: Value,
        timestamp: DateTime<Utc>,
    ) -> Result<ChangeSummary, DetectError> {
        let old = inventory::from_value(old).map_err(DetectError::OldInventory)?;
        let new = inventory::from_value(new).map_err(DetectError::NewInventory)?;
        Ok(self.detect(&old, &new, timestamp)?)
    }

    fn emit(&mut self, changes: &[Change]) -> Result<ChangeSummary, SinkError> {
        for change in changes {
            self.sink.record(change)?;
        }
        self.sink.flush()?;

        let summary = ChangeSummary::from_changes(changes);
        debug!("Recorded {} changes", summary.total_changes);
        Ok(summary)
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
