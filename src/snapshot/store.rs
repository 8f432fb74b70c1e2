//! Inventory Snapshot Store
//!
//! Keeps versioned inventories per source database so the API can diff
//! any two of them. Versions auto-increment per source.

use crate::error::AppError;
use crate::inventory::{self, Inventory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A stored inventory and its bookkeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSnapshot {
    pub id: Uuid,
    pub source: String,
    pub version: u64,
    pub captured_at: DateTime<Utc>,
    pub checksum: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub inventory: Inventory,
}

impl StoredSnapshot {
    /// Wrap an inventory; version is assigned on save
    pub fn new(source: impl Into<String>, inventory: Inventory, captured_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            version: 0,
            captured_at,
            checksum: inventory::checksum(&inventory),
            label: None,
            inventory,
        }
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }
}

/// Metadata about a snapshot (lightweight, used for listing)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub id: Uuid,
    pub source: String,
    pub version: u64,
    pub captured_at: DateTime<Utc>,
    pub checksum: String,
    pub user_count: usize,
    pub table_count: usize,
    pub label: Option<String>,
}

impl From<&StoredSnapshot> for SnapshotMetadata {
    fn from(snapshot: &StoredSnapshot) -> Self {
        Self {
            id: snapshot.id,
            source: snapshot.source.clone(),
            version: snapshot.version,
            captured_at: snapshot.captured_at,
            checksum: snapshot.checksum.clone(),
            user_count: snapshot.inventory.len(),
            table_count: inventory::table_count(&snapshot.inventory),
            label: snapshot.label.clone(),
        }
    }
}

/// Store for managing inventory snapshots
pub struct SnapshotStore {
    /// Source -> (Version -> Snapshot)
    snapshots: Arc<RwLock<HashMap<String, HashMap<u64, StoredSnapshot>>>>,
    /// Source -> Last version handed out; never decreases, even after a prune
    versions: Arc<RwLock<HashMap<String, u64>>>,
    /// Source -> Baseline version
    baselines: Arc<RwLock<HashMap<String, u64>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(RwLock::new(HashMap::new())),
            versions: Arc::new(RwLock::new(HashMap::new())),
            baselines: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store a new snapshot, auto-incrementing version
    pub async fn save(&self, mut snapshot: StoredSnapshot) -> StoredSnapshot {
        let source = snapshot.source.clone();

        let mut versions = self.versions.write().await;
        let new_version = versions.get(&source).copied().unwrap_or(0) + 1;
        snapshot.version = new_version;
        versions.insert(source.clone(), new_version);

        let mut snapshots = self.snapshots.write().await;
        snapshots
            .entry(source.clone())
            .or_default()
            .insert(new_version, snapshot.clone());

        tracing::info!(
            "Saved inventory v{} for {}: {} users, {} tables",
            new_version,
            source,
            snapshot.inventory.len(),
            inventory::table_count(&snapshot.inventory)
        );

        snapshot
    }

    /// Get the newest surviving snapshot for a source
    pub async fn get_latest(&self, source: &str) -> Option<StoredSnapshot> {
        let snapshots = self.snapshots.read().await;
        let source_snapshots = snapshots.get(source)?;
        let version = source_snapshots.keys().max()?;
        source_snapshots.get(version).cloned()
    }

    /// Highest surviving version strictly below `version`
    pub async fn previous_version(&self, source: &str, version: u64) -> Option<u64> {
        let snapshots = self.snapshots.read().await;
        snapshots
            .get(source)?
            .keys()
            .copied()
            .filter(|v| *v < version)
            .max()
    }

    /// Get a specific version
    pub async fn get_version(&self, source: &str, version: u64) -> Option<StoredSnapshot> {
        let snapshots = self.snapshots.read().await;
        snapshots.get(source)?.get(&version).cloned()
    }

    /// List all snapshots for a source (metadata only, newest first)
    pub async fn list(&self, source: &str) -> Vec<SnapshotMetadata> {
        let snapshots = self.snapshots.read().await;

        snapshots
            .get(source)
            .map(|m| {
                let mut list: Vec<_> = m.values().map(SnapshotMetadata::from).collect();
                list.sort_by(|a, b| b.version.cmp(&a.version));
                list
            })
            .unwrap_or_default()
    }

    /// Sources with at least one snapshot, sorted
    pub async fn sources(&self) -> Vec<String> {
        let snapshots = self.snapshots.read().await;
        let mut sources: Vec<_> = snapshots.keys().cloned().collect();
        sources.sort();
        sources
    }

    /// Mark a version as the reference state for drift checks
    pub async fn set_baseline(&self, source: &str, version: u64) -> Result<(), AppError> {
        if self.get_version(source, version).await.is_none() {
            return Err(AppError::NotFound(format!(
                "Snapshot v{} not found for {}",
                version, source
            )));
        }

        let mut baselines = self.baselines.write().await;
        baselines.insert(source.to_string(), version);

        tracing::info!("Set baseline for {} to v{}", source, version);
        Ok(())
    }

    /// Get baseline snapshot for a source
    pub async fn get_baseline(&self, source: &str) -> Option<StoredSnapshot> {
        let version = *self.baselines.read().await.get(source)?;
        self.get_version(source, version).await
    }

    /// Delete old snapshots, keeping the last N versions and the baseline
    pub async fn prune(&self, source: &str, keep_versions: usize) -> usize {
        let baseline = self.baselines.read().await.get(source).copied();
        let mut snapshots = self.snapshots.write().await;

        let Some(source_snapshots) = snapshots.get_mut(source) else {
            return 0;
        };
        if source_snapshots.len() <= keep_versions {
            return 0;
        }

        let mut versions: Vec<_> = source_snapshots.keys().copied().collect();
        versions.sort_by(|a, b| b.cmp(a));

        let to_remove: Vec<_> = versions
            .into_iter()
            .skip(keep_versions)
            .filter(|v| Some(*v) != baseline)
            .collect();
        let removed_count = to_remove.len();

        for v in to_remove {
            source_snapshots.remove(&v);
        }

        tracing::info!("Pruned {} old inventories for {}", removed_count, source);
        removed_count
    }

    /// Fetch two versions for comparison
    pub async fn compare_versions(
        &self,
        source: &str,
        from_version: u64,
        to_version: u64,
    ) -> Result<(StoredSnapshot, StoredSnapshot), AppError> {
        let from = self
            .get_version(source, from_version)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Snapshot v{} not found", from_version)))?;

        let to = self
            .get_version(source, to_version)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Snapshot v{} not found", to_version)))?;

        Ok((from, to))
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
