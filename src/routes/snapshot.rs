//! Snapshot API Routes
//!
//! Capture, import, list and baseline inventories.

use crate::config::NameFilter;
use crate::connection;
use crate::error::{ApiResult, AppError};
use crate::introspection::{CaptureOptions, PostgresIntrospector};
use crate::inventory;
use crate::snapshot::{SnapshotMetadata, StoredSnapshot};
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

// ==================== Request/Response Types ====================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSnapshotRequest {
    #[validate(length(min = 1, message = "Connection string is required"))]
    pub connection_string: String,
    /// Defaults to `database@host`
    #[validate(length(min = 1, max = 255))]
    pub source: Option<String>,
    #[validate(length(max = 255))]
    pub label: Option<String>,
    /// Overrides the configured user filters when present
    pub users: Option<NameFilter>,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImportSnapshotRequest {
    #[validate(length(min = 1, max = 255, message = "Source is required"))]
    pub source: String,
    #[validate(length(max = 255))]
    pub label: Option<String>,
    /// As-of time of the inventory; defaults to now
    pub captured_at: Option<DateTime<Utc>>,
    pub inventory: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneQuery {
    pub keep: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub success: bool,
    pub message: String,
    pub snapshot: StoredSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotListResponse {
    pub success: bool,
    pub snapshots: Vec<SnapshotMetadata>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceListResponse {
    pub success: bool,
    pub sources: Vec<String>,
}

// ==================== Handlers ====================

/// Capture a live database into a new snapshot
pub async fn capture_snapshot(
    State(state): State<SharedState>,
    Json(req): Json<CaptureSnapshotRequest>,
) -> ApiResult<Json<SnapshotResponse>> {
    req.validate()?;

    let (params, pool) = connection::connect(&req.connection_string).await?;
    let options = CaptureOptions {
        users: req.users.unwrap_or_else(|| state.settings.create.users.clone()),
        debug: req.debug,
    };

    let captured_at = Utc::now();
    let inventory = PostgresIntrospector::introspect(&pool, &options).await?;
    let source = req.source.unwrap_or_else(|| params.source_name());

    let snapshot = state
        .snapshots
        .save(StoredSnapshot::new(source, inventory, captured_at).with_label(req.label))
        .await;

    Ok(Json(SnapshotResponse {
        success: true,
        message: format!("Snapshot v{} captured for {}", snapshot.version, snapshot.source),
        snapshot,
    }))
}

/// Store an inventory document produced elsewhere
pub async fn import_snapshot(
    State(state): State<SharedState>,
    Json(req): Json<ImportSnapshotRequest>,
) -> ApiResult<Json<SnapshotResponse>> {
    req.validate()?;

    let inventory = inventory::from_value(req.inventory)?;
    let captured_at = req.captured_at.unwrap_or_else(Utc::now);

    let snapshot = state
        .snapshots
        .save(StoredSnapshot::new(req.source, inventory, captured_at).with_label(req.label))
        .await;

    Ok(Json(SnapshotResponse {
        success: true,
        message: format!("Snapshot v{} imported for {}", snapshot.version, snapshot.source),
        snapshot,
    }))
}

/// List sources that have snapshots
pub async fn list_sources(State(state): State<SharedState>) -> Json<SourceListResponse> {
    Json(SourceListResponse {
        success: true,
        sources: state.snapshots.sources().await,
    })
}

/// List all snapshots for a source
pub async fn list_snapshots(
    State(state): State<SharedState>,
    Path(source): Path<String>,
) -> Json<SnapshotListResponse> {
    Json(SnapshotListResponse {
        success: true,
        snapshots: state.snapshots.list(&source).await,
    })
}

/// Get the latest snapshot for a source
pub async fn get_latest_snapshot(
    State(state): State<SharedState>,
    Path(source): Path<String>,
) -> ApiResult<Json<SnapshotResponse>> {
    let snapshot = state
        .snapshots
        .get_latest(&source)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No snapshots found for {}", source)))?;

    Ok(Json(SnapshotResponse {
        success: true,
        message: format!("Latest snapshot v{}", snapshot.version),
        snapshot,
    }))
}

/// Get a specific snapshot version
pub async fn get_snapshot_version(
    State(state): State<SharedState>,
    Path((source, version)): Path<(String, u64)>,
) -> ApiResult<Json<SnapshotResponse>> {
    let snapshot = state
        .snapshots
        .get_version(&source, version)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Snapshot v{} not found", version)))?;

    Ok(Json(SnapshotResponse {
        success: true,
        message: format!("Snapshot v{}", version),
        snapshot,
    }))
}

/// Mark a snapshot as the reference state for drift checks
pub async fn set_baseline(
    State(state): State<SharedState>,
    Path((source, version)): Path<(String, u64)>,
) -> ApiResult<Json<serde_json::Value>> {
    state.snapshots.set_baseline(&source, version).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("Baseline for {} set to v{}", source, version)
    })))
}

/// Drop old snapshots, keeping the newest `keep` and the baseline
pub async fn prune_snapshots(
    State(state): State<SharedState>,
    Path(source): Path<String>,
    Query(query): Query<PruneQuery>,
) -> Json<serde_json::Value> {
    let removed = state.snapshots.prune(&source, query.keep).await;

    Json(serde_json::json!({
        "success": true,
        "removed": removed
    }))
}
