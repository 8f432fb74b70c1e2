//! Change Detection API Routes
//!
//! Diff stored snapshots, inline documents, or the baseline against the
//! latest capture.

use crate::changes::{Change, ChangeDetector, ChangeSummary};
use crate::error::{ApiResult, AppError};
use crate::snapshot::StoredSnapshot;
use crate::state::SharedState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==================== Request/Response Types ====================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesQuery {
    /// From version (defaults to the newest stored version before `to_version`)
    pub from_version: Option<u64>,
    /// To version (defaults to latest)
    pub to_version: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineChangesRequest {
    pub old: serde_json::Value,
    pub new: serde_json::Value,
    /// As-of time of `new`; defaults to now
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_version: Option<u64>,
    pub summary: ChangeSummary,
    pub changes: Vec<Change>,
}

// ==================== Handlers ====================

/// Compare two stored snapshots of a source
pub async fn diff_snapshots(
    State(state): State<SharedState>,
    Path(source): Path<String>,
    Query(query): Query<ChangesQuery>,
) -> ApiResult<Json<ChangesResponse>> {
    let latest = state
        .snapshots
        .get_latest(&source)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No snapshots found for {}", source)))?;

    let to_version = query.to_version.unwrap_or(latest.version);
    let from_version = match query.from_version {
        Some(version) => version,
        None => state
            .snapshots
            .previous_version(&source, to_version)
            .await
            .ok_or_else(|| {
                AppError::BadRequest("Need at least 2 snapshots to compare".to_string())
            })?,
    };

    let (from, to) = state
        .snapshots
        .compare_versions(&source, from_version, to_version)
        .await?;

    Ok(Json(diff_stored(&from, &to)?))
}

/// Compare the baseline snapshot of a source with its latest one
pub async fn check_drift(
    State(state): State<SharedState>,
    Path(source): Path<String>,
) -> ApiResult<Json<ChangesResponse>> {
    let baseline = state
        .snapshots
        .get_baseline(&source)
        .await
        .ok_or_else(|| AppError::NotFound("No baseline set. Set a baseline first.".to_string()))?;

    let latest = state
        .snapshots
        .get_latest(&source)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No snapshots found for {}", source)))?;

    Ok(Json(diff_stored(&baseline, &latest)?))
}

/// Compare two inventory documents supplied in the request
pub async fn diff_documents(
    Json(req): Json<InlineChangesRequest>,
) -> ApiResult<Json<ChangesResponse>> {
    let timestamp = req.timestamp.unwrap_or_else(Utc::now);

    let mut detector = ChangeDetector::new(Vec::new());
    let summary = detector.detect_documents(req.old, req.new, timestamp)?;

    Ok(Json(ChangesResponse {
        success: true,
        from_version: None,
        to_version: None,
        summary,
        changes: detector.into_sink(),
    }))
}

/// The newer snapshot's capture time is the as-of time of every change
fn diff_stored(from: &StoredSnapshot, to: &StoredSnapshot) -> Result<ChangesResponse, AppError> {
    let mut detector = ChangeDetector::new(Vec::new());
    let summary = detector.detect(&from.inventory, &to.inventory, to.captured_at)?;

    Ok(ChangesResponse {
        success: true,
        from_version: Some(from.version),
        to_version: Some(to.version),
        summary,
        changes: detector.into_sink(),
    })
}
