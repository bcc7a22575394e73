//! Task trigger handlers
//!
//! Bodies are passed to the runner as raw JSON so payload validation happens
//! in one place, at the task boundary.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use tracing::info;

use crate::{AppError, AppState};
use cadence_core::{
    export::ExportOutput,
    tasks::DetectRecurringOutput,
    TaskCompletion,
};

/// Task payloads are small; export id lists are the largest
const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

async fn read_payload(request: Request) -> Result<serde_json::Value, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), MAX_PAYLOAD_SIZE)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))
}

/// POST /api/tasks/detect-recurring - Detect recurring patterns for one account
pub async fn trigger_detect_recurring(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<TaskCompletion<DetectRecurringOutput>>, AppError> {
    let payload = read_payload(request).await?;

    let done = state
        .engine
        .runner
        .trigger(&state.engine.detect, payload)
        .await
        .map_err(AppError::from_engine)?;

    info!(
        run_id = done.run_id,
        patterns = done.output.patterns_identified,
        "Detection triggered via API"
    );
    Ok(Json(done))
}

/// POST /api/tasks/export-transactions - Export rows and attachment blobs
pub async fn trigger_export_transactions(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<TaskCompletion<ExportOutput>>, AppError> {
    let payload = read_payload(request).await?;

    let done = state
        .engine
        .runner
        .trigger(&state.engine.export, payload)
        .await
        .map_err(AppError::from_engine)?;

    info!(
        run_id = done.run_id,
        rows = done.output.rows.len(),
        missing_blobs = done.output.missing_blobs(),
        "Export triggered via API"
    );
    Ok(Json(done))
}
