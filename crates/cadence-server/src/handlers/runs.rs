//! Task run log handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, MAX_PAGE_LIMIT};
use cadence_core::models::TaskRun;

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct RunQuery {
    /// Restrict to one task type, e.g. `detect-recurring`
    pub task: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// GET /api/runs - Most recent task runs
pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RunQuery>,
) -> Result<Json<Vec<TaskRun>>, AppError> {
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    Ok(Json(state.db.list_task_runs(params.task.as_deref(), limit)?))
}

/// GET /api/runs/:id - One task run
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<TaskRun>, AppError> {
    state
        .db
        .get_task_run(id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found(&format!("Run {} not found", id)))
}
