//! Account and recurring-pattern handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::{AppError, AppState};
use cadence_core::models::{Account, DetectedPattern, PatternSource};

#[derive(Debug, Deserialize)]
pub struct AccountQuery {
    pub user_id: Option<i64>,
}

/// GET /api/accounts - List accounts, optionally for one tenant
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AccountQuery>,
) -> Result<Json<Vec<Account>>, AppError> {
    Ok(Json(state.db.list_accounts(params.user_id)?))
}

#[derive(Debug, Deserialize)]
pub struct RecurringQuery {
    /// `detected` or `manual`; both when omitted
    pub source: Option<String>,
}

/// GET /api/accounts/:id/recurring - Recurring patterns for an account
pub async fn list_recurring(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<RecurringQuery>,
) -> Result<Json<Vec<DetectedPattern>>, AppError> {
    let source = params
        .source
        .as_deref()
        .map(str::parse::<PatternSource>)
        .transpose()
        .map_err(|e| AppError::bad_request(&e))?;

    if state.db.get_account(id)?.is_none() {
        return Err(AppError::not_found(&format!("Account {} not found", id)));
    }

    Ok(Json(state.db.list_patterns(id, source)?))
}

fn default_days() -> i64 {
    7
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    #[serde(default = "default_days")]
    pub days: i64,
}

/// GET /api/recurring/upcoming - Active patterns due within `days`
pub async fn list_upcoming(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UpcomingQuery>,
) -> Result<Json<Vec<DetectedPattern>>, AppError> {
    if !(0..=366).contains(&params.days) {
        return Err(AppError::bad_request("days must be between 0 and 366"));
    }
    let until = Utc::now().date_naive() + Duration::days(params.days);
    Ok(Json(state.db.list_upcoming_patterns(until)?))
}
