//! Pattern store synchronizer

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::OwnedMutexGuard;

use super::classify::PatternCandidate;
use super::project::project_next;
use crate::db::Database;
use crate::error::Result;
use crate::models::{DetectedPattern, NewDetectedPattern, PatternSource, PatternStatus};

/// Confidence assigned to every auto-detected pattern ("medium")
pub const DETECTED_CONFIDENCE: f64 = 0.5;

/// Where detected patterns are persisted
pub trait PatternStore: Send + Sync {
    /// Atomically swap the account's detected rows for `patterns`
    fn replace_detected(
        &self,
        account_id: i64,
        patterns: &[NewDetectedPattern],
    ) -> Result<SyncOutcome>;

    fn list_patterns(
        &self,
        account_id: i64,
        source: Option<PatternSource>,
    ) -> Result<Vec<DetectedPattern>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub deleted: usize,
    pub inserted: usize,
}

impl PatternStore for Database {
    fn replace_detected(
        &self,
        account_id: i64,
        patterns: &[NewDetectedPattern],
    ) -> Result<SyncOutcome> {
        let (deleted, inserted) = self.replace_detected_patterns(account_id, patterns)?;
        Ok(SyncOutcome { deleted, inserted })
    }

    fn list_patterns(
        &self,
        account_id: i64,
        source: Option<PatternSource>,
    ) -> Result<Vec<DetectedPattern>> {
        Database::list_patterns(self, account_id, source)
    }
}

/// Build the stored row for a classified group
pub fn to_new_pattern(account_id: i64, candidate: &PatternCandidate) -> NewDetectedPattern {
    NewDetectedPattern {
        account_id,
        merchant_name: candidate.merchant_name.clone(),
        frequency: candidate.frequency.to_stored(),
        average_amount: candidate.average_amount,
        last_occurrence_date: candidate.last_occurrence_date,
        next_projected_date: project_next(candidate.last_occurrence_date, candidate.frequency),
        occurrence_count: candidate.occurrence_count as i64,
        confidence_score: DETECTED_CONFIDENCE,
        source: PatternSource::Detected,
        status: PatternStatus::Active,
    }
}

/// One async mutex per account, created on first use
///
/// Entries nobody holds or waits on are dropped on the next `lock` call, so
/// the map only tracks accounts with runs in flight.
#[derive(Debug, Default)]
pub struct AccountLocks {
    locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other detection run holds `account_id`
    pub async fn lock(&self, account_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Guards and waiters each keep a clone of the Arc
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(account_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Accounts currently tracked
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
