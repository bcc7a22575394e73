//! Recurring-transaction detection
//!
//! A run goes through five stages, one submodule each:
//! - `fetch` - posted transactions inside the lookback window
//! - `group` - exact-name merchant groups of at least three members
//! - `classify` - average interval → frequency, amount-variance check
//! - `project` - next expected date from the last occurrence
//! - `sync` - atomic replacement of the account's detected rows
//!
//! Grouping and classification are pure and synchronous. Only the fetch and
//! the store write touch the outside world.

pub mod classify;
pub mod fetch;
pub mod group;
pub mod project;
pub mod sync;

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

pub use classify::{classify_group, Frequency, PatternCandidate, STORAGE_FREQUENCY_TABLE};
pub use fetch::{
    check_lookback, TransactionQuery, TransactionSource, DEFAULT_LOOKBACK_DAYS,
    MAX_LOOKBACK_DAYS, MIN_LOOKBACK_DAYS,
};
pub use group::{group_by_merchant, CandidateGroup, MIN_GROUP_SIZE};
pub use project::project_next;
pub use sync::{to_new_pattern, AccountLocks, PatternStore, SyncOutcome, DETECTED_CONFIDENCE};

use crate::db::Database;
use crate::error::Result;
use crate::models::{NewDetectedPattern, Transaction};
use crate::trace::TraceContext;

/// Turn an account's transactions into the pattern rows to store
///
/// Pure: the same input always yields the same rows in the same order.
pub fn detect_patterns(account_id: i64, transactions: &[Transaction]) -> Vec<NewDetectedPattern> {
    group_by_merchant(transactions)
        .iter()
        .filter_map(|group| {
            let candidate = classify_group(group);
            if candidate.is_none() {
                debug!(
                    merchant = group.merchant_name,
                    members = group.len(),
                    "Rejected group: too many distinct amounts"
                );
            }
            candidate
        })
        .map(|candidate| to_new_pattern(account_id, &candidate))
        .collect()
}

/// Result of one detection run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionOutcome {
    pub account_id: i64,
    pub transactions_scanned: usize,
    pub patterns: Vec<NewDetectedPattern>,
    pub sync: SyncOutcome,
}

impl DetectionOutcome {
    pub fn patterns_identified(&self) -> usize {
        self.patterns.len()
    }
}

/// Fetch → group → classify → project → sync for one account
#[derive(Clone)]
pub struct RecurringDetector {
    source: Arc<dyn TransactionSource>,
    store: Arc<dyn PatternStore>,
    locks: Arc<AccountLocks>,
}

impl RecurringDetector {
    /// Detector reading and writing the same database
    pub fn new(db: Database) -> Self {
        let db = Arc::new(db);
        Self::with_parts(db.clone(), db, Arc::new(AccountLocks::new()))
    }

    pub fn with_parts(
        source: Arc<dyn TransactionSource>,
        store: Arc<dyn PatternStore>,
        locks: Arc<AccountLocks>,
    ) -> Self {
        Self {
            source,
            store,
            locks,
        }
    }

    pub fn locks(&self) -> &Arc<AccountLocks> {
        &self.locks
    }

    /// Run detection for one account
    ///
    /// Runs for the same account are serialized; the second waits for the
    /// first to finish its store write.
    pub async fn run(
        &self,
        account_id: i64,
        lookback_days: i64,
        today: NaiveDate,
        trace: &TraceContext,
    ) -> Result<DetectionOutcome> {
        let query = TransactionQuery::posted_window(account_id, lookback_days, today)?;
        let _guard = self.locks.lock(account_id).await;

        let op = trace.operation("detect_recurring", &account_id.to_string());
        op.in_scope(|| {
            let transactions = self
                .source
                .find_many(&query)
                .map_err(|e| e.context("fetch_transactions", account_id.to_string()))?;

            let patterns = detect_patterns(account_id, &transactions);
            let sync = self
                .store
                .replace_detected(account_id, &patterns)
                .map_err(|e| e.context("sync_patterns", account_id.to_string()))?;

            info!(
                account_id,
                scanned = transactions.len(),
                detected = patterns.len(),
                replaced = sync.deleted,
                "Recurring detection complete"
            );

            Ok(DetectionOutcome {
                account_id,
                transactions_scanned: transactions.len(),
                patterns,
                sync,
            })
        })
    }
}
