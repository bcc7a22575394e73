//! `detect-recurring` task

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{RunContext, Task, TaskOptions, Validate};
use crate::db::Database;
use crate::detect::{check_lookback, RecurringDetector};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectRecurringPayload {
    /// Tenant that must own the account
    pub user_id: i64,
    pub bank_account_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookback_days: Option<i64>,
}

impl Validate for DetectRecurringPayload {
    fn validate(&self) -> Result<()> {
        if self.user_id <= 0 {
            return Err(Error::Validation("userId must be positive".into()));
        }
        if self.bank_account_id <= 0 {
            return Err(Error::Validation("bankAccountId must be positive".into()));
        }
        if let Some(days) = self.lookback_days {
            check_lookback(days)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectRecurringOutput {
    pub status: String,
    pub patterns_identified: usize,
    pub message: String,
}

pub struct DetectRecurringTask {
    db: Database,
    detector: RecurringDetector,
    default_lookback_days: i64,
    options: TaskOptions,
    /// Fixed "today" for reproducible runs; `None` uses the current UTC date
    today: Option<NaiveDate>,
}

impl DetectRecurringTask {
    pub const ID: &'static str = "detect-recurring";

    pub fn new(
        db: Database,
        detector: RecurringDetector,
        default_lookback_days: i64,
        options: TaskOptions,
    ) -> Self {
        Self {
            db,
            detector,
            default_lookback_days,
            options,
            today: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn detector(&self) -> &RecurringDetector {
        &self.detector
    }
}

#[async_trait]
impl Task for DetectRecurringTask {
    type Payload = DetectRecurringPayload;
    type Output = DetectRecurringOutput;

    fn id(&self) -> &'static str {
        Self::ID
    }

    fn options(&self) -> TaskOptions {
        self.options.clone()
    }

    async fn run(&self, payload: &Self::Payload, ctx: &RunContext) -> Result<Self::Output> {
        let account_id = payload.bank_account_id;

        // Accounts of other tenants look exactly like missing ones
        let account = self
            .db
            .get_account(account_id)?
            .filter(|a| a.user_id == payload.user_id)
            .ok_or_else(|| Error::NotFound(format!("bank account {}", account_id)))?;

        let lookback = payload.lookback_days.unwrap_or(self.default_lookback_days);
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
        let outcome = self
            .detector
            .run(account.id, lookback, today, &ctx.trace)
            .await?;

        let count = outcome.patterns_identified();
        Ok(DetectRecurringOutput {
            status: "success".to_string(),
            patterns_identified: count,
            message: format!(
                "Identified {} recurring pattern{} in {} transactions over {} days",
                count,
                if count == 1 { "" } else { "s" },
                outcome.transactions_scanned,
                lookback
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskLimits;
    use crate::models::{NewTransaction, TransactionStatus};
    use crate::tasks::{parse_payload, RetryPolicy, TaskRunner};
    use std::time::Duration;

    fn task(db: &Database) -> DetectRecurringTask {
        DetectRecurringTask::new(
            db.clone(),
            RecurringDetector::new(db.clone()),
            90,
            TaskOptions::new(
                TaskLimits {
                    queue_concurrency: 10,
                    max_duration: Duration::from_secs(30),
                },
                RetryPolicy::none(),
            ),
        )
        .with_today(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap())
    }

    #[test]
    fn test_payload_validation() {
        let ok: DetectRecurringPayload =
            parse_payload(serde_json::json!({"userId": 1, "bankAccountId": 2})).unwrap();
        assert_eq!(ok.lookback_days, None);

        for bad in [
            serde_json::json!({"userId": 1}),
            serde_json::json!({"userId": 1, "bankAccountId": 0}),
            serde_json::json!({"userId": 1, "bankAccountId": 2, "lookbackDays": 400}),
            serde_json::json!({"userId": "1", "bankAccountId": 2}),
        ] {
            assert!(matches!(
                parse_payload::<DetectRecurringPayload>(bad),
                Err(Error::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_detects_through_runner() {
        let db = Database::in_memory().unwrap();
        let account = db.create_account(5, "Checking", "USD").unwrap();
        for (m, d) in [(1, 5), (2, 5), (3, 5)] {
            db.insert_transaction(
                account,
                &NewTransaction {
                    date: NaiveDate::from_ymd_opt(2024, m, d).unwrap(),
                    counterparty_name: "Spotify".to_string(),
                    amount: -10.99,
                    currency: "USD".to_string(),
                    status: TransactionStatus::Posted,
                    category_id: None,
                    note: None,
                    import_hash: format!("spotify-{}", m),
                },
            )
            .unwrap();
        }

        let runner = TaskRunner::new(db.clone());
        let done = runner
            .trigger(
                &task(&db),
                serde_json::json!({"userId": 5, "bankAccountId": account}),
            )
            .await
            .unwrap();
        assert_eq!(done.output.status, "success");
        assert_eq!(done.output.patterns_identified, 1);
        assert!(done.output.message.starts_with("Identified 1 recurring pattern in 3"));
    }

    #[tokio::test]
    async fn test_foreign_account_is_not_found() {
        let db = Database::in_memory().unwrap();
        let account = db.create_account(5, "Checking", "USD").unwrap();
        let runner = TaskRunner::new(db.clone());

        let err = runner
            .trigger(
                &task(&db),
                serde_json::json!({"userId": 6, "bankAccountId": account}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
