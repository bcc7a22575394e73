//! Transaction fetcher: the bounded window of posted transactions per account

use chrono::{Duration, NaiveDate};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Transaction, TransactionStatus};

pub const MIN_LOOKBACK_DAYS: i64 = 30;
pub const MAX_LOOKBACK_DAYS: i64 = 365;
pub const DEFAULT_LOOKBACK_DAYS: i64 = 90;

/// Filter handed to a transaction source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionQuery {
    pub account_id: i64,
    /// Inclusive lower bound
    pub date_from: NaiveDate,
    pub status: Option<TransactionStatus>,
}

impl TransactionQuery {
    /// Posted transactions dated on/after `today - lookback_days`
    pub fn posted_window(account_id: i64, lookback_days: i64, today: NaiveDate) -> Result<Self> {
        check_lookback(lookback_days)?;
        Ok(Self {
            account_id,
            date_from: today - Duration::days(lookback_days),
            status: Some(TransactionStatus::Posted),
        })
    }
}

pub fn check_lookback(lookback_days: i64) -> Result<()> {
    if !(MIN_LOOKBACK_DAYS..=MAX_LOOKBACK_DAYS).contains(&lookback_days) {
        return Err(Error::Validation(format!(
            "lookbackDays must be between {} and {}, got {}",
            MIN_LOOKBACK_DAYS, MAX_LOOKBACK_DAYS, lookback_days
        )));
    }
    Ok(())
}

/// Where detection reads transactions from
///
/// Implementations return matches ordered by date ascending. An empty
/// result is not an error.
pub trait TransactionSource: Send + Sync {
    fn find_many(&self, query: &TransactionQuery) -> Result<Vec<Transaction>>;
}

impl TransactionSource for Database {
    fn find_many(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        self.list_transactions_since(query.account_id, query.date_from, query.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posted_window_bounds() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let query = TransactionQuery::posted_window(4, 90, today).unwrap();
        assert_eq!(query.date_from, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        assert_eq!(query.status, Some(TransactionStatus::Posted));

        assert!(TransactionQuery::posted_window(4, 30, today).is_ok());
        assert!(TransactionQuery::posted_window(4, 365, today).is_ok());
        assert!(matches!(
            TransactionQuery::posted_window(4, 29, today),
            Err(Error::Validation(_))
        ));
        assert!(TransactionQuery::posted_window(4, 366, today).is_err());
    }
}
