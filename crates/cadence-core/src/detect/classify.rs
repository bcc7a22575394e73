//! Periodicity classifier
//!
//! Turns one merchant group into a frequency plus an amount summary, or
//! rejects it when the amounts vary too much to call it a subscription.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::group::CandidateGroup;
use crate::models::StoredFrequency;

/// More distinct amounts than this and the group is not recurring
pub const MAX_DISTINCT_AMOUNTS: usize = 2;

/// Frequency as the classifier sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Annually,
    Unknown,
}

/// Classifier frequency → stored frequency
///
/// The pattern table has no quarterly value, so quarterly rows are kept as
/// IRREGULAR. Projection still uses the classified frequency.
pub const STORAGE_FREQUENCY_TABLE: [(Frequency, StoredFrequency); 6] = [
    (Frequency::Weekly, StoredFrequency::Weekly),
    (Frequency::Biweekly, StoredFrequency::Biweekly),
    (Frequency::Monthly, StoredFrequency::Monthly),
    (Frequency::Quarterly, StoredFrequency::Irregular),
    (Frequency::Annually, StoredFrequency::Annually),
    (Frequency::Unknown, StoredFrequency::Unknown),
];

impl Frequency {
    /// Bucket an average interval (days) using inclusive upper bounds
    pub fn from_average_interval(days: f64) -> Self {
        if days <= 7.0 {
            Self::Weekly
        } else if days <= 14.0 {
            Self::Biweekly
        } else if days <= 31.0 {
            Self::Monthly
        } else if days <= 92.0 {
            Self::Quarterly
        } else {
            Self::Annually
        }
    }

    pub fn to_stored(self) -> StoredFrequency {
        STORAGE_FREQUENCY_TABLE
            .iter()
            .find(|(f, _)| *f == self)
            .map(|(_, s)| *s)
            .unwrap_or(StoredFrequency::Unknown)
    }
}

/// A group that passed classification
#[derive(Debug, Clone, PartialEq)]
pub struct PatternCandidate {
    pub merchant_name: String,
    pub frequency: Frequency,
    pub average_interval_days: Option<f64>,
    /// Mean of absolute amounts, rounded to cents
    pub average_amount: f64,
    pub last_occurrence_date: NaiveDate,
    pub occurrence_count: usize,
}

fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Classify one group; `None` means the group is rejected
pub fn classify_group(group: &CandidateGroup<'_>) -> Option<PatternCandidate> {
    let mut members = group.transactions.clone();
    members.sort_by_key(|t| t.date);
    let last = members.last()?;

    let distinct: HashSet<i64> = members.iter().map(|t| to_cents(t.amount)).collect();
    if distinct.len() > MAX_DISTINCT_AMOUNTS {
        return None;
    }

    let intervals: Vec<i64> = members
        .windows(2)
        .map(|pair| (pair[1].date - pair[0].date).num_days())
        .collect();

    let (frequency, average_interval_days) = if intervals.is_empty() {
        (Frequency::Unknown, None)
    } else {
        let avg = intervals.iter().sum::<i64>() as f64 / intervals.len() as f64;
        (Frequency::from_average_interval(avg), Some(avg))
    };

    let total: f64 = members.iter().map(|t| t.amount.abs()).sum();
    let average_amount = (total / members.len() as f64 * 100.0).round() / 100.0;

    Some(PatternCandidate {
        merchant_name: group.merchant_name.to_string(),
        frequency,
        average_interval_days,
        average_amount,
        last_occurrence_date: last.date,
        occurrence_count: members.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Transaction, TransactionStatus};
    use chrono::Utc;

    fn tx(id: i64, day: NaiveDate, amount: f64) -> Transaction {
        Transaction {
            id,
            account_id: 1,
            date: day,
            counterparty_name: "Merchant".to_string(),
            amount,
            currency: "USD".to_string(),
            status: TransactionStatus::Posted,
            category_id: None,
            note: None,
            created_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn group(txs: &[Transaction]) -> CandidateGroup<'_> {
        CandidateGroup {
            merchant_name: "Merchant",
            transactions: txs.iter().collect(),
        }
    }

    #[test]
    fn test_interval_thresholds_inclusive() {
        assert_eq!(Frequency::from_average_interval(7.0), Frequency::Weekly);
        assert_eq!(Frequency::from_average_interval(7.5), Frequency::Biweekly);
        assert_eq!(Frequency::from_average_interval(14.0), Frequency::Biweekly);
        assert_eq!(Frequency::from_average_interval(31.0), Frequency::Monthly);
        assert_eq!(Frequency::from_average_interval(31.5), Frequency::Quarterly);
        assert_eq!(Frequency::from_average_interval(92.0), Frequency::Quarterly);
        assert_eq!(Frequency::from_average_interval(93.0), Frequency::Annually);
    }

    #[test]
    fn test_storage_table_maps_quarterly_to_irregular() {
        assert_eq!(Frequency::Quarterly.to_stored(), StoredFrequency::Irregular);
        assert_eq!(Frequency::Monthly.to_stored(), StoredFrequency::Monthly);
        assert_eq!(Frequency::Unknown.to_stored(), StoredFrequency::Unknown);
        // Every classifier value has exactly one row
        for (freq, _) in STORAGE_FREQUENCY_TABLE {
            assert_eq!(
                STORAGE_FREQUENCY_TABLE
                    .iter()
                    .filter(|(f, _)| *f == freq)
                    .count(),
                1
            );
        }
    }

    #[test]
    fn test_monthly_with_two_amounts() {
        // Out of order on purpose; classification re-sorts
        let txs = vec![
            tx(2, date(2024, 2, 1), -15.99),
            tx(1, date(2024, 1, 1), -15.99),
            tx(3, date(2024, 3, 1), -17.99),
        ];
        let candidate = classify_group(&group(&txs)).unwrap();
        assert_eq!(candidate.frequency, Frequency::Monthly);
        assert_eq!(candidate.occurrence_count, 3);
        assert_eq!(candidate.last_occurrence_date, date(2024, 3, 1));
        assert_eq!(candidate.average_amount, 16.66);
    }

    #[test]
    fn test_three_distinct_amounts_rejected() {
        let txs = vec![
            tx(1, date(2024, 1, 1), -10.00),
            tx(2, date(2024, 2, 1), -12.00),
            tx(3, date(2024, 3, 1), -14.00),
        ];
        assert!(classify_group(&group(&txs)).is_none());
    }

    #[test]
    fn test_sub_cent_noise_is_one_amount() {
        let txs = vec![
            tx(1, date(2024, 1, 1), -9.99),
            tx(2, date(2024, 1, 8), -9.990000001),
            tx(3, date(2024, 1, 15), -10.49),
        ];
        let candidate = classify_group(&group(&txs)).unwrap();
        assert_eq!(candidate.frequency, Frequency::Weekly);
    }

    #[test]
    fn test_same_day_members_are_weekly() {
        let day = date(2024, 5, 5);
        let txs = vec![tx(1, day, -5.0), tx(2, day, -5.0), tx(3, day, -5.0)];
        let candidate = classify_group(&group(&txs)).unwrap();
        // Zero average interval is still within the weekly bucket
        assert_eq!(candidate.frequency, Frequency::Weekly);
        assert_eq!(candidate.average_interval_days, Some(0.0));
    }

    #[test]
    fn test_no_intervals_is_unknown() {
        let txs = vec![tx(1, date(2024, 5, 5), -5.0)];
        let candidate = classify_group(&group(&txs)).unwrap();
        assert_eq!(candidate.frequency, Frequency::Unknown);
        assert_eq!(candidate.average_interval_days, None);
    }
}
