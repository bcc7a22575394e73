//! Merchant grouper

use std::collections::HashMap;

use crate::models::Transaction;

/// Fewer occurrences than this cannot establish recurrence
pub const MIN_GROUP_SIZE: usize = 3;

/// Transactions sharing one exact counterparty name
#[derive(Debug, Clone)]
pub struct CandidateGroup<'a> {
    pub merchant_name: &'a str,
    pub transactions: Vec<&'a Transaction>,
}

impl CandidateGroup<'_> {
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Partition transactions by exact counterparty name
///
/// Groups smaller than `MIN_GROUP_SIZE` are dropped. Groups come out in the
/// order their merchant first appears in the input, members keep input order.
pub fn group_by_merchant(transactions: &[Transaction]) -> Vec<CandidateGroup<'_>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<CandidateGroup<'_>> = Vec::new();

    for tx in transactions {
        let name = tx.counterparty_name.as_str();
        match index.get(name) {
            Some(&i) => groups[i].transactions.push(tx),
            None => {
                index.insert(name, groups.len());
                groups.push(CandidateGroup {
                    merchant_name: name,
                    transactions: vec![tx],
                });
            }
        }
    }

    groups.retain(|g| g.len() >= MIN_GROUP_SIZE);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionStatus;
    use chrono::{NaiveDate, Utc};

    fn tx(id: i64, name: &str) -> Transaction {
        Transaction {
            id,
            account_id: 1,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(id),
            counterparty_name: name.to_string(),
            amount: -10.0,
            currency: "USD".to_string(),
            status: TransactionStatus::Posted,
            category_id: None,
            note: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_small_groups_dropped() {
        let txs = vec![
            tx(1, "Netflix"),
            tx(2, "Spotify"),
            tx(3, "Netflix"),
            tx(4, "Spotify"),
            tx(5, "Netflix"),
            tx(6, "Gym"),
        ];
        let groups = group_by_merchant(&txs);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].merchant_name, "Netflix");
        let ids: Vec<_> = groups[0].transactions.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn test_exact_match_only() {
        let txs = vec![
            tx(1, "NETFLIX"),
            tx(2, "Netflix"),
            tx(3, "Netflix "),
            tx(4, "NETFLIX"),
        ];
        assert!(group_by_merchant(&txs).is_empty());
    }

    #[test]
    fn test_deterministic_order() {
        let mut txs = Vec::new();
        for i in 0..3 {
            txs.push(tx(i * 3 + 1, "B"));
            txs.push(tx(i * 3 + 2, "A"));
            txs.push(tx(i * 3 + 3, "C"));
        }
        let first: Vec<_> = group_by_merchant(&txs)
            .iter()
            .map(|g| g.merchant_name)
            .collect();
        let second: Vec<_> = group_by_merchant(&txs)
            .iter()
            .map(|g| g.merchant_name)
            .collect();
        assert_eq!(first, vec!["B", "A", "C"]);
        assert_eq!(first, second);
    }
}
