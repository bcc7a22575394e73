//! Transaction operations

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_date, parse_datetime, Database};
use crate::error::Result;
use crate::models::{NewTransaction, Transaction, TransactionStatus};

pub(crate) const TRANSACTION_COLUMNS: &str =
    "t.id, t.account_id, t.date, t.counterparty_name, t.amount, t.currency, t.status, t.category_id, t.note, t.created_at";

/// Map a row selected with `TRANSACTION_COLUMNS` starting at `offset`
pub(crate) fn transaction_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Transaction> {
    let date_str: String = row.get(offset + 2)?;
    let status_str: String = row.get(offset + 6)?;
    let created_at_str: String = row.get(offset + 9)?;

    Ok(Transaction {
        id: row.get(offset)?,
        account_id: row.get(offset + 1)?,
        date: parse_date(offset + 2, &date_str)?,
        counterparty_name: row.get(offset + 3)?,
        amount: row.get(offset + 4)?,
        currency: row.get(offset + 5)?,
        status: status_str.parse().unwrap_or(TransactionStatus::Pending),
        category_id: row.get(offset + 7)?,
        note: row.get(offset + 8)?,
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// Insert a transaction (skips duplicates of the account based on import_hash)
    pub fn insert_transaction(&self, account_id: i64, tx: &NewTransaction) -> Result<Option<i64>> {
        let conn = self.conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM transactions WHERE account_id = ? AND import_hash = ?",
                params![account_id, tx.import_hash],
                |row| row.get(0),
            )
            .optional()?;

        if existing.is_some() {
            return Ok(None); // Duplicate, skip
        }

        conn.execute(
            r#"
            INSERT INTO transactions (account_id, date, counterparty_name, amount, currency, status, category_id, note, import_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                account_id,
                tx.date.to_string(),
                tx.counterparty_name,
                tx.amount,
                tx.currency,
                tx.status.as_str(),
                tx.category_id,
                tx.note,
                tx.import_hash,
            ],
        )?;

        Ok(Some(conn.last_insert_rowid()))
    }

    /// Transactions for one account dated on/after `date_from`, oldest first
    pub fn list_transactions_since(
        &self,
        account_id: i64,
        date_from: NaiveDate,
        status: Option<TransactionStatus>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM transactions t
            WHERE t.account_id = ?1
              AND t.date >= ?2
              AND (?3 IS NULL OR t.status = ?3)
            ORDER BY t.date ASC, t.id ASC
            "#,
            TRANSACTION_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(
                params![account_id, date_from.to_string(), status.map(|s| s.as_str())],
                |row| transaction_from_row(row, 0),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Count transactions for an account
    pub fn count_transactions(&self, account_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE account_id = ?",
            params![account_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
