//! Recurring-transaction pattern operations

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use super::{parse_date, parse_datetime, Database};
use crate::error::Result;
use crate::models::{DetectedPattern, NewDetectedPattern, PatternSource, PatternStatus};

const PATTERN_COLUMNS: &str = "id, account_id, merchant_name, frequency, average_amount, last_occurrence_date, next_projected_date, occurrence_count, confidence_score, source, status, created_at";

fn pattern_from_row(row: &Row<'_>) -> rusqlite::Result<DetectedPattern> {
    let frequency_str: String = row.get(3)?;
    let last_str: String = row.get(5)?;
    let next_str: String = row.get(6)?;
    let source_str: String = row.get(9)?;
    let status_str: String = row.get(10)?;
    let created_at_str: String = row.get(11)?;

    Ok(DetectedPattern {
        id: row.get(0)?,
        account_id: row.get(1)?,
        merchant_name: row.get(2)?,
        frequency: frequency_str
            .parse()
            .unwrap_or(crate::models::StoredFrequency::Unknown),
        average_amount: row.get(4)?,
        last_occurrence_date: parse_date(5, &last_str)?,
        next_projected_date: parse_date(6, &next_str)?,
        occurrence_count: row.get(7)?,
        confidence_score: row.get(8)?,
        source: source_str.parse().unwrap_or(PatternSource::Manual),
        status: match status_str.as_str() {
            "paused" => PatternStatus::Paused,
            _ => PatternStatus::Active,
        },
        created_at: parse_datetime(&created_at_str),
    })
}

fn insert_pattern(conn: &Connection, pattern: &NewDetectedPattern) -> rusqlite::Result<i64> {
    conn.execute(
        r#"
        INSERT INTO recurring_transactions
            (account_id, merchant_name, frequency, average_amount, last_occurrence_date,
             next_projected_date, occurrence_count, confidence_score, source, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            pattern.account_id,
            pattern.merchant_name,
            pattern.frequency.as_str(),
            pattern.average_amount,
            pattern.last_occurrence_date.to_string(),
            pattern.next_projected_date.to_string(),
            pattern.occurrence_count,
            pattern.confidence_score,
            pattern.source.as_str(),
            pattern.status.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Replace every `source = 'detected'` row of an account with `patterns`
    ///
    /// Delete and insert share one SQLite transaction, so a failed insert
    /// leaves the previous set in place. Rows from any other source are untouched.
    /// Returns (deleted, inserted).
    pub fn replace_detected_patterns(
        &self,
        account_id: i64,
        patterns: &[NewDetectedPattern],
    ) -> Result<(usize, usize)> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let deleted = tx.execute(
            "DELETE FROM recurring_transactions WHERE account_id = ? AND source = ?",
            params![account_id, PatternSource::Detected.as_str()],
        )?;

        for pattern in patterns {
            insert_pattern(&tx, pattern)?;
        }

        tx.commit()?;
        Ok((deleted, patterns.len()))
    }

    /// Insert a single pattern row (used for user-entered patterns)
    pub fn create_pattern(&self, pattern: &NewDetectedPattern) -> Result<i64> {
        let conn = self.conn()?;
        Ok(insert_pattern(&conn, pattern)?)
    }

    /// List patterns for an account, optionally restricted to one source
    pub fn list_patterns(
        &self,
        account_id: i64,
        source: Option<PatternSource>,
    ) -> Result<Vec<DetectedPattern>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM recurring_transactions
            WHERE account_id = ?1 AND (?2 IS NULL OR source = ?2)
            ORDER BY merchant_name, id
            "#,
            PATTERN_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let patterns = stmt
            .query_map(
                params![account_id, source.map(|s| s.as_str())],
                pattern_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(patterns)
    }

    /// Active patterns across all accounts projected on or before `until`
    pub fn list_upcoming_patterns(&self, until: NaiveDate) -> Result<Vec<DetectedPattern>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM recurring_transactions
            WHERE status = 'active' AND next_projected_date <= ?
            ORDER BY next_projected_date, id
            "#,
            PATTERN_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let patterns = stmt
            .query_map(params![until.to_string()], pattern_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(patterns)
    }
}
