//! CSV transaction import
//!
//! Columns are found by header name (case-insensitive):
//! - `date` (required)
//! - `counterparty` / `description` / `merchant` / `name` (required)
//! - `amount` (required, negative = money out)
//! - `currency`, `status`, `category`, `note`, `reference` (optional)
//!
//! Rows are deduplicated on a hash of date, counterparty, amount and
//! reference, so re-importing the same file is a no-op.

use std::io::Read;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{NewTransaction, TransactionStatus};

/// A parsed row plus its category name (resolved at insert time)
#[derive(Debug, Clone)]
pub struct ImportedRow {
    pub transaction: NewTransaction,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub parsed: usize,
    pub imported: usize,
    pub duplicates: usize,
}

struct Columns {
    date: usize,
    counterparty: usize,
    amount: usize,
    currency: Option<usize>,
    status: Option<usize>,
    category: Option<usize>,
    note: Option<usize>,
    reference: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
        };
        let required = |names: &[&str]| {
            find(names).ok_or_else(|| {
                Error::Validation(format!("CSV is missing a {} column", names[0]))
            })
        };

        Ok(Self {
            date: required(&["date", "transaction date"])?,
            counterparty: required(&["counterparty", "description", "merchant", "name"])?,
            amount: required(&["amount"])?,
            currency: find(&["currency"]),
            status: find(&["status"]),
            category: find(&["category"]),
            note: find(&["note", "memo"]),
            reference: find(&["reference", "id"]),
        })
    }
}

fn optional(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse CSV rows; `default_currency` fills rows without a currency column
pub fn parse_csv<R: Read>(reader: R, default_currency: &str) -> Result<Vec<ImportedRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns = Columns::from_headers(rdr.headers()?)?;
    let mut rows = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        let at = |what: &str| Error::InvalidData(format!("Row {}: missing {}", line + 1, what));

        let date = parse_date(record.get(columns.date).ok_or_else(|| at("date"))?)?;
        let counterparty_name = record
            .get(columns.counterparty)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| at("counterparty"))?
            .to_string();
        let amount = parse_amount(record.get(columns.amount).ok_or_else(|| at("amount"))?)?;

        let status = match optional(&record, columns.status) {
            Some(s) => s.parse::<TransactionStatus>().map_err(Error::InvalidData)?,
            None => TransactionStatus::Posted,
        };
        let currency = optional(&record, columns.currency)
            .unwrap_or_else(|| default_currency.to_string())
            .to_uppercase();
        let reference = optional(&record, columns.reference);

        rows.push(ImportedRow {
            transaction: NewTransaction {
                import_hash: generate_hash(&date, &counterparty_name, amount, reference.as_deref()),
                date,
                counterparty_name,
                amount,
                currency,
                status,
                category_id: None,
                note: optional(&record, columns.note),
            },
            category: optional(&record, columns.category),
        });
    }

    debug!("Parsed {} transactions", rows.len());
    Ok(rows)
}

/// Parse and insert into an account, creating categories as needed
pub fn import_csv<R: Read>(db: &Database, account_id: i64, reader: R) -> Result<ImportStats> {
    let account = db
        .get_account(account_id)?
        .ok_or_else(|| Error::NotFound(format!("bank account {}", account_id)))?;

    let rows = parse_csv(reader, &account.currency)?;
    let mut stats = ImportStats {
        parsed: rows.len(),
        ..Default::default()
    };

    for row in rows {
        let mut tx = row.transaction;
        if let Some(name) = row.category {
            tx.category_id = Some(db.upsert_category(&name, &slugify(&name))?);
        }
        match db.insert_transaction(account_id, &tx)? {
            Some(_) => stats.imported += 1,
            None => stats.duplicates += 1,
        }
    }

    Ok(stats)
}

fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn generate_hash(
    date: &NaiveDate,
    counterparty: &str,
    amount: f64,
    reference: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(date.to_string().as_bytes());
    hasher.update(counterparty.as_bytes());
    hasher.update(amount.to_be_bytes());
    // Distinguishes same-day identical charges when the bank provides an id
    if let Some(reference) = reference {
        hasher.update(reference.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Parse a date string in various common formats
fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    let formats = [
        "%Y-%m-%d", // 2024-01-15
        "%m/%d/%Y", // 01/15/2024
        "%m/%d/%y", // 01/15/24
        "%d.%m.%Y", // 15.01.2024
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    Err(Error::InvalidData(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string, handling currency symbols and both
/// `1,234.56` and `1.234,56` separator styles
fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', '€', '£', ' ', '\u{a0}', '\''], "")
        .replace('(', "-")
        .replace(')', "");

    let normalized = normalize_separators(&cleaned).ok_or_else(|| {
        Error::Validation(format!("Ambiguous decimal separator in amount: {}", s))
    })?;

    normalized
        .parse::<f64>()
        .map_err(|_| Error::InvalidData(format!("Unable to parse amount: {}", s)))
}

/// Rewrite to a `.` decimal point with no grouping
///
/// When both separators appear the last one is the decimal point. A lone
/// comma followed by one or two digits is a decimal comma; followed by three
/// digits it groups thousands. Returns `None` when the grouping is malformed.
fn normalize_separators(s: &str) -> Option<String> {
    let decimal = match (s.rfind(','), s.rfind('.')) {
        (Some(c), Some(d)) => Some(if c > d { ',' } else { '.' }),
        (Some(_), None) => {
            let groups: Vec<&str> = s.split(',').collect();
            let tail = groups[groups.len() - 1];
            if groups.len() == 2 && (1..=2).contains(&tail.len()) {
                Some(',')
            } else {
                None
            }
        }
        (None, Some(_)) if s.matches('.').count() == 1 => Some('.'),
        (None, Some(_)) => None,
        (None, None) => return Some(s.to_string()),
    };
    let grouping = match decimal {
        Some(',') => '.',
        Some(_) => ',',
        None if s.contains(',') => ',',
        None => '.',
    };

    let (int_part, frac_part) = match decimal {
        Some(sep) => {
            let (int_part, frac) = s.rsplit_once(sep)?;
            if frac.contains(grouping) {
                return None;
            }
            (int_part, Some(frac))
        }
        None => (s, None),
    };

    if int_part.contains(grouping) {
        let digits = int_part.trim_start_matches('-');
        let mut groups = digits.split(grouping);
        let lead = groups.next()?;
        if lead.is_empty() || lead.len() > 3 || !groups.all(|g| g.len() == 3) {
            return None;
        }
    }

    let mut out = int_part.replace(grouping, "");
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    Some(out)
}
