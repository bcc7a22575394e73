//! Domain models for Cadence

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A bank account owned by a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// ISO 4217 code of the account's native currency
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Transaction lifecycle status as reported by the bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Posted,
    Pending,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posted => "posted",
            Self::Pending => "pending",
        }
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "posted" => Ok(Self::Posted),
            "pending" => Ok(Self::Pending),
            _ => Err(format!("Unknown transaction status: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable financial event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    pub date: NaiveDate,
    /// Merchant or payer name; the grouping key for detection
    pub counterparty_name: String,
    /// Signed amount (negative = money out)
    pub amount: f64,
    pub currency: String,
    pub status: TransactionStatus,
    pub category_id: Option<i64>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A transaction to be inserted
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub counterparty_name: String,
    pub amount: f64,
    pub currency: String,
    pub status: TransactionStatus,
    pub category_id: Option<i64>,
    pub note: Option<String>,
    /// Hash for deduplication across repeated imports
    pub import_hash: String,
}

/// Spending category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Attachment metadata (the bytes live in object storage)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub transaction_id: i64,
    /// Original upload file name
    pub name: String,
    /// Direct URL or relative path of the object
    pub path: Option<String>,
    /// Storage key used when the path cannot be fetched
    pub file_key: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<i64>,
}

/// An attachment to be inserted
#[derive(Debug, Clone, Default)]
pub struct NewAttachment {
    pub name: String,
    pub path: Option<String>,
    pub file_key: Option<String>,
    pub content_type: Option<String>,
    pub size: Option<i64>,
}

/// A transaction joined with everything the export needs
#[derive(Debug, Clone)]
pub struct TransactionWithRelations {
    pub transaction: Transaction,
    pub category: Option<Category>,
    pub account: Account,
    pub attachments: Vec<Attachment>,
}

/// Frequency as stored on a recurring-transaction row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoredFrequency {
    Weekly,
    Biweekly,
    Monthly,
    Irregular,
    Annually,
    Unknown,
}

impl StoredFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "WEEKLY",
            Self::Biweekly => "BIWEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Irregular => "IRREGULAR",
            Self::Annually => "ANNUALLY",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::str::FromStr for StoredFrequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "WEEKLY" => Ok(Self::Weekly),
            "BIWEEKLY" => Ok(Self::Biweekly),
            "MONTHLY" => Ok(Self::Monthly),
            "IRREGULAR" => Ok(Self::Irregular),
            "ANNUALLY" => Ok(Self::Annually),
            "UNKNOWN" => Ok(Self::Unknown),
            _ => Err(format!("Unknown frequency: {}", s)),
        }
    }
}

impl std::fmt::Display for StoredFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who created a recurring-transaction row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSource {
    /// Inferred by the detector; replaced wholesale on every run
    Detected,
    /// Entered by the user; never touched by detection
    Manual,
}

impl PatternSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detected => "detected",
            Self::Manual => "manual",
        }
    }
}

impl std::str::FromStr for PatternSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "detected" => Ok(Self::Detected),
            "manual" => Ok(Self::Manual),
            _ => Err(format!("Unknown pattern source: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternStatus {
    Active,
    Paused,
}

impl PatternStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
        }
    }
}

/// A persisted recurring-transaction pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub id: i64,
    pub account_id: i64,
    pub merchant_name: String,
    pub frequency: StoredFrequency,
    pub average_amount: f64,
    pub last_occurrence_date: NaiveDate,
    pub next_projected_date: NaiveDate,
    pub occurrence_count: i64,
    pub confidence_score: f64,
    pub source: PatternSource,
    pub status: PatternStatus,
    pub created_at: DateTime<Utc>,
}

/// A pattern to be inserted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDetectedPattern {
    pub account_id: i64,
    pub merchant_name: String,
    pub frequency: StoredFrequency,
    pub average_amount: f64,
    pub last_occurrence_date: NaiveDate,
    pub next_projected_date: NaiveDate,
    pub occurrence_count: i64,
    pub confidence_score: f64,
    pub source: PatternSource,
    pub status: PatternStatus,
}

/// Task run lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown run status: {}", s)),
        }
    }
}

/// One execution of a task, recorded in the run log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRun {
    pub id: i64,
    pub task_id: String,
    pub payload: serde_json::Value,
    pub status: RunStatus,
    pub attempts: i64,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
