//! Cadence Core Library
//!
//! Recurring-transaction detection and batch export for multi-tenant
//! bank transaction data:
//! - Database access and migrations (SQLCipher)
//! - Recurring pattern detection (group, classify, project, sync)
//! - CSV transaction import with deduplication
//! - Batch export with bounded attachment fetching
//! - Object storage backends (HTTP, local filesystem)
//! - Locale-aware currency formatting
//! - Task runner with queue limits, timeouts and retries
//! - Engine configuration with embedded defaults

pub mod config;
pub mod currency;
pub mod db;
pub mod detect;
pub mod error;
pub mod export;
pub mod import;
pub mod models;
pub mod storage;
pub mod tasks;
pub mod trace;

/// Test utilities including mock object storage
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::EngineConfig;
pub use currency::{CurrencyFormatter, LocaleCurrencyFormatter};
pub use db::Database;
pub use detect::{detect_patterns, DetectionOutcome, Frequency, RecurringDetector};
pub use error::{Error, ErrorKind, Result};
pub use export::{AttachmentExportData, ExportOutput, ExportPipeline};
pub use import::{import_csv, parse_csv, ImportStats};
pub use storage::{HttpObjectStore, LocalObjectStore, ObjectLocation, ObjectStore};
pub use tasks::{
    DetectRecurringTask, Engine, ExportTransactionsTask, RetryPolicy, RunContext, Task,
    TaskCompletion, TaskRunner,
};
pub use trace::TraceContext;
