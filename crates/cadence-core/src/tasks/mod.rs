//! Task runner
//!
//! Detection and export run as tasks. A task declares a typed payload, its
//! queue concurrency, a maximum duration and a retry policy; `TaskRunner`
//! enforces all of them and records every run in the `task_runs` table.

mod detect_recurring;
mod export_transactions;
mod retry;
mod runner;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

pub use detect_recurring::{DetectRecurringOutput, DetectRecurringPayload, DetectRecurringTask};
pub use export_transactions::{ExportTransactionsPayload, ExportTransactionsTask};
pub use retry::{RetryDecision, RetryPolicy};
pub use runner::{TaskCompletion, TaskRunner};

use crate::config::{EngineConfig, TaskLimits};
use crate::currency::LocaleCurrencyFormatter;
use crate::db::Database;
use crate::detect::RecurringDetector;
use crate::error::{Error, Result};
use crate::export::ExportPipeline;
use crate::storage::{store_from_config, ObjectStore};
use crate::trace::TraceContext;

/// Payload checks that go beyond deserialization
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskOptions {
    /// Runs of this task type allowed at once
    pub queue_concurrency: usize,
    /// Per-attempt wall-clock limit
    pub max_duration: Duration,
    pub retry: RetryPolicy,
}

impl TaskOptions {
    pub fn new(limits: TaskLimits, retry: RetryPolicy) -> Self {
        Self {
            queue_concurrency: limits.queue_concurrency,
            max_duration: limits.max_duration,
            retry,
        }
    }
}

/// Per-attempt context handed to `Task::run`
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: i64,
    /// 1-based
    pub attempt: u32,
    pub trace: TraceContext,
}

#[async_trait]
pub trait Task: Send + Sync {
    type Payload: DeserializeOwned + Serialize + Validate + Send + Sync;
    type Output: Serialize + Send;

    /// Stable identifier, also the queue name
    fn id(&self) -> &'static str;

    fn options(&self) -> TaskOptions;

    async fn run(&self, payload: &Self::Payload, ctx: &RunContext) -> Result<Self::Output>;

    /// Decide what follows a failed attempt
    fn handle_error(&self, error: &Error, attempt: u32) -> RetryDecision {
        self.options().retry.decide(error, attempt)
    }
}

/// Deserialize and validate a raw payload
pub fn parse_payload<P: DeserializeOwned + Validate>(raw: serde_json::Value) -> Result<P> {
    let payload: P =
        serde_json::from_value(raw).map_err(|e| Error::Validation(e.to_string()))?;
    payload.validate()?;
    Ok(payload)
}

/// Runner plus both tasks, wired from one config
pub struct Engine {
    pub runner: TaskRunner,
    pub detect: DetectRecurringTask,
    pub export: ExportTransactionsTask,
}

impl Engine {
    pub fn new(db: Database, config: &EngineConfig) -> Result<Self> {
        let store = store_from_config(&config.storage)?;
        Ok(Self::with_store(db, config, store))
    }

    pub fn with_store(db: Database, config: &EngineConfig, store: Arc<dyn ObjectStore>) -> Self {
        let detect = DetectRecurringTask::new(
            db.clone(),
            RecurringDetector::new(db.clone()),
            config.detection.default_lookback_days,
            TaskOptions::new(config.tasks.detect_recurring, config.retry.clone()),
        );
        let export = ExportTransactionsTask::new(
            ExportPipeline::new(
                db.clone(),
                store,
                Arc::new(LocaleCurrencyFormatter),
                config.export.clone(),
            ),
            TaskOptions::new(config.tasks.export_transactions, config.retry.clone()),
        );
        Self {
            runner: TaskRunner::new(db),
            detect,
            export,
        }
    }
}
