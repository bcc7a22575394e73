//! Executes tasks with queue limits, timeouts, retries and run logging

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{error, info, warn, Instrument};

use super::{parse_payload, RetryDecision, RunContext, Task};
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::RunStatus;
use crate::trace::TraceContext;

/// A run that finished successfully
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletion<O> {
    pub run_id: i64,
    pub attempts: u32,
    pub output: O,
}

pub struct TaskRunner {
    db: Database,
    queues: Mutex<HashMap<&'static str, Arc<Semaphore>>>,
}

impl TaskRunner {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Semaphore for a task type, sized on first use
    fn queue(&self, task_id: &'static str, concurrency: usize) -> Arc<Semaphore> {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        queues
            .entry(task_id)
            .or_insert_with(|| Arc::new(Semaphore::new(concurrency.max(1))))
            .clone()
    }

    /// Validate a raw JSON payload and run the task
    ///
    /// Invalid payloads fail with `Error::Validation` before a run is recorded.
    pub async fn trigger<T: Task>(
        &self,
        task: &T,
        raw: serde_json::Value,
    ) -> Result<TaskCompletion<T::Output>> {
        let payload: T::Payload = match parse_payload(raw) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(task = task.id(), error = %e, "Rejected task payload");
                return Err(e);
            }
        };
        self.run_validated(task, payload).await
    }

    /// Run an already-validated payload to completion or final failure
    pub async fn run_validated<T: Task>(
        &self,
        task: &T,
        payload: T::Payload,
    ) -> Result<TaskCompletion<T::Output>> {
        let task_id = task.id();
        let options = task.options();
        let run_id = self
            .db
            .create_task_run(task_id, &serde_json::to_value(&payload)?)?;
        let queue = self.queue(task_id, options.queue_concurrency);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let permit = queue
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| Error::ResourceExhausted(format!("{} queue closed", task_id)))?;

            if let Err(e) = self.db.mark_run_attempt(run_id, attempt) {
                warn!(run_id, error = %e, "Failed to record run attempt");
            }

            let ctx = RunContext {
                run_id,
                attempt,
                trace: TraceContext::for_run(task_id, run_id, attempt),
            };
            let span = ctx.trace.span().clone();

            let result =
                match tokio::time::timeout(options.max_duration, task.run(&payload, &ctx))
                    .instrument(span)
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(Error::Timeout {
                        operation: task_id.to_string(),
                        seconds: options.max_duration.as_secs(),
                    }),
                };
            drop(permit);

            match result {
                Ok(output) => {
                    if let Err(e) = self.db.finish_task_run(run_id, RunStatus::Completed, None) {
                        warn!(run_id, error = %e, "Failed to record run completion");
                    }
                    info!(task = task_id, run_id, attempt, "Task completed");
                    return Ok(TaskCompletion {
                        run_id,
                        attempts: attempt,
                        output,
                    });
                }
                Err(e) => match task.handle_error(&e, attempt) {
                    RetryDecision::RetryAfter(delay) => {
                        warn!(
                            task = task_id,
                            run_id,
                            attempt,
                            kind = ?e.kind(),
                            retry_in_ms = delay.as_millis() as u64,
                            error = %e,
                            "Task attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::Abort => {
                        error!(
                            task = task_id,
                            run_id,
                            attempt,
                            kind = ?e.kind(),
                            error = %e,
                            "Task failed"
                        );
                        let message = e.to_string();
                        if let Err(log_err) =
                            self.db
                                .finish_task_run(run_id, RunStatus::Failed, Some(&message))
                        {
                            warn!(run_id, error = %log_err, "Failed to record run failure");
                        }
                        return Err(e);
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{RetryPolicy, TaskOptions, Validate};
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize)]
    struct Echo {
        value: String,
    }

    impl Validate for Echo {
        fn validate(&self) -> Result<()> {
            if self.value.is_empty() {
                return Err(Error::Validation("value must not be empty".into()));
            }
            Ok(())
        }
    }

    /// Fails with `failure` for the first `fail_times` attempts
    struct Flaky {
        calls: AtomicUsize,
        fail_times: usize,
        failure: fn() -> Error,
        delay: Duration,
        concurrency: usize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl Flaky {
        fn new(fail_times: usize, failure: fn() -> Error) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_times,
                failure,
                delay: Duration::ZERO,
                concurrency: 4,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Task for Flaky {
        type Payload = Echo;
        type Output = String;

        fn id(&self) -> &'static str {
            "flaky"
        }

        fn options(&self) -> TaskOptions {
            TaskOptions {
                queue_concurrency: self.concurrency,
                max_duration: Duration::from_millis(500),
                retry: RetryPolicy {
                    min_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(5),
                    transient_delay: Duration::from_millis(1),
                    ..RetryPolicy::default()
                },
            }
        }

        async fn run(&self, payload: &Echo, ctx: &RunContext) -> Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_times {
                return Err((self.failure)());
            }
            Ok(format!("{}#{}", payload.value, ctx.attempt))
        }
    }

    fn payload() -> serde_json::Value {
        serde_json::json!({"value": "hi"})
    }

    #[tokio::test]
    async fn test_retries_then_completes() {
        let db = Database::in_memory().unwrap();
        let runner = TaskRunner::new(db.clone());
        let task = Flaky::new(2, || Error::InvalidData("flaky".into()));

        let done = runner.trigger(&task, payload()).await.unwrap();
        assert_eq!(done.output, "hi#3");
        assert_eq!(done.attempts, 3);

        let run = db.get_task_run(done.run_id).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.attempts, 3);
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_without_retry() {
        let db = Database::in_memory().unwrap();
        let runner = TaskRunner::new(db.clone());
        let task = Flaky::new(5, || Error::NotFound("account 9".into()));

        let err = runner.trigger(&task, payload()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(task.calls.load(Ordering::SeqCst), 1);

        let runs = db.list_task_runs(Some("flaky"), 10).unwrap();
        assert_eq!(runs[0].status, RunStatus::Failed);
        assert!(runs[0].error.as_deref().unwrap().contains("account 9"));
    }

    #[tokio::test]
    async fn test_transient_error_exhausts_attempts() {
        let db = Database::in_memory().unwrap();
        let runner = TaskRunner::new(db.clone());
        let task = Flaky::new(10, || Error::StorageConnection("reset".into()));

        assert!(runner.trigger(&task, payload()).await.is_err());
        assert_eq!(task.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalid_payload_never_runs() {
        let db = Database::in_memory().unwrap();
        let runner = TaskRunner::new(db.clone());
        let task = Flaky::new(0, || Error::InvalidData("unused".into()));

        let err = runner
            .trigger(&task, serde_json::json!({"value": ""}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(task.calls.load(Ordering::SeqCst), 0);
        assert!(db.list_task_runs(None, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_a_failed_attempt() {
        let db = Database::in_memory().unwrap();
        let runner = TaskRunner::new(db.clone());
        let mut task = Flaky::new(0, || Error::InvalidData("unused".into()));
        task.delay = Duration::from_secs(5);

        let err = runner.trigger(&task, payload()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        let runs = db.list_task_runs(Some("flaky"), 1).unwrap();
        assert_eq!(runs[0].attempts, 3);
        assert_eq!(runs[0].status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_queue_concurrency_enforced() {
        let db = Database::in_memory().unwrap();
        let runner = Arc::new(TaskRunner::new(db));
        let mut task = Flaky::new(0, || Error::InvalidData("unused".into()));
        task.delay = Duration::from_millis(20);
        task.concurrency = 2;
        let task = Arc::new(task);

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let runner = runner.clone();
                let task = task.clone();
                tokio::spawn(async move { runner.trigger(task.as_ref(), payload()).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(task.max_in_flight.load(Ordering::SeqCst), 2);
    }
}
