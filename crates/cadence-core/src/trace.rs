//! Explicit tracing context
//!
//! Operations receive a `TraceContext` instead of relying on whatever span
//! happens to be current. Each operation derives a child span carrying its
//! name and the entity it works on.

use tracing::{info_span, Span};

#[derive(Debug, Clone)]
pub struct TraceContext {
    span: Span,
}

impl TraceContext {
    /// Root context for one attempt of a task run
    pub fn for_run(task_id: &str, run_id: i64, attempt: u32) -> Self {
        Self {
            span: info_span!("task", task = task_id, run_id, attempt),
        }
    }

    /// Root context for work started outside the task runner
    pub fn detached(label: &str) -> Self {
        Self {
            span: info_span!("cadence", origin = label),
        }
    }

    /// Child context for one operation on one entity
    pub fn operation(&self, operation: &'static str, entity: &str) -> Self {
        Self {
            span: info_span!(parent: &self.span, "op", operation, entity),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Run synchronous work inside this context
    pub fn in_scope<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.span.in_scope(f)
    }
}
