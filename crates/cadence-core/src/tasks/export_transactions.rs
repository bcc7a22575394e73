//! `export-transactions` task

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{RunContext, Task, TaskOptions, Validate};
use crate::currency::is_valid_locale;
use crate::error::{Error, Result};
use crate::export::{ExportOutput, ExportPipeline};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportTransactionsPayload {
    pub ids: Vec<i64>,
    pub locale: String,
}

impl Validate for ExportTransactionsPayload {
    fn validate(&self) -> Result<()> {
        if !is_valid_locale(&self.locale) {
            return Err(Error::Validation(format!(
                "locale must look like \"en\" or \"en-US\", got {:?}",
                self.locale
            )));
        }
        if let Some(bad) = self.ids.iter().find(|id| **id <= 0) {
            return Err(Error::Validation(format!(
                "transaction ids must be positive, got {}",
                bad
            )));
        }
        Ok(())
    }
}

pub struct ExportTransactionsTask {
    pipeline: ExportPipeline,
    options: TaskOptions,
}

impl ExportTransactionsTask {
    pub const ID: &'static str = "export-transactions";

    pub fn new(pipeline: ExportPipeline, options: TaskOptions) -> Self {
        Self { pipeline, options }
    }
}

#[async_trait]
impl Task for ExportTransactionsTask {
    type Payload = ExportTransactionsPayload;
    type Output = ExportOutput;

    fn id(&self) -> &'static str {
        Self::ID
    }

    fn options(&self) -> TaskOptions {
        self.options.clone()
    }

    async fn run(&self, payload: &Self::Payload, ctx: &RunContext) -> Result<Self::Output> {
        self.pipeline
            .run(&payload.ids, &payload.locale, &ctx.trace)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, ExportConfig};
    use crate::currency::LocaleCurrencyFormatter;
    use crate::db::Database;
    use crate::tasks::{parse_payload, TaskRunner};
    use crate::test_utils::MemoryObjectStore;
    use std::sync::Arc;

    #[test]
    fn test_payload_validation() {
        assert!(parse_payload::<ExportTransactionsPayload>(
            serde_json::json!({"ids": [1, 2], "locale": "sv-SE"})
        )
        .is_ok());
        assert!(parse_payload::<ExportTransactionsPayload>(
            serde_json::json!({"ids": [], "locale": "en"})
        )
        .is_ok());

        for bad in [
            serde_json::json!({"ids": [1], "locale": "not a locale"}),
            serde_json::json!({"ids": [0], "locale": "en-US"}),
            serde_json::json!({"ids": "1,2", "locale": "en-US"}),
            serde_json::json!({"locale": "en-US"}),
        ] {
            assert!(matches!(
                parse_payload::<ExportTransactionsPayload>(bad),
                Err(Error::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_empty_export_through_runner() {
        let db = Database::in_memory().unwrap();
        let config = EngineConfig::default();
        let task = ExportTransactionsTask::new(
            ExportPipeline::new(
                db.clone(),
                Arc::new(MemoryObjectStore::new()),
                Arc::new(LocaleCurrencyFormatter),
                ExportConfig::default(),
            ),
            TaskOptions::new(config.tasks.export_transactions, config.retry),
        );

        let done = TaskRunner::new(db)
            .trigger(&task, serde_json::json!({"ids": [], "locale": "en-US"}))
            .await
            .unwrap();
        assert!(done.output.rows.is_empty());
        assert!(done.output.attachments.is_empty());
        assert_eq!(
            serde_json::to_value(&done.output).unwrap(),
            serde_json::json!({"rows": [], "attachments": []})
        );
    }
}
