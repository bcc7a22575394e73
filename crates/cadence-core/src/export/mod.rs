//! Batch export of transactions with attachments
//!
//! Pipeline stages:
//! 1. Load the requested transactions with category, account and attachment
//!    metadata (a failure here fails the export)
//! 2. Fetch attachment bytes in bounded batches (failures null single blobs)
//! 3. Sort by date and format one row per transaction
//!
//! Requested ids that do not exist are skipped.

pub mod attachments;
pub mod rows;

use std::io::Write;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

pub use attachments::{
    export_file_name, process_attachments, AttachmentBatchReport, AttachmentExportData,
};
pub use rows::{format_rows, EXPORT_COLUMNS};

use crate::config::ExportConfig;
use crate::currency::CurrencyFormatter;
use crate::db::Database;
use crate::error::Result;
use crate::storage::ObjectStore;
use crate::trace::TraceContext;

/// Rows plus attachment payloads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOutput {
    pub rows: Vec<Vec<String>>,
    pub attachments: Vec<AttachmentExportData>,
}

impl ExportOutput {
    /// Attachments whose bytes could not be fetched
    pub fn missing_blobs(&self) -> usize {
        self.attachments.iter().filter(|a| a.blob.is_none()).count()
    }
}

/// Write the header and rows as CSV
pub fn write_csv<W: Write>(output: &ExportOutput, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(EXPORT_COLUMNS)?;
    for row in &output.rows {
        csv.write_record(row)?;
    }
    csv.flush()?;
    Ok(())
}

pub struct ExportPipeline {
    db: Database,
    store: Arc<dyn ObjectStore>,
    formatter: Arc<dyn CurrencyFormatter>,
    config: ExportConfig,
}

impl ExportPipeline {
    pub fn new(
        db: Database,
        store: Arc<dyn ObjectStore>,
        formatter: Arc<dyn CurrencyFormatter>,
        config: ExportConfig,
    ) -> Self {
        Self {
            db,
            store,
            formatter,
            config,
        }
    }

    pub async fn run(
        &self,
        ids: &[i64],
        locale: &str,
        trace: &TraceContext,
    ) -> Result<ExportOutput> {
        if ids.is_empty() {
            return Ok(ExportOutput::default());
        }

        let mut records = trace
            .operation("load_transactions", &format!("{} ids", ids.len()))
            .in_scope(|| self.db.get_transactions_with_relations(ids))
            .map_err(|e| e.context("load_transactions", format!("{:?}", ids)))?;
        records.sort_by_key(|r| (r.transaction.date, r.transaction.id));

        let report = process_attachments(
            self.store.clone(),
            &records,
            self.config.attachment_batch_size,
            self.config.fetch_timeout,
            trace,
        )
        .await;

        let rows = format_rows(&records, &report.attachments, self.formatter.as_ref(), locale);

        info!(
            requested = ids.len(),
            rows = rows.len(),
            attachments = report.attachments.len(),
            batches = report.batches,
            failed = report.failed,
            "Export complete"
        );

        Ok(ExportOutput {
            rows,
            attachments: report.attachments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::LocaleCurrencyFormatter;
    use crate::models::{NewAttachment, NewTransaction, TransactionStatus};
    use crate::test_utils::MemoryObjectStore;
    use chrono::{Duration as Days, NaiveDate};
    use std::time::Duration;

    fn pipeline(db: &Database, store: Arc<MemoryObjectStore>) -> ExportPipeline {
        ExportPipeline::new(
            db.clone(),
            store,
            Arc::new(LocaleCurrencyFormatter),
            ExportConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_empty_ids() {
        let db = Database::in_memory().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        let output = pipeline(&db, store.clone())
            .run(&[], "en-US", &TraceContext::detached("test"))
            .await
            .unwrap();
        assert_eq!(output, ExportOutput::default());
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_rows_sorted_by_date_and_missing_ids_skipped() {
        let db = Database::in_memory().unwrap();
        let account = db.create_account(1, "Checking", "USD").unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut ids = Vec::new();
        for (offset, name) in [(5, "Later"), (1, "Earlier"), (3, "Middle")] {
            let id = db
                .insert_transaction(
                    account,
                    &NewTransaction {
                        date: start + Days::days(offset),
                        counterparty_name: name.to_string(),
                        amount: -10.0,
                        currency: "USD".to_string(),
                        status: TransactionStatus::Posted,
                        category_id: None,
                        note: None,
                        import_hash: name.to_string(),
                    },
                )
                .unwrap()
                .unwrap();
            ids.push(id);
        }
        ids.push(9999);

        let store = Arc::new(MemoryObjectStore::new());
        let output = pipeline(&db, store)
            .run(&ids, "en-US", &TraceContext::detached("test"))
            .await
            .unwrap();
        let names: Vec<_> = output.rows.iter().map(|r| r[2].as_str()).collect();
        assert_eq!(names, vec!["Earlier", "Middle", "Later"]);
        assert_eq!(output.rows[0][5], "-$10.00");
    }

    #[tokio::test]
    async fn test_attachment_blobs_attached() {
        let db = Database::in_memory().unwrap();
        let account = db.create_account(1, "Checking", "USD").unwrap();
        let tx = db
            .insert_transaction(
                account,
                &NewTransaction {
                    date: NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
                    counterparty_name: "Hotel".to_string(),
                    amount: -210.0,
                    currency: "USD".to_string(),
                    status: TransactionStatus::Posted,
                    category_id: None,
                    note: None,
                    import_hash: "hotel".to_string(),
                },
            )
            .unwrap()
            .unwrap();
        db.insert_attachment(
            tx,
            &NewAttachment {
                name: "folio.pdf".to_string(),
                file_key: Some("vault/folio.pdf".to_string()),
                content_type: Some("application/pdf".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let store = Arc::new(MemoryObjectStore::with_delay(Duration::from_millis(1)));
        store.put("vault/folio.pdf", b"%PDF".to_vec());
        let output = pipeline(&db, store)
            .run(&[tx], "en-US", &TraceContext::detached("test"))
            .await
            .unwrap();

        assert_eq!(output.attachments.len(), 1);
        assert_eq!(output.missing_blobs(), 0);
        let expected = format!("2024-03-03-{}_1.pdf", tx);
        assert_eq!(output.attachments[0].file_name, expected);
        assert_eq!(output.rows[0][9], expected);

        let mut csv_bytes = Vec::new();
        write_csv(&output, &mut csv_bytes).unwrap();
        let text = String::from_utf8(csv_bytes).unwrap();
        assert!(text.starts_with("ID,Date,Description,Amount,Currency,Formatted amount,"));
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_forty_five_transactions_in_three_batches() {
        let db = Database::in_memory().unwrap();
        let account = db.create_account(1, "Checking", "USD").unwrap();
        let store = Arc::new(MemoryObjectStore::with_delay(Duration::from_millis(10)));
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let mut ids = Vec::new();
        for i in 0..45 {
            let id = db
                .insert_transaction(
                    account,
                    &NewTransaction {
                        date: start + Days::days(i),
                        counterparty_name: format!("Vendor {}", i),
                        amount: -(i as f64) - 1.0,
                        currency: "USD".to_string(),
                        status: TransactionStatus::Posted,
                        category_id: None,
                        note: None,
                        import_hash: format!("tx-{}", i),
                    },
                )
                .unwrap()
                .unwrap();
            let key = format!("vault/{}.png", i);
            db.insert_attachment(
                id,
                &NewAttachment {
                    name: format!("receipt-{}.png", i),
                    file_key: Some(key.clone()),
                    content_type: Some("image/png".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
            // One object is missing from storage
            if i != 17 {
                store.put(&key, vec![i as u8]);
            }
            ids.push(id);
        }

        let records = db.get_transactions_with_relations(&ids).unwrap();
        let report = process_attachments(
            store.clone(),
            &records,
            20,
            Duration::from_secs(5),
            &TraceContext::detached("test"),
        )
        .await;
        assert_eq!(report.batches, 3);
        assert_eq!(report.failed, 1);
        assert!(store.max_in_flight() <= 20);
        assert!(store.max_in_flight() > 1);

        let output = pipeline(&db, store.clone())
            .run(&ids, "en-US", &TraceContext::detached("test"))
            .await
            .unwrap();
        assert_eq!(output.rows.len(), 45);
        assert_eq!(output.attachments.len(), 45);
        assert_eq!(output.missing_blobs(), 1);
        let missing = output
            .attachments
            .iter()
            .find(|a| a.blob.is_none())
            .unwrap();
        assert_eq!(missing.original_name, "receipt-17.png");
        assert!(store.max_in_flight() <= 20);
    }
}
