//! Attachment processing for exports
//!
//! Fetches run in fixed-size batches. Inside a batch every fetch runs at
//! once and is raced against a timeout; a failed or slow fetch only nulls
//! that one blob.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use tracing::{debug, warn, Instrument};

use crate::error::{Error, Result};
use crate::models::{Attachment, TransactionWithRelations};
use crate::storage::{ObjectLocation, ObjectStore};
use crate::trace::TraceContext;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// One attachment as it appears in export output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentExportData {
    pub id: i64,
    pub transaction_id: i64,
    /// Name the file gets inside the export
    pub file_name: String,
    pub original_name: String,
    pub content_type: String,
    /// `None` when the bytes could not be fetched
    #[serde(with = "base64_blob")]
    pub blob: Option<Vec<u8>>,
    /// SHA-256 of `blob`, hex
    pub checksum: Option<String>,
}

mod base64_blob {
    use super::*;

    pub fn serialize<S: Serializer>(
        blob: &Option<Vec<u8>>,
        s: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match blob {
            Some(bytes) => s.serialize_some(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> std::result::Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|e| STANDARD.decode(e).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Outcome of processing every attachment of an export
#[derive(Debug, Clone, Default)]
pub struct AttachmentBatchReport {
    pub attachments: Vec<AttachmentExportData>,
    pub batches: usize,
    pub failed: usize,
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type.split(';').next().unwrap_or("").trim() {
        "application/pdf" => Some("pdf"),
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "text/plain" => Some("txt"),
        "text/csv" => Some("csv"),
        _ => None,
    }
}

fn content_type_for(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "txt" => "text/plain",
        "csv" => "text/csv",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

fn original_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase())
}

/// `{date}-{transactionId}_{n}.{ext}`, `n` 1-based within the transaction
pub fn export_file_name(
    date: NaiveDate,
    transaction_id: i64,
    index: usize,
    attachment: &Attachment,
) -> String {
    let ext = original_extension(&attachment.name)
        .or_else(|| {
            attachment
                .content_type
                .as_deref()
                .and_then(extension_for)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "bin".to_string());
    format!(
        "{}-{}_{}.{}",
        date.format("%Y-%m-%d"),
        transaction_id,
        index,
        ext
    )
}

/// One attachment queued for fetching
#[derive(Debug, Clone)]
struct PendingAttachment<'a> {
    attachment: &'a Attachment,
    file_name: String,
}

fn pending_for(records: &[TransactionWithRelations]) -> Vec<PendingAttachment<'_>> {
    records
        .iter()
        .flat_map(|record| {
            record
                .attachments
                .iter()
                .enumerate()
                .map(move |(i, attachment)| PendingAttachment {
                    attachment,
                    file_name: export_file_name(
                        record.transaction.date,
                        record.transaction.id,
                        i + 1,
                        attachment,
                    ),
                })
        })
        .collect()
}

async fn fetch_one(
    store: &dyn ObjectStore,
    attachment: &Attachment,
    fetch_timeout: Duration,
) -> Result<Vec<u8>> {
    let location = ObjectLocation::from(attachment);
    match tokio::time::timeout(fetch_timeout, store.fetch(&location)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            operation: "fetch_attachment".to_string(),
            seconds: fetch_timeout.as_secs(),
        }),
    }
}

fn to_export_data(pending: &PendingAttachment<'_>, blob: Option<Vec<u8>>) -> AttachmentExportData {
    let attachment = pending.attachment;
    let content_type = attachment.content_type.clone().unwrap_or_else(|| {
        original_extension(&attachment.name)
            .map(|e| content_type_for(&e))
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string()
    });
    let checksum = blob
        .as_ref()
        .map(|bytes| hex::encode(Sha256::digest(bytes)));

    AttachmentExportData {
        id: attachment.id,
        transaction_id: attachment.transaction_id,
        file_name: pending.file_name.clone(),
        original_name: attachment.name.clone(),
        content_type,
        blob,
        checksum,
    }
}

/// Fetch every attachment of `records` in batches of `batch_size`
///
/// Output order follows the records, then attachment order within each.
pub async fn process_attachments(
    store: Arc<dyn ObjectStore>,
    records: &[TransactionWithRelations],
    batch_size: usize,
    fetch_timeout: Duration,
    trace: &TraceContext,
) -> AttachmentBatchReport {
    let pending = pending_for(records);
    let mut report = AttachmentBatchReport::default();

    for (batch_index, batch) in pending.chunks(batch_size.max(1)).enumerate() {
        report.batches += 1;
        let span = trace
            .operation("fetch_attachment_batch", &batch_index.to_string())
            .span()
            .clone();

        let results = join_all(
            batch
                .iter()
                .map(|p| fetch_one(store.as_ref(), p.attachment, fetch_timeout)),
        )
        .instrument(span)
        .await;

        for (item, result) in batch.iter().zip(results) {
            let blob = match result {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    report.failed += 1;
                    let e = e.context("fetch_attachment", item.attachment.id.to_string());
                    warn!(
                        attachment_id = item.attachment.id,
                        transaction_id = item.attachment.transaction_id,
                        store = store.name(),
                        error = %e,
                        "Attachment fetch failed, exporting without blob"
                    );
                    None
                }
            };
            report.attachments.push(to_export_data(item, blob));
        }

        debug!(
            batch = batch_index,
            size = batch.len(),
            "Processed attachment batch"
        );
    }

    report
}
