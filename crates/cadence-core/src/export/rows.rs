//! Row formatting

use std::collections::HashMap;

use super::attachments::AttachmentExportData;
use crate::currency::CurrencyFormatter;
use crate::models::TransactionWithRelations;

/// Header of every export, in column order
pub const EXPORT_COLUMNS: [&str; 11] = [
    "ID",
    "Date",
    "Description",
    "Amount",
    "Currency",
    "Formatted amount",
    "Category",
    "Account",
    "Status",
    "Attachments",
    "Note",
];

/// Export file names grouped by transaction id
pub fn file_names_by_transaction(
    attachments: &[AttachmentExportData],
) -> HashMap<i64, Vec<&str>> {
    let mut names: HashMap<i64, Vec<&str>> = HashMap::new();
    for a in attachments {
        names
            .entry(a.transaction_id)
            .or_default()
            .push(a.file_name.as_str());
    }
    names
}

/// One row per record, in the order given
pub fn format_rows(
    records: &[TransactionWithRelations],
    attachments: &[AttachmentExportData],
    formatter: &dyn CurrencyFormatter,
    locale: &str,
) -> Vec<Vec<String>> {
    let names = file_names_by_transaction(attachments);

    records
        .iter()
        .map(|record| {
            let tx = &record.transaction;
            vec![
                tx.id.to_string(),
                tx.date.format("%Y-%m-%d").to_string(),
                tx.counterparty_name.clone(),
                format!("{:.2}", tx.amount),
                tx.currency.clone(),
                formatter.format(tx.amount, &tx.currency, locale),
                record
                    .category
                    .as_ref()
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                record.account.name.clone(),
                tx.status.as_str().to_string(),
                names
                    .get(&tx.id)
                    .map(|n| n.join(", "))
                    .unwrap_or_default(),
                tx.note.clone().unwrap_or_default(),
            ]
        })
        .collect()
}
