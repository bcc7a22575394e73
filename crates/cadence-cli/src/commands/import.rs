//! Import command implementations

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use cadence_core::{db::Database, import::import_csv, models::NewAttachment};

pub fn cmd_import(db: &Database, file: &Path, account_id: i64) -> Result<()> {
    println!("📥 Importing {}...", file.display());

    let reader =
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let stats = import_csv(db, account_id, reader).context("Import failed")?;

    println!("   Parsed: {}", stats.parsed);
    println!("   Imported: {}", stats.imported);
    if stats.duplicates > 0 {
        println!("   Skipped (already imported): {}", stats.duplicates);
    }
    println!("✅ Import complete");

    Ok(())
}

pub fn cmd_attach(
    db: &Database,
    transaction_id: i64,
    name: &str,
    path: Option<String>,
    key: Option<String>,
    content_type: Option<String>,
) -> Result<()> {
    anyhow::ensure!(
        path.is_some() || key.is_some(),
        "Provide --path or --key so the attachment can be fetched"
    );

    let id = db
        .insert_attachment(
            transaction_id,
            &NewAttachment {
                name: name.to_string(),
                path,
                file_key: key,
                content_type,
                size: None,
            },
        )
        .with_context(|| format!("Failed to attach {} to transaction {}", name, transaction_id))?;

    println!("📎 Attachment [{}] added to transaction {}", id, transaction_id);

    Ok(())
}
