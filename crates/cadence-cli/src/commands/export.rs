//! Export command implementation

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use cadence_core::{
    db::Database,
    export::{write_csv, ExportOutput},
    Engine, EngineConfig,
};
use tracing::debug;

pub async fn cmd_export(
    db: &Database,
    config: &EngineConfig,
    ids: &[i64],
    locale: &str,
    output: Option<&Path>,
    attachments_dir: Option<&Path>,
) -> Result<()> {
    let engine = Engine::new(db.clone(), config)?;
    let payload = serde_json::json!({ "ids": ids, "locale": locale });

    let done = engine
        .runner
        .trigger(&engine.export, payload)
        .await
        .context("Export failed")?;
    debug!(run_id = done.run_id, attempts = done.attempts, "Export run finished");
    let export = done.output;

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_csv(&export, file)?;
            eprintln!("📤 Exported {} transactions to {}", export.rows.len(), path.display());
        }
        None => {
            write_csv(&export, io::stdout().lock())?;
        }
    }

    if let Some(dir) = attachments_dir {
        let written = write_attachments(&export, dir)?;
        eprintln!("📎 Wrote {} attachments to {}", written, dir.display());
    }

    let missing = export.missing_blobs();
    if missing > 0 {
        eprintln!("⚠️  {} attachments could not be fetched", missing);
    }

    Ok(())
}

/// Write every fetched blob under its export file name; returns the count
pub fn write_attachments(export: &ExportOutput, dir: &Path) -> Result<usize> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut written = 0;
    for attachment in &export.attachments {
        let Some(blob) = &attachment.blob else {
            continue;
        };
        let path = dir.join(&attachment.file_name);
        let mut file =
            File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(blob)?;
        written += 1;
    }

    Ok(written)
}
