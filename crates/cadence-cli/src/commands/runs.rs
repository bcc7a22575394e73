//! Run log command

use anyhow::Result;
use cadence_core::db::Database;

use super::truncate;

pub fn cmd_runs(db: &Database, task: Option<&str>, limit: i64) -> Result<()> {
    let runs = db.list_task_runs(task, limit.max(1))?;

    if runs.is_empty() {
        println!("No task runs recorded yet");
        return Ok(());
    }

    println!("🗂  Task Runs");
    println!("   ─────────────────────────────");
    for run in runs {
        let finished = run
            .finished_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "   [{}] {:<20} {:<9} attempts={}  finished={}",
            run.id,
            run.task_id,
            run.status.as_str(),
            run.attempts,
            finished
        );
        if let Some(err) = run.error {
            println!("        ❌ {}", truncate(&err, 100));
        }
    }

    Ok(())
}
