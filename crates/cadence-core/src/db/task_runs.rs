//! Task run log operations

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::{format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::models::{RunStatus, TaskRun};

const RUN_COLUMNS: &str =
    "id, task_id, payload, status, attempts, error, started_at, finished_at, created_at";

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRun> {
    let payload_str: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    let started_at_str: Option<String> = row.get(6)?;
    let finished_at_str: Option<String> = row.get(7)?;
    let created_at_str: String = row.get(8)?;

    Ok(TaskRun {
        id: row.get(0)?,
        task_id: row.get(1)?,
        payload: serde_json::from_str(&payload_str).unwrap_or(serde_json::Value::Null),
        status: status_str.parse().unwrap_or(RunStatus::Failed),
        attempts: row.get(4)?,
        error: row.get(5)?,
        started_at: started_at_str.map(|s| parse_datetime(&s)),
        finished_at: finished_at_str.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// Record a queued run and return its ID
    pub fn create_task_run(&self, task_id: &str, payload: &serde_json::Value) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO task_runs (task_id, payload, status) VALUES (?, ?, ?)",
            params![
                task_id,
                serde_json::to_string(payload)?,
                RunStatus::Queued.as_str()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Mark a run as executing its `attempt`-th attempt
    pub fn mark_run_attempt(&self, id: i64, attempt: u32) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE task_runs
            SET status = ?, attempts = ?, started_at = COALESCE(started_at, ?)
            WHERE id = ?
            "#,
            params![
                RunStatus::Running.as_str(),
                attempt,
                format_datetime(Utc::now()),
                id
            ],
        )?;
        Ok(())
    }

    /// Move a run to a terminal state
    pub fn finish_task_run(&self, id: i64, status: RunStatus, error: Option<&str>) -> Result<()> {
        debug_assert!(status.is_terminal());
        let conn = self.conn()?;
        conn.execute(
            "UPDATE task_runs SET status = ?, error = ?, finished_at = ? WHERE id = ?",
            params![status.as_str(), error, format_datetime(Utc::now()), id],
        )?;
        Ok(())
    }

    /// Get a run by ID
    pub fn get_task_run(&self, id: i64) -> Result<Option<TaskRun>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM task_runs WHERE id = ?", RUN_COLUMNS);
        let run = conn
            .query_row(&sql, params![id], run_from_row)
            .optional()?;
        Ok(run)
    }

    /// Most recent runs first, optionally for one task type
    pub fn list_task_runs(&self, task_id: Option<&str>, limit: i64) -> Result<Vec<TaskRun>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM task_runs
            WHERE (?1 IS NULL OR task_id = ?1)
            ORDER BY id DESC
            LIMIT ?2
            "#,
            RUN_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let runs = stmt
            .query_map(params![task_id, limit], run_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(runs)
    }
}
