//! Integration tests for cadence-core
//!
//! These tests exercise the full import → detect → export workflow through
//! the public API and the task runner.

use std::sync::Arc;

use chrono::NaiveDate;
use cadence_core::{
    config::{EngineConfig, StorageConfig},
    db::Database,
    import::import_csv,
    models::{
        NewAttachment, NewDetectedPattern, PatternSource, PatternStatus, RunStatus,
        StoredFrequency,
    },
    tasks::{DetectRecurringTask, TaskOptions},
    Engine, Error, LocalObjectStore, RecurringDetector,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Three monthly subscriptions, a weekly gym charge and noise
fn statement_csv() -> &'static str {
    r#"Date,Description,Amount,Category,Status
2024-01-10,NETFLIX.COM,-15.49,Streaming,posted
2024-02-10,NETFLIX.COM,-15.49,Streaming,posted
2024-03-10,NETFLIX.COM,-15.49,Streaming,posted
2024-01-20,SPOTIFY USA,-10.99,Streaming,posted
2024-02-20,SPOTIFY USA,-10.99,Streaming,posted
2024-03-20,SPOTIFY USA,-10.99,Streaming,posted
2024-01-05,CITY POWER,-80.10,Utilities,posted
2024-02-05,CITY POWER,-95.42,Utilities,posted
2024-03-05,CITY POWER,-71.00,Utilities,posted
2024-03-08,GYM,-25.00,,posted
2024-03-15,GYM,-25.00,,posted
2024-03-22,GYM,-25.00,,posted
2024-03-29,GYM,-25.00,,pending
2024-02-14,FLOWER SHOP,-42.00,,posted
2024-03-01,COFFEE,-4.50,,posted
2024-03-02,COFFEE,-4.75,,posted"#
}

fn detect_task(db: &Database, config: &EngineConfig, today: NaiveDate) -> DetectRecurringTask {
    DetectRecurringTask::new(
        db.clone(),
        RecurringDetector::new(db.clone()),
        config.detection.default_lookback_days,
        TaskOptions::new(config.tasks.detect_recurring, config.retry.clone()),
    )
    .with_today(today)
}

fn engine_with_dir(db: &Database, dir: &std::path::Path) -> Engine {
    let config = EngineConfig::default();
    Engine::with_store(
        db.clone(),
        &config,
        Arc::new(LocalObjectStore::new(dir)),
    )
}

// =============================================================================
// Detection
// =============================================================================

#[tokio::test]
async fn test_import_then_detect_workflow() {
    let db = Database::in_memory().expect("Failed to create database");
    let account = db.create_account(7, "Checking", "USD").unwrap();

    let stats = import_csv(&db, account, statement_csv().as_bytes()).unwrap();
    assert_eq!(stats.imported, 16);

    let config = EngineConfig::default();
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_dir(&db, dir.path());
    let task = detect_task(&db, &config, date(2024, 4, 1));

    let done = engine
        .runner
        .trigger(
            &task,
            serde_json::json!({"userId": 7, "bankAccountId": account}),
        )
        .await
        .unwrap();
    assert_eq!(done.output.status, "success");
    assert_eq!(done.output.patterns_identified, 3);

    let patterns = db.list_patterns(account, Some(PatternSource::Detected)).unwrap();
    let merchants: Vec<_> = patterns.iter().map(|p| p.merchant_name.as_str()).collect();
    // Utilities vary too much; pending charges are not scanned
    assert_eq!(merchants, ["GYM", "NETFLIX.COM", "SPOTIFY USA"]);

    let gym = &patterns[0];
    assert_eq!(gym.frequency, StoredFrequency::Weekly);
    assert_eq!(gym.occurrence_count, 3);
    assert_eq!(gym.next_projected_date, date(2024, 3, 29));

    let netflix = &patterns[1];
    assert_eq!(netflix.frequency, StoredFrequency::Monthly);
    assert_eq!(netflix.average_amount, -15.49);
    assert_eq!(netflix.last_occurrence_date, date(2024, 3, 10));
    assert_eq!(netflix.next_projected_date, date(2024, 4, 10));
    assert_eq!(netflix.confidence_score, 0.5);
    assert_eq!(netflix.status, PatternStatus::Active);

    let run = db.get_task_run(done.run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.attempts, 1);
}

#[tokio::test]
async fn test_quarterly_pattern_is_stored_as_irregular() {
    let db = Database::in_memory().unwrap();
    let account = db.create_account(1, "Savings", "USD").unwrap();
    let csv = "Date,Counterparty,Amount\n\
        2024-01-15,WATER UTILITY,-60.00\n\
        2024-04-15,WATER UTILITY,-60.00\n\
        2024-07-15,WATER UTILITY,-60.00\n\
        2024-10-15,WATER UTILITY,-60.00\n";
    import_csv(&db, account, csv.as_bytes()).unwrap();

    let config = EngineConfig::default();
    let task = detect_task(&db, &config, date(2024, 12, 31));
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_dir(&db, dir.path());

    engine
        .runner
        .trigger(
            &task,
            serde_json::json!({"userId": 1, "bankAccountId": account, "lookbackDays": 365}),
        )
        .await
        .unwrap();

    let patterns = db.list_patterns(account, None).unwrap();
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].frequency, StoredFrequency::Irregular);
    assert_eq!(patterns[0].next_projected_date, date(2025, 1, 15));
}

#[tokio::test]
async fn test_rerun_replaces_detected_and_keeps_manual() {
    let db = Database::in_memory().unwrap();
    let account = db.create_account(3, "Checking", "USD").unwrap();
    import_csv(&db, account, statement_csv().as_bytes()).unwrap();

    db.create_pattern(&NewDetectedPattern {
        account_id: account,
        merchant_name: "LANDLORD".to_string(),
        frequency: StoredFrequency::Monthly,
        average_amount: -1200.0,
        last_occurrence_date: date(2024, 3, 1),
        next_projected_date: date(2024, 4, 1),
        occurrence_count: 1,
        confidence_score: 1.0,
        source: PatternSource::Manual,
        status: PatternStatus::Active,
    })
    .unwrap();

    let config = EngineConfig::default();
    let task = detect_task(&db, &config, date(2024, 4, 1));
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_dir(&db, dir.path());
    let payload = serde_json::json!({"userId": 3, "bankAccountId": account});

    engine.runner.trigger(&task, payload.clone()).await.unwrap();
    let first = db.list_patterns(account, Some(PatternSource::Detected)).unwrap();
    engine.runner.trigger(&task, payload).await.unwrap();
    let second = db.list_patterns(account, Some(PatternSource::Detected)).unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.merchant_name, b.merchant_name);
        assert_eq!(a.next_projected_date, b.next_projected_date);
    }

    let manual = db.list_patterns(account, Some(PatternSource::Manual)).unwrap();
    assert_eq!(manual.len(), 1);
    assert_eq!(manual[0].merchant_name, "LANDLORD");
    assert_eq!(manual[0].confidence_score, 1.0);
}

#[tokio::test]
async fn test_detection_rejects_bad_lookback_without_a_run() {
    let db = Database::in_memory().unwrap();
    let account = db.create_account(1, "Checking", "USD").unwrap();
    let config = EngineConfig::default();
    let task = detect_task(&db, &config, date(2024, 4, 1));
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_dir(&db, dir.path());

    let err = engine
        .runner
        .trigger(
            &task,
            serde_json::json!({"userId": 1, "bankAccountId": account, "lookbackDays": 7}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(db.list_task_runs(None, 10).unwrap().is_empty());
}

// =============================================================================
// Export
// =============================================================================

#[tokio::test]
async fn test_export_with_local_storage() {
    let db = Database::in_memory().unwrap();
    let account = db.create_account(7, "Checking", "EUR").unwrap();
    let csv = "Date,Description,Amount,Category,Memo\n\
        2024-03-02,Bakery,-1234.5,Food & Dining,birthday cake\n\
        2024-03-01,Bookshop,-20,,\n";
    import_csv(&db, account, csv.as_bytes()).unwrap();

    let txs = db.list_transactions_since(account, date(2024, 1, 1), None).unwrap();
    let bakery = txs.iter().find(|t| t.counterparty_name == "Bakery").unwrap().id;
    let bookshop = txs.iter().find(|t| t.counterparty_name == "Bookshop").unwrap().id;

    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("receipts")).unwrap();
    std::fs::write(dir.path().join("receipts/cake.pdf"), b"%PDF-cake").unwrap();

    db.insert_attachment(
        bakery,
        &NewAttachment {
            name: "cake.pdf".to_string(),
            file_key: Some("receipts/cake.pdf".to_string()),
            content_type: Some("application/pdf".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    db.insert_attachment(
        bakery,
        &NewAttachment {
            name: "lost.jpg".to_string(),
            file_key: Some("receipts/lost.jpg".to_string()),
            content_type: Some("image/jpeg".to_string()),
            ..Default::default()
        },
    )
    .unwrap();

    let engine = engine_with_dir(&db, dir.path());
    let done = engine
        .runner
        .trigger(
            &engine.export,
            serde_json::json!({"ids": [bakery, bookshop, 999_999], "locale": "de-DE"}),
        )
        .await
        .unwrap();
    let output = done.output;

    // Sorted by date, unknown ids skipped
    assert_eq!(output.rows.len(), 2);
    assert_eq!(output.rows[0][2], "Bookshop");
    assert_eq!(output.rows[1][2], "Bakery");
    assert_eq!(output.rows[1][3], "-1234.50");
    assert_eq!(output.rows[1][4], "EUR");
    assert_eq!(output.rows[1][6], "Food & Dining");
    assert_eq!(output.rows[1][10], "birthday cake");

    assert_eq!(output.attachments.len(), 2);
    assert_eq!(output.missing_blobs(), 1);
    let cake = output
        .attachments
        .iter()
        .find(|a| a.original_name == "cake.pdf")
        .unwrap();
    assert_eq!(cake.blob.as_deref(), Some(&b"%PDF-cake"[..]));
    assert!(cake.checksum.is_some());
    assert!(output.rows[1][9].contains(&cake.file_name));

    let json = serde_json::to_value(&output).unwrap();
    assert!(json["attachments"][0].get("blob").is_some());
}

#[test]
fn test_engine_from_config_uses_local_storage() {
    let db = Database::in_memory().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::default();
    config.storage = StorageConfig {
        base_url: None,
        root_dir: Some(dir.path().to_path_buf()),
    };
    assert!(Engine::new(db, &config).is_ok());
}
