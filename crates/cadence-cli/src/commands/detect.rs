//! Detection command implementations

use anyhow::{Context, Result};
use cadence_core::{
    db::Database,
    models::{DetectedPattern, PatternSource},
    Engine, EngineConfig,
};
use chrono::{Duration, Utc};

use super::truncate;

pub async fn cmd_detect(
    db: &Database,
    config: &EngineConfig,
    account_id: i64,
    lookback_days: Option<i64>,
) -> Result<()> {
    println!("🔍 Detecting recurring transactions...");

    let account = db
        .get_account(account_id)?
        .with_context(|| format!("Account {} not found", account_id))?;
    let engine = Engine::new(db.clone(), config)?;

    let mut payload = serde_json::json!({
        "userId": account.user_id,
        "bankAccountId": account.id,
    });
    if let Some(days) = lookback_days {
        payload["lookbackDays"] = days.into();
    }

    let done = engine
        .runner
        .trigger(&engine.detect, payload)
        .await
        .context("Detection failed")?;

    println!("   {}", done.output.message);
    println!();
    print_patterns(&db.list_patterns(account_id, Some(PatternSource::Detected))?);

    Ok(())
}

pub fn cmd_patterns(db: &Database, account_id: i64, source: Option<&str>) -> Result<()> {
    let source = source
        .map(str::parse::<PatternSource>)
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;

    let patterns = db.list_patterns(account_id, source)?;
    if patterns.is_empty() {
        println!("No recurring patterns. Run: cadence detect --account {}", account_id);
        return Ok(());
    }

    print_patterns(&patterns);
    Ok(())
}

pub fn cmd_upcoming(db: &Database, days: i64) -> Result<()> {
    anyhow::ensure!(days >= 0, "--days must not be negative");

    let until = Utc::now().date_naive() + Duration::days(days);
    let patterns = db.list_upcoming_patterns(until)?;

    println!("📅 Due by {}", until);
    println!("   ─────────────────────────────");
    if patterns.is_empty() {
        println!("   Nothing due");
    }
    for p in &patterns {
        println!(
            "   {}  {:<28} {:>10.2}  (account {})",
            p.next_projected_date,
            truncate(&p.merchant_name, 28),
            p.average_amount,
            p.account_id
        );
    }

    Ok(())
}

fn print_patterns(patterns: &[DetectedPattern]) {
    println!("🔁 Recurring Patterns");
    println!("   ─────────────────────────────");
    for p in patterns {
        let marker = match p.source {
            PatternSource::Detected => "",
            PatternSource::Manual => " (manual)",
        };
        println!(
            "   {:<28} {:>10.2}  {:<9} x{:<3} last {}  next {}{}",
            truncate(&p.merchant_name, 28),
            p.average_amount,
            p.frequency.as_str(),
            p.occurrence_count,
            p.last_occurrence_date,
            p.next_projected_date,
            marker
        );
    }
}
