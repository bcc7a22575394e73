//! Background scheduler for periodic recurring-pattern detection
//!
//! Enabled via environment variables:
//!
//! - `CADENCE_DETECT_SCHEDULE`: Interval in hours (e.g., "24" for daily)
//! - `CADENCE_DETECT_LOOKBACK`: Lookback window in days for scheduled runs
//!   (defaults to the engine's configured lookback)
//!
//! Each tick sweeps every account through the server's engine, so scheduled
//! runs share queue limits, account locks and the run log with API-triggered
//! ones.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info, warn};

use cadence_core::{Database, Engine};

/// Environment variable holding the sweep interval in hours
pub const SCHEDULE_ENV: &str = "CADENCE_DETECT_SCHEDULE";

/// Environment variable overriding the sweep lookback in days
pub const LOOKBACK_ENV: &str = "CADENCE_DETECT_LOOKBACK";

/// Configuration for scheduled detection sweeps
#[derive(Debug, Clone)]
pub struct DetectionScheduleConfig {
    /// Interval between sweeps in hours
    pub interval_hours: u64,
    /// Lookback override; `None` uses the engine default
    pub lookback_days: Option<i64>,
}

impl DetectionScheduleConfig {
    /// Parse configuration from environment variables
    ///
    /// Returns None if scheduling is not configured (CADENCE_DETECT_SCHEDULE not set)
    pub fn from_env() -> Option<Self> {
        let interval_hours: u64 = std::env::var(SCHEDULE_ENV)
            .ok()
            .and_then(|s| s.parse().ok())?;

        if interval_hours == 0 {
            warn!("{} is 0, scheduled detection disabled", SCHEDULE_ENV);
            return None;
        }

        let lookback_days = std::env::var(LOOKBACK_ENV)
            .ok()
            .and_then(|s| s.parse().ok());

        Some(Self {
            interval_hours,
            lookback_days,
        })
    }
}

/// Outcome of one sweep over all accounts
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    pub accounts: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub patterns: usize,
}

/// Start the detection scheduler as a background task
///
/// This function spawns a tokio task that runs indefinitely, sweeping all
/// accounts at the configured interval.
pub fn start_detection_scheduler(
    db: Database,
    engine: Arc<Engine>,
    config: DetectionScheduleConfig,
) {
    info!(
        "Starting detection scheduler: every {} hours",
        config.interval_hours
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(config.interval_hours * 3600));

        // Skip the first immediate tick - startup shouldn't trigger a sweep
        ticker.tick().await;

        loop {
            ticker.tick().await;

            info!("Running scheduled detection sweep...");

            match run_detection_sweep(&db, &engine, config.lookback_days).await {
                Ok(summary) => {
                    info!(
                        accounts = summary.accounts,
                        succeeded = summary.succeeded,
                        failed = summary.failed,
                        patterns = summary.patterns,
                        "Scheduled detection sweep completed"
                    );
                }
                Err(e) => {
                    error!("Scheduled detection sweep failed: {}", e);
                }
            }
        }
    });
}

/// Run detection once for every account, then log what is due this week
pub async fn run_detection_sweep(
    db: &Database,
    engine: &Engine,
    lookback_days: Option<i64>,
) -> anyhow::Result<SweepSummary> {
    let accounts = db.list_accounts(None)?;
    let mut summary = SweepSummary {
        accounts: accounts.len(),
        ..Default::default()
    };

    for account in accounts {
        let mut payload = serde_json::json!({
            "userId": account.user_id,
            "bankAccountId": account.id,
        });
        if let Some(days) = lookback_days {
            payload["lookbackDays"] = days.into();
        }

        // One failing account must not stop the sweep
        match engine.runner.trigger(&engine.detect, payload).await {
            Ok(done) => {
                summary.succeeded += 1;
                summary.patterns += done.output.patterns_identified;
            }
            Err(e) => {
                summary.failed += 1;
                warn!(account_id = account.id, error = %e, "Scheduled detection failed");
            }
        }
    }

    let until = Utc::now().date_naive() + chrono::Duration::days(7);
    match db.list_upcoming_patterns(until) {
        Ok(upcoming) => {
            for pattern in upcoming {
                info!(
                    account_id = pattern.account_id,
                    merchant = %pattern.merchant_name,
                    amount = pattern.average_amount,
                    due = %pattern.next_projected_date,
                    "Upcoming recurring transaction"
                );
            }
        }
        Err(e) => warn!("Failed to list upcoming patterns: {}", e),
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        std::env::remove_var(SCHEDULE_ENV);
        assert!(DetectionScheduleConfig::from_env().is_none());

        std::env::set_var(SCHEDULE_ENV, "0");
        assert!(DetectionScheduleConfig::from_env().is_none());

        std::env::set_var(SCHEDULE_ENV, "24");
        std::env::set_var(LOOKBACK_ENV, "180");
        let config = DetectionScheduleConfig::from_env().unwrap();
        assert_eq!(config.interval_hours, 24);
        assert_eq!(config.lookback_days, Some(180));

        std::env::remove_var(SCHEDULE_ENV);
        std::env::remove_var(LOOKBACK_ENV);
    }
}
