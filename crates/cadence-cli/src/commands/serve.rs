//! Server command implementation

use std::path::Path;

use anyhow::Result;
use cadence_core::EngineConfig;
use cadence_server::{DetectionScheduleConfig, ServerConfig};

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    config: &EngineConfig,
    host: &str,
    port: u16,
    allowed_origins: Vec<String>,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting Cadence web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if !allowed_origins.is_empty() {
        println!("   CORS origins: {}", allowed_origins.join(", "));
    }
    match DetectionScheduleConfig::from_env() {
        Some(schedule) => println!(
            "   Scheduled detection: every {} hours",
            schedule.interval_hours
        ),
        None => println!("   💡 Tip: Set CADENCE_DETECT_SCHEDULE=24 for daily detection sweeps"),
    }

    let db = open_db(db_path, no_encrypt)?;
    cadence_server::serve(db, config, host, port, ServerConfig { allowed_origins }).await
}
