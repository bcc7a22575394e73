//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` - Resolve the engine config
//! - `cmd_init` - Initialize the database
//! - `cmd_accounts_*` - Account management

use std::path::Path;

use anyhow::{Context, Result};
use cadence_core::{db::Database, EngineConfig};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Explicit path, then CADENCE_CONFIG, then the data directory, then defaults
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    EngineConfig::load(path).context("Failed to load engine config")
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Create an account: cadence accounts add --user 1 Checking");
    println!("  2. Import transactions: cadence import --file statement.csv --account 1");
    println!("  3. Detect recurring charges: cadence detect --account 1");

    Ok(())
}

pub fn cmd_accounts_list(db: &Database, user_id: Option<i64>) -> Result<()> {
    let accounts = db.list_accounts(user_id)?;

    if accounts.is_empty() {
        println!("No accounts found. Create one with: cadence accounts add --user 1 <name>");
        return Ok(());
    }

    println!("🏦 Accounts");
    println!("   ─────────────────────────────");
    for account in accounts {
        let count = db.count_transactions(account.id)?;
        println!(
            "   [{}] {} (user {}, {}) - {} transactions",
            account.id, account.name, account.user_id, account.currency, count
        );
    }

    Ok(())
}

pub fn cmd_accounts_add(db: &Database, user_id: i64, name: &str, currency: &str) -> Result<()> {
    anyhow::ensure!(user_id > 0, "--user must be positive");
    let currency = currency.trim().to_uppercase();
    anyhow::ensure!(
        currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()),
        "Currency must be a 3-letter ISO code, got {}",
        currency
    );

    let id = db.create_account(user_id, name, &currency)?;
    println!("✅ Created account [{}] {} ({})", id, name, currency);

    Ok(())
}
