//! Cadence CLI - Recurring-transaction detection and batch export
//!
//! Usage:
//!   cadence init                              Initialize database
//!   cadence accounts add --user 1 Checking    Create an account
//!   cadence import --file CSV --account 1     Import transactions
//!   cadence detect --account 1                Detect recurring patterns
//!   cadence export --ids 1,2,3 -o out.csv     Export transactions
//!   cadence serve --port 3000                 Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Accounts { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_accounts_list(&db, None),
                Some(AccountsAction::List { user }) => commands::cmd_accounts_list(&db, user),
                Some(AccountsAction::Add {
                    user,
                    name,
                    currency,
                }) => commands::cmd_accounts_add(&db, user, &name, &currency),
            }
        }
        Commands::Import { file, account } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_import(&db, &file, account)
        }
        Commands::Attach {
            transaction_id,
            name,
            path,
            key,
            content_type,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_attach(&db, transaction_id, &name, path, key, content_type)
        }
        Commands::Detect { account, lookback } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(config_path)?;
            commands::cmd_detect(&db, &config, account, lookback).await
        }
        Commands::Patterns { account, source } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_patterns(&db, account, source.as_deref())
        }
        Commands::Upcoming { days } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_upcoming(&db, days)
        }
        Commands::Export {
            ids,
            locale,
            output,
            attachments_dir,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(config_path)?;
            commands::cmd_export(
                &db,
                &config,
                &ids,
                &locale,
                output.as_deref(),
                attachments_dir.as_deref(),
            )
            .await
        }
        Commands::Runs { task, limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_runs(&db, task.as_deref(), limit)
        }
        Commands::Serve {
            port,
            host,
            allowed_origins,
        } => {
            let config = commands::load_config(config_path)?;
            commands::cmd_serve(
                &cli.db,
                &config,
                &host,
                port,
                allowed_origins,
                cli.no_encrypt,
            )
            .await
        }
    }
}
