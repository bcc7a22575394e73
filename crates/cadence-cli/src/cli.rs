//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cadence - Find recurring transactions and export them
#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Recurring-transaction detection and batch export engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "cadence.db", global = true)]
    pub db: PathBuf,

    /// Engine config file (defaults to CADENCE_CONFIG, then the data directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set CADENCE_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Manage bank accounts
    Accounts {
        #[command(subcommand)]
        action: Option<AccountsAction>,
    },

    /// Import transactions from CSV into an account
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Account ID to import into
        #[arg(short, long)]
        account: i64,
    },

    /// Record an attachment for a transaction
    Attach {
        /// Transaction ID
        transaction_id: i64,

        /// Original file name
        #[arg(long)]
        name: String,

        /// Direct URL or relative path of the object
        #[arg(long)]
        path: Option<String>,

        /// Storage key resolved against the configured storage
        #[arg(long)]
        key: Option<String>,

        /// MIME type (e.g., application/pdf)
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Detect recurring transactions for an account
    Detect {
        /// Account ID
        #[arg(short, long)]
        account: i64,

        /// Days of posted history to scan (30-365)
        #[arg(short, long)]
        lookback: Option<i64>,
    },

    /// List recurring patterns for an account
    Patterns {
        /// Account ID
        #[arg(short, long)]
        account: i64,

        /// Only show one source: detected or manual
        #[arg(long)]
        source: Option<String>,
    },

    /// List active patterns due in the next few days (all accounts)
    Upcoming {
        /// Horizon in days
        #[arg(long, default_value = "7")]
        days: i64,
    },

    /// Export transactions to CSV with attachment files
    Export {
        /// Transaction IDs (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<i64>,

        /// Locale for formatted amounts (e.g., en-US, de-DE)
        #[arg(long, default_value = "en-US")]
        locale: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory to write fetched attachments into
        #[arg(long)]
        attachments_dir: Option<PathBuf>,
    },

    /// Show recent task runs
    Runs {
        /// Only show one task type (detect-recurring, export-transactions)
        #[arg(long)]
        task: Option<String>,

        /// Number of runs to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Allowed CORS origins (comma-separated)
        #[arg(long, value_delimiter = ',')]
        allowed_origins: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum AccountsAction {
    /// List accounts
    List {
        /// Only show accounts of one tenant
        #[arg(long)]
        user: Option<i64>,
    },

    /// Create an account
    Add {
        /// Owning tenant ID
        #[arg(long)]
        user: i64,

        /// Account name
        name: String,

        /// ISO 4217 currency code
        #[arg(long, default_value = "USD")]
        currency: String,
    },
}
