//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (open_db, load_config), init and accounts
//! - `import` - CSV import and attachment records
//! - `detect` - Recurring detection and pattern listings
//! - `export` - Transaction export to CSV plus attachment files
//! - `runs` - Task run log
//! - `serve` - Web server command

pub mod core;
pub mod detect;
pub mod export;
pub mod import;
pub mod runs;
pub mod serve;

// Re-export command functions for main.rs
pub use core::*;
pub use detect::*;
pub use export::*;
pub use import::*;
pub use runs::*;
pub use serve::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
