//! Account and category operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{Account, Category};

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    let created_at_str: String = row.get(4)?;
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        currency: row.get(3)?,
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// Create an account for a tenant
    pub fn create_account(&self, user_id: i64, name: &str, currency: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO accounts (user_id, name, currency) VALUES (?, ?, ?)",
            params![user_id, name, currency.to_uppercase()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get an account by ID
    pub fn get_account(&self, id: i64) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                "SELECT id, user_id, name, currency, created_at FROM accounts WHERE id = ?",
                params![id],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    /// List all accounts, optionally restricted to one tenant
    pub fn list_accounts(&self, user_id: Option<i64>) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, name, currency, created_at
            FROM accounts
            WHERE (?1 IS NULL OR user_id = ?1)
            ORDER BY id
            "#,
        )?;

        let accounts = stmt
            .query_map(params![user_id], account_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(accounts)
    }

    /// Create or get a category by slug
    pub fn upsert_category(&self, name: &str, slug: &str) -> Result<i64> {
        let conn = self.conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM categories WHERE slug = ?",
                params![slug],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO categories (name, slug) VALUES (?, ?)",
            params![name, slug],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get a category by ID
    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                "SELECT id, name, slug FROM categories WHERE id = ?",
                params![id],
                |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        slug: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }
}
