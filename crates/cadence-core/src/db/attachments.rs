//! Attachment metadata and the export join

use std::collections::HashMap;

use rusqlite::{params, params_from_iter};

use super::transactions::{transaction_from_row, TRANSACTION_COLUMNS};
use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{Account, Attachment, Category, NewAttachment, TransactionWithRelations};

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl Database {
    /// Attach a stored file to a transaction
    pub fn insert_attachment(&self, transaction_id: i64, attachment: &NewAttachment) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO attachments (transaction_id, name, path, file_key, content_type, size)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
            params![
                transaction_id,
                attachment.name,
                attachment.path,
                attachment.file_key,
                attachment.content_type,
                attachment.size,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Attachments for a set of transactions, in insertion order
    pub fn list_attachments(&self, transaction_ids: &[i64]) -> Result<Vec<Attachment>> {
        if transaction_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT id, transaction_id, name, path, file_key, content_type, size
            FROM attachments
            WHERE transaction_id IN ({})
            ORDER BY transaction_id, id
            "#,
            placeholders(transaction_ids.len())
        );

        let mut stmt = conn.prepare(&sql)?;
        let attachments = stmt
            .query_map(params_from_iter(transaction_ids.iter()), |row| {
                Ok(Attachment {
                    id: row.get(0)?,
                    transaction_id: row.get(1)?,
                    name: row.get(2)?,
                    path: row.get(3)?,
                    file_key: row.get(4)?,
                    content_type: row.get(5)?,
                    size: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(attachments)
    }

    /// Load transactions by ID together with account, category and attachments
    ///
    /// IDs that do not exist are skipped. Order follows the database, callers sort.
    pub fn get_transactions_with_relations(
        &self,
        ids: &[i64],
    ) -> Result<Vec<TransactionWithRelations>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {},
                   a.id, a.user_id, a.name, a.currency, a.created_at,
                   c.id, c.name, c.slug
            FROM transactions t
            JOIN accounts a ON a.id = t.account_id
            LEFT JOIN categories c ON c.id = t.category_id
            WHERE t.id IN ({})
            ORDER BY t.id
            "#,
            TRANSACTION_COLUMNS,
            placeholders(ids.len())
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter()), |row| {
                let transaction = transaction_from_row(row, 0)?;
                let account_created: String = row.get(14)?;
                let account = Account {
                    id: row.get(10)?,
                    user_id: row.get(11)?,
                    name: row.get(12)?,
                    currency: row.get(13)?,
                    created_at: parse_datetime(&account_created),
                };
                let category_id: Option<i64> = row.get(15)?;
                let category = match category_id {
                    Some(id) => Some(Category {
                        id,
                        name: row.get(16)?,
                        slug: row.get(17)?,
                    }),
                    None => None,
                };
                Ok((transaction, account, category))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        let found: Vec<i64> = rows.iter().map(|(tx, _, _)| tx.id).collect();
        let mut by_transaction: HashMap<i64, Vec<Attachment>> = HashMap::new();
        for attachment in self.list_attachments(&found)? {
            by_transaction
                .entry(attachment.transaction_id)
                .or_default()
                .push(attachment);
        }

        Ok(rows
            .into_iter()
            .map(|(transaction, account, category)| TransactionWithRelations {
                attachments: by_transaction.remove(&transaction.id).unwrap_or_default(),
                transaction,
                category,
                account,
            })
            .collect())
    }
}
