//! SQLite-backed tabular store
//!
//! Each logical table is a plain SQLite table of TEXT columns. Headers
//! are discovered per call via `PRAGMA table_info` and rows are addressed
//! by rowid, so the store keeps working when columns are added, dropped,
//! or reordered underneath it.

use super::{Table, TableRow, TabularStore};
use crate::{Error, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool, ValueRef};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn table_headers(&self, name: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", name))
            .fetch_all(&self.pool)
            .await?;

        // PRAGMA table_info returns (cid, name, type, notnull, dflt_value, pk)
        Ok(rows.iter().map(|row| row.get::<String, _>(1)).collect())
    }
}

/// Identifiers are interpolated into SQL, so restrict them to a safe
/// character set (same rule the table names in config follow).
fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() < 100
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_identifier(name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(Error::Config(format!("invalid identifier: {:?}", name)))
    }
}

/// Coerce one SQLite value to text. Cells are stored as TEXT, but stale
/// data may carry integer or real affinity; render those rather than fail.
fn cell_to_string(row: &sqlx::sqlite::SqliteRow, idx: usize) -> String {
    match row.try_get_raw(idx) {
        Ok(val) if val.is_null() => String::new(),
        Ok(_) => row
            .try_get::<String, _>(idx)
            .ok()
            .or_else(|| row.try_get::<i64, _>(idx).ok().map(|v| v.to_string()))
            .or_else(|| row.try_get::<f64, _>(idx).ok().map(|v| v.to_string()))
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

#[async_trait]
impl TabularStore for SqliteStore {
    async fn read_table(&self, name: &str) -> Result<Option<Table>> {
        check_identifier(name)?;
        if !self.has_table(name).await? {
            return Ok(None);
        }

        let headers = self.table_headers(name).await?;
        let rows = sqlx::query(&format!("SELECT rowid, * FROM {} ORDER BY rowid", name))
            .fetch_all(&self.pool)
            .await?;

        let rows = rows
            .iter()
            .map(|row| TableRow {
                id: row.try_get::<i64, _>(0).unwrap_or_default(),
                // Column 0 is rowid; data cells start at 1
                cells: (1..row.columns().len())
                    .map(|i| cell_to_string(row, i))
                    .collect(),
            })
            .collect();

        Ok(Some(Table {
            name: name.to_string(),
            headers,
            rows,
        }))
    }

    async fn append_row(&self, name: &str, values: &[(&str, String)]) -> Result<()> {
        check_identifier(name)?;
        if !self.has_table(name).await? {
            return Err(Error::NotFound(format!("table '{}' not found", name)));
        }

        let headers = self.table_headers(name).await?;
        let matched: Vec<&(&str, String)> = values
            .iter()
            .filter(|(column, _)| headers.iter().any(|h| h == column))
            .collect();

        if matched.is_empty() {
            sqlx::query(&format!("INSERT INTO {} DEFAULT VALUES", name))
                .execute(&self.pool)
                .await?;
            return Ok(());
        }

        let columns: Vec<&str> = matched.iter().map(|(column, _)| *column).collect();
        let placeholders = vec!["?"; matched.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            name,
            columns.join(", "),
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for (_, value) in &matched {
            query = query.bind(value);
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    async fn update_cell(
        &self,
        name: &str,
        row_id: i64,
        column: &str,
        value: &str,
    ) -> Result<bool> {
        check_identifier(name)?;
        check_identifier(column)?;
        if !self.has_table(name).await? {
            return Ok(false);
        }
        if !self.table_headers(name).await?.iter().any(|h| h == column) {
            return Ok(false);
        }

        let result = sqlx::query(&format!("UPDATE {} SET {} = ? WHERE rowid = ?", name, column))
            .bind(value)
            .bind(row_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn has_table(&self, name: &str) -> Result<bool> {
        check_identifier(name)?;
        let found: Option<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }
}
