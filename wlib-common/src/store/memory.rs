//! In-memory tabular store
//!
//! Used by unit tests and anywhere a throwaway store is handy. Row ids
//! are assigned sequentially per table and never reused.

use super::{Table, TableRow, TabularStore};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

struct MemTable {
    headers: Vec<String>,
    rows: Vec<TableRow>,
    next_row_id: i64,
}

/// Tables held behind a single RwLock; plenty for test-sized data.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<String, MemTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table with the given headers, replacing any
    /// existing table of the same name.
    pub async fn create_table(&self, name: &str, headers: &[&str]) {
        let mut tables = self.tables.write().await;
        tables.insert(
            name.to_string(),
            MemTable {
                headers: headers.iter().map(|h| h.to_string()).collect(),
                rows: Vec::new(),
                next_row_id: 1,
            },
        );
    }

    /// Insert a raw row positionally (test seeding). Short rows are
    /// padded with empty cells.
    pub async fn insert_row(&self, name: &str, cells: &[&str]) {
        let mut tables = self.tables.write().await;
        if let Some(table) = tables.get_mut(name) {
            let mut cells: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
            cells.resize(table.headers.len(), String::new());
            let id = table.next_row_id;
            table.next_row_id += 1;
            table.rows.push(TableRow { id, cells });
        }
    }
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn read_table(&self, name: &str) -> Result<Option<Table>> {
        let tables = self.tables.read().await;
        Ok(tables.get(name).map(|t| Table {
            name: name.to_string(),
            headers: t.headers.clone(),
            rows: t.rows.clone(),
        }))
    }

    async fn append_row(&self, name: &str, values: &[(&str, String)]) -> Result<()> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("table '{}' not found", name)))?;

        let mut cells = vec![String::new(); table.headers.len()];
        for (column, value) in values {
            // Unknown columns are dropped, matching the schema-drift
            // tolerance of the SQLite store.
            if let Some(idx) = table.headers.iter().position(|h| h == column) {
                cells[idx] = value.clone();
            }
        }
        let id = table.next_row_id;
        table.next_row_id += 1;
        table.rows.push(TableRow { id, cells });
        Ok(())
    }

    async fn update_cell(
        &self,
        name: &str,
        row_id: i64,
        column: &str,
        value: &str,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(name) else {
            return Ok(false);
        };
        let Some(idx) = table.headers.iter().position(|h| h == column) else {
            return Ok(false);
        };
        match table.rows.iter_mut().find(|row| row.id == row_id) {
            Some(row) => {
                row.cells[idx] = value.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn has_table(&self, name: &str) -> Result<bool> {
        Ok(self.tables.read().await.contains_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_skips_unknown_columns() {
        let store = MemoryStore::new();
        store.create_table("t", &["a", "b"]).await;
        store
            .append_row("t", &[("a", "1".into()), ("zzz", "2".into())])
            .await
            .unwrap();

        let table = store.read_table("t").await.unwrap().unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.cell(&table.rows[0], "a"), Some("1"));
        assert_eq!(table.cell(&table.rows[0], "b"), Some(""));
    }

    #[tokio::test]
    async fn append_to_missing_table_is_not_found() {
        let store = MemoryStore::new();
        let err = store.append_row("nope", &[]).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn update_cell_addresses_by_row_id() {
        let store = MemoryStore::new();
        store.create_table("t", &["a"]).await;
        store.insert_row("t", &["x"]).await;
        store.insert_row("t", &["y"]).await;

        let table = store.read_table("t").await.unwrap().unwrap();
        let second = table.rows[1].id;
        assert!(store.update_cell("t", second, "a", "z").await.unwrap());

        let table = store.read_table("t").await.unwrap().unwrap();
        assert_eq!(table.cell(&table.rows[0], "a"), Some("x"));
        assert_eq!(table.cell(&table.rows[1], "a"), Some("z"));

        // Missing row or column reports false, not an error
        assert!(!store.update_cell("t", 999, "a", "z").await.unwrap());
        assert!(!store.update_cell("t", second, "nope", "z").await.unwrap());
    }
}
