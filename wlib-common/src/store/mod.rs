//! Header-addressed tabular store
//!
//! The canonical state lives in a spreadsheet-shaped store: named tables,
//! a header row, and data rows of text cells. All field access goes
//! through header names so the logic survives column reordering and
//! missing optional columns in the underlying layout.

use crate::Result;
use async_trait::async_trait;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// One data row: an opaque row id plus one text cell per header.
///
/// The id is whatever the backing store uses to address the row for
/// updates (SQLite rowid, vector index for the in-memory store). It has
/// no meaning beyond "hand it back to `update_cell`".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub id: i64,
    pub cells: Vec<String>,
}

/// A snapshot of one logical table: ordered headers plus data rows.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl Table {
    /// Resolve a header name to its cell position, if the column exists.
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Read one cell of a row by header name.
    pub fn cell<'a>(&self, row: &'a TableRow, header: &str) -> Option<&'a str> {
        let idx = self.column_index(header)?;
        row.cells.get(idx).map(String::as_str)
    }

    /// True when the table has a header row but no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Row read/append/update over named tables.
///
/// Implementations must tolerate schema drift: appends silently skip
/// values whose column does not exist, and absent tables read as `None`
/// rather than an error.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Snapshot a whole table. `None` when the table does not exist.
    async fn read_table(&self, name: &str) -> Result<Option<Table>>;

    /// Append one row. Pairs naming a nonexistent column are skipped;
    /// columns with no pair default to the empty string. Fails with
    /// `Error::NotFound` when the table itself is absent.
    async fn append_row(&self, name: &str, values: &[(&str, String)]) -> Result<()>;

    /// Set one cell of an existing row. Returns false when the row or
    /// column is absent.
    async fn update_cell(&self, name: &str, row_id: i64, column: &str, value: &str)
        -> Result<bool>;

    /// True when the named table exists.
    async fn has_table(&self, name: &str) -> Result<bool> {
        Ok(self.read_table(name).await?.is_some())
    }

    /// All values of one column, in row order. Empty when the table or
    /// the column is absent.
    async fn column_values(&self, name: &str, column: &str) -> Result<Vec<String>> {
        let Some(table) = self.read_table(name).await? else {
            return Ok(Vec::new());
        };
        let Some(idx) = table.column_index(column) else {
            return Ok(Vec::new());
        };
        Ok(table
            .rows
            .iter()
            .filter_map(|row| row.cells.get(idx).cloned())
            .collect())
    }
}
