//! Sequential prefixed identifier generation
//!
//! Wheel and member ids are `W001` / `M001` style: a one-letter prefix
//! plus a zero-padded sequence number. The next id is derived from the
//! current maximum on every call; there is no cached counter. Callers
//! that append are expected to hold the service write gate across the
//! scan-and-append sequence so two requests cannot mint the same id.

use crate::store::TabularStore;
use crate::Result;

/// Pad width for the numeric suffix. Values past 999 keep their natural
/// width (`W1000`), which sorts inconsistently against padded ids; the
/// original data set works this way and it is preserved as-is.
const ID_PAD_WIDTH: usize = 3;

/// Parse the numeric suffix of `value` when it is `prefix` followed by
/// digits only. Malformed values yield `None` and are ignored by the max
/// scan.
fn parse_suffix(value: &str, prefix: &str) -> Option<u64> {
    let rest = value.strip_prefix(prefix)?;
    if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// Derive the next id for `prefix` from the current contents of
/// `table.column`. An absent table, absent column, or a column with no
/// well-formed ids all start the sequence at `<prefix>001`.
pub async fn next_id(
    store: &dyn TabularStore,
    table: &str,
    column: &str,
    prefix: &str,
) -> Result<String> {
    let values = store.column_values(table, column).await?;

    let max = values
        .iter()
        .filter_map(|v| parse_suffix(v.trim(), prefix))
        .max()
        .unwrap_or(0);

    Ok(format!("{}{:0width$}", prefix, max + 1, width = ID_PAD_WIDTH))
}
