use std::collections::HashMap;

use crate::pipeline::table::Table;

/// Applies the custom-field label dictionary to the table's columns.
///
/// Columns without a mapping pass through unchanged; mapping entries whose
/// source column is absent are no-ops (the dictionary outlives any one
/// run's data and is expected to carry stale or future entries). Two
/// sources mapped to the same label both receive it, which leaves the
/// table with duplicate column names - observed behavior, kept as is.
pub fn rename_columns(table: &mut Table, mapping: &HashMap<String, String>) {
    for column in table.columns_mut() {
        if let Some(label) = mapping.get(column) {
            *column = label.clone();
        }
    }
}
