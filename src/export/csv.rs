use anyhow::{Context, Result};
use serde_json::Value;

use crate::pipeline::table::Table;

// Spreadsheet tools need the BOM to pick UTF-8 over the locale codepage.
const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Serializes the reconciled table: UTF-8 with BOM, header row, one data
/// row per normalized record. Nulls become empty cells.
pub fn to_csv_bytes(table: &Table) -> Result<Vec<u8>> {
    let mut buffer = UTF8_BOM.to_vec();

    if table.column_count() == 0 {
        return Ok(buffer);
    }

    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        writer
            .write_record(table.columns())
            .context("Failed to write CSV header")?;

        for row in table.rows() {
            let record: Vec<String> = row.iter().map(cell_text).collect();
            writer
                .write_record(&record)
                .context("Failed to write CSV row")?;
        }

        writer.flush().context("Failed to flush CSV output")?;
    }

    Ok(buffer)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
