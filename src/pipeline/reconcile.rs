use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::pipeline::normalize::NormalizedRow;
use crate::pipeline::table::Table;

/// Merges rows with differing key sets into one rectangular table.
///
/// The column set is the union of every key ever produced by any row, in
/// first-seen order; each row is re-emitted with every column present,
/// null where that row had no value. Ragged input is the expected case.
/// Zero rows yield an empty table, not an error.
pub fn reconcile(rows: Vec<NormalizedRow>) -> Table {
    let mut columns: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for row in &rows {
        for (key, _) in row {
            if seen.insert(key.clone()) {
                columns.push(key.clone());
            }
        }
    }

    let table_rows = {
        let index: HashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(position, column)| (column.as_str(), position))
            .collect();

        rows.into_iter()
            .map(|row| {
                let mut filled = vec![Value::Null; columns.len()];
                for (key, value) in row {
                    if let Some(&position) = index.get(key.as_str()) {
                        filled[position] = value;
                    }
                }
                filled
            })
            .collect()
    };

    Table::new(columns, table_rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize::normalize;
    use serde_json::json;

    #[test]
    fn test_empty_input_yields_empty_table() {
        let table = reconcile(Vec::new());
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.column_count(), 0);
    }

    #[test]
    fn test_union_of_columns_in_first_seen_order() {
        let rows = vec![
            vec![("a".to_string(), json!(1)), ("b".to_string(), json!(2))],
            vec![("b".to_string(), json!(3)), ("c".to_string(), json!(4))],
        ];
        let table = reconcile(rows);

        assert_eq!(table.columns(), ["a", "b", "c"]);
        assert_eq!(table.rows()[0], vec![json!(1), json!(2), Value::Null]);
        assert_eq!(table.rows()[1], vec![Value::Null, json!(3), json!(4)]);
    }

    #[test]
    fn test_ragged_rows_are_kept_not_dropped() {
        let rows = vec![
            vec![("a".to_string(), json!(1))],
            vec![],
            vec![("b".to_string(), json!(2))],
        ];
        let table = reconcile(rows);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows()[1], vec![Value::Null, Value::Null]);
    }

    #[test]
    fn test_row_insertion_order_preserved() {
        let rows = vec![
            vec![("id".to_string(), json!(3))],
            vec![("id".to_string(), json!(1))],
            vec![("id".to_string(), json!(2))],
        ];
        let table = reconcile(rows);
        let ids: Vec<&Value> = table.rows().iter().map(|row| &row[0]).collect();
        assert_eq!(ids, [&json!(3), &json!(1), &json!(2)]);
    }

    // End-to-end shape check: a fully nested ticket next to a bare
    // `{id: 2}` still reconciles to one rectangular table.
    #[test]
    fn test_full_and_bare_tickets_reconcile_rectangular() {
        let full = json!({
            "id": 1,
            "subject": "printer on fire",
            "owner": {"id": "u1", "email": "owner@x.com"},
            "createdBy": {"id": "u2", "email": "creator@x.com"},
            "customFieldValues": [{"customFieldId": 10, "value": "urgent"}],
            "actions": [{"description": "it burns"}]
        });
        let bare = json!({"id": 2});

        let rows = vec![
            normalize(full.as_object().unwrap()),
            normalize(bare.as_object().unwrap()),
        ];
        let table = reconcile(rows);

        assert_eq!(table.row_count(), 2);
        for row in table.rows() {
            assert_eq!(row.len(), table.column_count());
        }

        let cell = |row: usize, name: &str| {
            &table.rows()[row][table.column_index(name).unwrap()]
        };
        assert_eq!(cell(1, "id"), &json!(2));
        for column in [
            "owner_id",
            "owner_email",
            "createdBy_email",
            "customField_10",
            "first_action_description",
        ] {
            assert_eq!(cell(1, column), &Value::Null, "{} should be null", column);
        }
        assert_eq!(cell(0, "customField_10"), &json!("urgent"));
        assert_eq!(cell(0, "first_action_description"), &json!("it burns"));
    }
}
