use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::models::ticket::{RawTicket, PERSON_FIELDS};

/// Flat column-to-scalar mapping for one ticket, in column insertion
/// order. Built once per record, never mutated afterwards.
pub type NormalizedRow = Vec<(String, Value)>;

const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Nested source keys replaced by their expansions.
const EXPANDED_KEYS: [&str; 4] = ["owner", "createdBy", "customFieldValues", "actions"];

/// Flattens one raw ticket into scalar columns.
///
/// Never fails: a field that cannot be interpreted degrades to null and
/// the record is still emitted, so the table always gets one row per
/// fetched ticket.
pub fn normalize(raw: &RawTicket) -> NormalizedRow {
    let mut row: NormalizedRow = Vec::with_capacity(raw.len() + PERSON_FIELDS.len() * 2);

    for (key, value) in raw {
        if EXPANDED_KEYS.contains(&key.as_str()) {
            continue;
        }
        row.push((key.clone(), scalarize(key, value)));
    }

    row.push((
        "first_action_description".to_string(),
        first_action_description(raw.get("actions")),
    ));
    row.extend(expand_person("owner", raw.get("owner")));
    row.extend(expand_custom_fields(raw.get("customFieldValues")));
    row.extend(expand_person("createdBy", raw.get("createdBy")));

    row
}

/// Flattens the narrow `$select=id,actions` ticket shape into one row per
/// action, each stamped with the owning ticket's id. Kept separate from
/// the full-shape table; the two are only joinable on `ticketId`.
pub fn normalize_actions(raw: &RawTicket) -> Vec<NormalizedRow> {
    let Some(ticket_id) = raw.get("id") else {
        return Vec::new();
    };
    let Some(actions) = raw.get("actions").and_then(Value::as_array) else {
        return Vec::new();
    };

    actions
        .iter()
        .filter_map(|action| {
            let fields = action.as_object()?;
            let mut row: NormalizedRow = vec![("ticketId".to_string(), ticket_id.clone())];
            for (key, value) in fields {
                row.push((key.clone(), scalarize(key, value)));
            }
            Some(row)
        })
        .collect()
}

/// Total person expansion: a populated object, a null, or a missing key
/// all produce the same `<prefix>_*` column set.
pub fn expand_person(prefix: &str, person: Option<&Value>) -> NormalizedRow {
    let fields = person.and_then(Value::as_object);
    PERSON_FIELDS
        .iter()
        .map(|field| {
            let column = format!("{}_{}", prefix, field);
            let value = fields
                .and_then(|person| person.get(*field))
                .map(|value| scalarize(&column, value))
                .unwrap_or(Value::Null);
            (column, value)
        })
        .collect()
}

fn expand_custom_fields(values: Option<&Value>) -> NormalizedRow {
    let empty = Vec::new();
    let list = values.and_then(Value::as_array).unwrap_or(&empty);

    list.iter()
        .filter_map(|field| {
            let field = field.as_object()?;
            let id = match field.get("customFieldId")? {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((format!("customField_{}", id), resolve_custom_field(field)))
        })
        .collect()
}

/// Effective value of a custom field: `value` when present and non-empty,
/// else the first item's `customFieldItem`, else null.
fn resolve_custom_field(field: &serde_json::Map<String, Value>) -> Value {
    match field.get("value") {
        Some(Value::Null) | None => {}
        Some(Value::String(s)) if s.is_empty() => {}
        Some(value) => return scalarize("customField", value),
    }

    field
        .get("items")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(Value::as_object)
        .and_then(|item| item.get("customFieldItem"))
        .cloned()
        .unwrap_or(Value::Null)
}

fn first_action_description(actions: Option<&Value>) -> Value {
    actions
        .and_then(Value::as_array)
        .and_then(|actions| actions.first())
        .and_then(Value::as_object)
        .and_then(|action| action.get("description"))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Forces a value into scalar form. Date-marked columns are reformatted
/// for display; anything still nested becomes its compact JSON text.
fn scalarize(column: &str, value: &Value) -> Value {
    match value {
        Value::String(s) if is_date_column(column) => reformat_date(s),
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        other => other.clone(),
    }
}

fn is_date_column(name: &str) -> bool {
    name == "resolvedIn" || name.to_ascii_lowercase().contains("date")
}

/// ISO-8601 source timestamp to `DD/MM/YYYY HH:MM`; unparseable input
/// becomes null rather than an error.
fn reformat_date(source: &str) -> Value {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(source) {
        return Value::String(parsed.format(DISPLAY_DATE_FORMAT).to_string());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(source, "%Y-%m-%dT%H:%M:%S%.f") {
        return Value::String(parsed.format(DISPLAY_DATE_FORMAT).to_string());
    }
    if let Some(midnight) = NaiveDate::parse_from_str(source, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
    {
        return Value::String(midnight.format(DISPLAY_DATE_FORMAT).to_string());
    }
    Value::Null
}
