//! Flatten/normalize engine
//!
//! Stateless transformations from nested upstream JSON to flat records. Each
//! function consumes its input and returns a new set of records; nothing is
//! cached between calls.
//!
//! Key collisions: [`flatten_nested_object`] lets the nested value overwrite a
//! top-level column of the same name. The merged keys take the position of the
//! nested field in column order only when they are new; an overwritten column
//! keeps its original position. Use [`flatten_nested_object_prefixed`] when both
//! values must survive.

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{Error, Result};
use crate::types::NOT_AVAILABLE;

/// One flat (or partially flattened) row
pub type Record = Map<String, Value>;

/// Separator used for derived column names and composite keys
pub const KEY_SEPARATOR: &str = "_";

/// Emit one record per element of the list at `list_field`
///
/// Sibling fields are copied unchanged and the list is replaced by the single
/// element. An empty list or `null` yields no rows ("no data for this round").
/// A record without `list_field` and a non-list value are passed through as a
/// single row.
pub fn explode_nested_list(records: Vec<Record>, list_field: &str) -> Vec<Record> {
    let mut out = Vec::with_capacity(records.len());

    for mut record in records {
        match record.get_mut(list_field).map(Value::take) {
            Some(Value::Array(items)) => {
                for item in items {
                    let mut row = record.clone();
                    row.insert(list_field.to_string(), item);
                    out.push(row);
                }
            }
            Some(Value::Null) => {}
            None => out.push(record),
            Some(other) => {
                record.insert(list_field.to_string(), other);
                out.push(record);
            }
        }
    }

    out
}

/// Merge the object at `object_field` into its record as sibling columns
///
/// The nested value wins on a key collision. Records where the field is absent
/// or not an object are returned untouched.
pub fn flatten_nested_object(records: Vec<Record>, object_field: &str) -> Vec<Record> {
    records
        .into_iter()
        .map(|record| merge_field(record, object_field, None))
        .collect()
}

/// Like [`flatten_nested_object`] but every nested key becomes `{prefix}_{key}`
pub fn flatten_nested_object_prefixed(
    records: Vec<Record>,
    object_field: &str,
    prefix: &str,
) -> Vec<Record> {
    records
        .into_iter()
        .map(|record| merge_field(record, object_field, Some(prefix)))
        .collect()
}

/// Spread a list of objects into columns of a single row
///
/// The first element's keys become `{prefix}_{key}`, the n-th element's (n ≥ 2)
/// `{prefix}_{n}_{key}`. Non-object elements are skipped and the list field is
/// removed. Records without a list at `list_field` are returned untouched.
pub fn spread_nested_list(records: Vec<Record>, list_field: &str, prefix: &str) -> Vec<Record> {
    records
        .into_iter()
        .map(|mut record| {
            if !record.get(list_field).is_some_and(Value::is_array) {
                return record;
            }
            let Some(Value::Array(items)) = record.get_mut(list_field).map(Value::take) else {
                return record;
            };
            let mut spread = Map::new();
            for (i, item) in items.into_iter().enumerate() {
                let Value::Object(fields) = item else { continue };
                let label = match i {
                    0 => prefix.to_string(),
                    n => format!("{prefix}{KEY_SEPARATOR}{}", n + 1),
                };
                for (key, value) in fields {
                    spread.insert(format!("{label}{KEY_SEPARATOR}{key}"), value);
                }
            }
            record.insert(list_field.to_string(), Value::Object(spread));
            merge_field(record, list_field, None)
        })
        .collect()
}

/// Parse string-encoded structured literals and spread them as `{column}_{subkey}`
///
/// Cells that already hold an object are spread as-is. A cell that fails to
/// parse contributes nothing (it is treated as an empty object) and is logged.
/// The source column is removed.
pub fn expand_json_string_columns(records: Vec<Record>, columns: &[&str]) -> Vec<Record> {
    records
        .into_iter()
        .map(|mut record| {
            for column in columns {
                let nested = match record.shift_remove(*column) {
                    Some(Value::String(text)) => parse_structured_literal(&text)
                        .unwrap_or_else(|e| {
                            warn!(column = %column, value = %text, error = %e, "Could not expand cell");
                            Map::new()
                        }),
                    Some(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                for (key, value) in nested {
                    record.insert(format!("{column}{KEY_SEPARATOR}{key}"), value);
                }
            }
            record
        })
        .collect()
}

/// Add `column` holding the named fields joined with `_`
///
/// Absent fields contribute [`NOT_AVAILABLE`].
pub fn build_composite_key(records: Vec<Record>, key_fields: &[&str], column: &str) -> Vec<Record> {
    records
        .into_iter()
        .map(|mut record| {
            let key = key_fields
                .iter()
                .map(|field| match record.get(*field) {
                    Some(value) if !value.is_null() => cell_text(value),
                    _ => NOT_AVAILABLE.to_string(),
                })
                .collect::<Vec<_>>()
                .join(KEY_SEPARATOR);
            record.insert(column.to_string(), Value::String(key));
            record
        })
        .collect()
}

/// Remove bookkeeping columns
pub fn drop_columns(records: Vec<Record>, columns: &[&str]) -> Vec<Record> {
    records
        .into_iter()
        .map(|mut record| {
            for column in columns {
                record.shift_remove(*column);
            }
            record
        })
        .collect()
}

/// Render a cell as text: strings verbatim, null empty, containers as compact JSON
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Parse a string holding a structured literal into an object
///
/// JSON is tried first. Failing that, the text is read as a Python-style
/// literal (single-quoted strings, `True`/`False`/`None`), which is how nested
/// columns look in tables written by older tooling.
pub fn parse_structured_literal(text: &str) -> Result<Map<String, Value>> {
    let trimmed = text.trim();
    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(_) => serde_json::from_str::<Value>(&python_literal_to_json(trimmed))
            .map_err(|e| Error::Parse(format!("'{trimmed}': {e}")))?,
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::Parse(format!(
            "expected a mapping, found {}",
            type_name(&other)
        ))),
    }
}

fn merge_field(mut record: Record, field: &str, prefix: Option<&str>) -> Record {
    let Some(index) = record.keys().position(|key| key == field) else {
        return record;
    };
    if !record[field].is_object() {
        return record;
    }
    let Some(Value::Object(nested)) = record.shift_remove(field) else {
        return record;
    };

    // New keys land where the nested field used to be
    let mut position = index;
    for (key, value) in nested {
        let key = match prefix {
            Some(prefix) => format!("{prefix}{KEY_SEPARATOR}{key}"),
            None => key,
        };
        if let Some(existing) = record.get_mut(&key) {
            *existing = value;
        } else {
            record.shift_insert(position, key, value);
            position += 1;
        }
    }
    record
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

/// Rewrite Python literal syntax into JSON; anything unrecognised is copied through
fn python_literal_to_json(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' | '"' => {
                let quote = ch;
                out.push('"');
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                if escaped == '\'' {
                                    out.push('\'');
                                } else {
                                    out.push('\\');
                                    out.push(escaped);
                                }
                            }
                        }
                        '"' if quote == '\'' => out.push_str("\\\""),
                        c if c == quote => break,
                        c => out.push(c),
                    }
                }
                out.push('"');
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    "None" => out.push_str("null"),
                    _ => out.push_str(&word),
                }
            }
            c => out.push(c),
        }
    }

    out
}
