//! Turning nested JSON into flat columns.
//!
//! Records become rows and object keys become columns. Nested objects are
//! flattened into `parent<separator>child` column names up to
//! [`FlattenOptions::max_level`].

use anyhow::{bail, Result};
use indexmap::IndexMap;
use serde_json::Map;
use std::collections::VecDeque;
use tracing::debug;

use crate::table::{Column, DataType, Table, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Joins parent and child keys of nested objects
    pub separator: String,
    /// Levels of nesting to flatten, `None` for all. `Some(0)` keeps nested
    /// objects as single `Object` cells.
    pub max_level: Option<usize>,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            separator: ".".to_string(),
            max_level: None,
        }
    }
}

/// Builds a table from a JSON document: an array of records or a single
/// record. Keys missing from a record are nulls in that row.
pub fn records_to_table(document: serde_json::Value, options: &FlattenOptions) -> Result<Table> {
    let records = match document {
        serde_json::Value::Array(items) => items,
        record @ serde_json::Value::Object(_) => vec![record],
        other => bail!("expected a JSON object or an array of objects, found {}", kind(&other)),
    };

    let mut columns: IndexMap<String, Vec<Value>> = IndexMap::new();
    for (row, record) in records.into_iter().enumerate() {
        let record = match record {
            serde_json::Value::Object(record) => record,
            other => bail!("record {} is {}, expected an object", row, kind(&other)),
        };
        let mut flat = Vec::new();
        flatten_record(record, None, 0, options, &mut flat);
        for (name, value) in flat {
            let cells = columns.entry(name).or_insert_with(|| vec![Value::Null; row]);
            // A key repeated after flattening ("a.b" next to {"a": {"b"}}) keeps the last value
            if cells.len() > row {
                cells.truncate(row);
            }
            cells.push(Value::from_json(value));
        }
        for cells in columns.values_mut() {
            cells.resize(row + 1, Value::Null);
        }
    }

    Table::new(
        columns
            .into_iter()
            .map(|(name, values)| Column::new(name, values))
            .collect(),
    )
}

fn flatten_record(
    record: Map<String, serde_json::Value>,
    prefix: Option<&str>,
    level: usize,
    options: &FlattenOptions,
    out: &mut Vec<(String, serde_json::Value)>,
) {
    for (key, value) in record {
        let name = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, options.separator, key),
            None => key,
        };
        let descend = options.max_level.map_or(true, |max| level < max);
        match value {
            serde_json::Value::Object(nested) if descend && !nested.is_empty() => {
                flatten_record(nested, Some(&name), level + 1, options, out);
            }
            other => out.push((name, other)),
        }
    }
}

/// Expands columns holding stringified JSON objects into new columns.
///
/// Only columns whose first value is a string are tried. The column is
/// replaced only when every value parses to a JSON object and the objects
/// have at least one key; otherwise it is left as it is. New columns land at the end of the table, and a name that
/// already exists gets `_<source column>` appended. New columns are checked
/// in turn, so objects stringified more than once unwrap fully.
pub fn expand_stringified_json(table: &mut Table, options: &FlattenOptions) -> Result<()> {
    let mut pending: VecDeque<String> =
        table.column_names().into_iter().map(str::to_string).collect();

    while let Some(name) = pending.pop_front() {
        let Some(column) = table.column(&name) else {
            continue;
        };
        if !matches!(column.values().first(), Some(Value::Str(_))) {
            continue;
        }
        let Some(nested) = parse_stringified(column, options) else {
            continue;
        };
        // Objects with no keys would leave nothing in place of the column
        if nested.num_columns() == 0 {
            continue;
        }

        debug!(column = %name, new_columns = nested.num_columns(), "expanded stringified JSON");
        table.remove_column(&name);
        for column in nested.columns() {
            let mut new_name = column.name().to_string();
            while table.contains(&new_name) {
                new_name = format!("{}_{}", new_name, name);
            }
            table.push_column(column.clone().renamed(new_name.clone()))?;
            pending.push_back(new_name);
        }
    }
    Ok(())
}

fn parse_stringified(column: &Column, options: &FlattenOptions) -> Option<Table> {
    let mut records = Vec::with_capacity(column.len());
    for value in column.values() {
        let Value::Str(text) = value else {
            return None;
        };
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(record @ serde_json::Value::Object(_)) => records.push(record),
            _ => return None,
        }
    }
    records_to_table(serde_json::Value::Array(records), options).ok()
}

/// Expands one column of JSON objects into sibling columns at its position,
/// one level deep. Stringified objects are parsed first and nulls become
/// rows of nulls. Nested names that already exist in the table get
/// `_<column>` appended.
pub fn expand_object_column(table: &mut Table, name: &str) -> Result<()> {
    let Some(column) = table.column(name) else {
        bail!("no column named '{}'", name);
    };

    let mut records = Vec::with_capacity(column.len());
    for (row, value) in column.values().iter().enumerate() {
        let record = match value {
            Value::Null => serde_json::Value::Object(Map::new()),
            Value::Json(record @ serde_json::Value::Object(_)) => record.clone(),
            Value::Str(text) => match serde_json::from_str(text) {
                Ok(record @ serde_json::Value::Object(_)) => record,
                _ => bail!("column '{}' row {} is not a JSON object", name, row),
            },
            _ => bail!("column '{}' row {} is not a JSON object", name, row),
        };
        records.push(record);
    }

    let rows = records.len();
    let options = FlattenOptions {
        max_level: Some(0),
        ..FlattenOptions::default()
    };
    let nested = records_to_table(serde_json::Value::Array(records), &options)?;

    let Some((position, _)) = table.remove_column(name) else {
        bail!("no column named '{}'", name);
    };
    for (offset, column) in nested.columns().iter().enumerate() {
        let mut new_name = column.name().to_string();
        while table.contains(&new_name) {
            new_name = format!("{}_{}", new_name, name);
        }
        debug_assert_eq!(column.len(), rows);
        table.insert_column(position + offset, column.clone().renamed(new_name))?;
    }
    Ok(())
}

/// Renders `Object` columns as text so every column has an encodable type.
/// Nulls stay null.
pub fn normalize_object_columns(table: &mut Table) -> Result<()> {
    let objects: Vec<String> = table
        .columns()
        .iter()
        .filter(|c| c.data_type() == DataType::Object)
        .map(|c| c.name().to_string())
        .collect();

    for name in objects {
        let Some(column) = table.column(&name) else {
            continue;
        };
        let values = column
            .values()
            .iter()
            .map(|v| match v {
                Value::Null => Value::Null,
                other => Value::Str(other.to_string()),
            })
            .collect();
        table.replace_column(Column::with_type(name.as_str(), DataType::Utf8, values))?;
    }
    Ok(())
}

fn kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
