use anyhow::{bail, Context, Result};
use apache_avro::schema::{RecordField, RecordSchema};
use apache_avro::types::Value as AvroValue;
use apache_avro::{Reader, Schema, Writer};
use serde_json::json;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::table::{Column, Table, Value};

use super::{Decoder, Encoder};

/// Record name of the schema written by [`AvroEncoder`]
pub const RECORD_NAME: &str = "Sample";

const COLUMN_ATTRIBUTE: &str = "column_name";

/// Writes a flat record per row where every field is an Avro `string`.
/// Values are rendered as text and nulls as empty strings.
pub struct AvroEncoder;

/// Reads an Avro object container file of flat records
pub struct AvroDecoder;

/// Avro field names for the columns of `table`, in column order.
///
/// Avro names must match `[A-Za-z_][A-Za-z0-9_]*`. Other characters become
/// `_`, a leading digit gets a `_` prefix, and clashes get a numeric suffix.
pub fn avro_field_names(table: &Table) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(table.num_columns());
    for column in table.columns() {
        let base = avro_name(column.name());
        let mut name = base.clone();
        let mut n = 1;
        while names.contains(&name) || (name != column.name() && table.contains(&name)) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        names.push(name);
    }
    names
}

fn avro_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if !out.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        out.insert(0, '_');
    }
    out
}

/// The all-string record schema for `table`. A field whose name had to be
/// changed carries the column name in its `doc` and a `column_name` attribute.
pub fn string_schema(table: &Table) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = table
        .column_names()
        .into_iter()
        .zip(avro_field_names(table))
        .map(|(column, field)| {
            if column == field {
                json!({"name": field, "type": "string"})
            } else {
                json!({"name": field, "type": "string", "doc": column, "column_name": column})
            }
        })
        .collect();
    json!({
        "type": "record",
        "name": RECORD_NAME,
        "fields": fields,
    })
}

impl Encoder for AvroEncoder {
    fn encode(&self, table: &Table, output_path: &Path) -> Result<()> {
        let schema = Schema::parse(&string_schema(table)).context("Failed to build Avro schema")?;
        let field_names = avro_field_names(table);

        let file = File::create(output_path).context("Failed to create output file")?;
        let mut writer = Writer::new(&schema, BufWriter::new(file));

        for row in 0..table.num_rows() {
            let fields = table
                .columns()
                .iter()
                .zip(&field_names)
                .map(|(c, name)| (name.clone(), AvroValue::String(c.values()[row].to_string())))
                .collect();
            writer
                .append(AvroValue::Record(fields))
                .context("Failed to write Avro record")?;
        }

        let mut out = writer.into_inner().context("Failed to finish Avro file")?;
        out.flush().context("Failed to flush output")?;
        Ok(())
    }
}

impl Decoder for AvroDecoder {
    fn decode(&self, input_path: &Path) -> Result<Table> {
        let file = File::open(input_path)
            .context(format!("Failed to open input file: {:?}", input_path))?;
        let reader = Reader::new(BufReader::new(file)).context("Failed to open Avro file")?;

        let names: Vec<String> = match reader.writer_schema() {
            Schema::Record(RecordSchema { fields, .. }) => {
                fields.iter().map(column_name).collect()
            }
            other => bail!("expected an Avro record schema, found {:?}", other),
        };
        let mut cells: Vec<Vec<Value>> = vec![Vec::new(); names.len()];

        for (row, record) in reader.enumerate() {
            let record = record.context("Failed to read Avro record")?;
            let AvroValue::Record(fields) = record else {
                bail!("Avro datum {} is not a record", row);
            };
            for (i, (_, value)) in fields.into_iter().enumerate().take(names.len()) {
                cells[i].push(from_avro(value));
            }
        }

        Table::new(
            names
                .into_iter()
                .zip(cells)
                .map(|(name, values)| Column::new(name, values))
                .collect(),
        )
    }
}

/// The column name for a field: the name recorded when the field name was
/// derived from it, the field name otherwise
fn column_name(field: &RecordField) -> String {
    let recorded = field
        .custom_attributes
        .get(COLUMN_ATTRIBUTE)
        .and_then(|v| v.as_str())
        .or(field.doc.as_deref());
    match recorded {
        Some(column) if derived_from(&field.name, column) => column.to_string(),
        _ => field.name.clone(),
    }
}

fn derived_from(field: &str, column: &str) -> bool {
    let base = avro_name(column);
    field == base
        || field
            .strip_prefix(base.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn from_avro(value: AvroValue) -> Value {
    match value {
        AvroValue::Null => Value::Null,
        AvroValue::Boolean(b) => Value::Bool(b),
        AvroValue::Int(i) => Value::Int(i64::from(i)),
        AvroValue::Long(i) => Value::Int(i),
        AvroValue::Float(f) => Value::Float(f64::from(f)),
        AvroValue::Double(f) => Value::Float(f),
        AvroValue::String(s) | AvroValue::Enum(_, s) => Value::Str(s),
        AvroValue::Union(_, inner) => from_avro(*inner),
        other => Value::Str(format!("{:?}", other)),
    }
}
