use anyhow::{Context, Result};
use serde_json::Map;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::flatten::{expand_stringified_json, normalize_object_columns, records_to_table, FlattenOptions};
use crate::table::Table;

use super::{Decoder, Encoder};

/// Reads a JSON document (one record or an array of records) or
/// newline-delimited JSON records
pub struct JsonDecoder {
    pub flatten: FlattenOptions,
    pub expand_json_strings: bool,
}

impl JsonDecoder {
    pub fn new(flatten: FlattenOptions) -> Self {
        Self {
            flatten,
            expand_json_strings: true,
        }
    }

    pub fn expand_json_strings(mut self, enabled: bool) -> Self {
        self.expand_json_strings = enabled;
        self
    }
}

impl Decoder for JsonDecoder {
    fn decode(&self, input_path: &Path) -> Result<Table> {
        let text = fs::read_to_string(input_path)
            .context(format!("Failed to open input file: {:?}", input_path))?;

        let document = match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(document) => document,
            Err(document_err) => {
                // Not a single document, try one record per line
                let records = text
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(serde_json::from_str)
                    .collect::<serde_json::Result<Vec<serde_json::Value>>>();
                match records {
                    Ok(records) => serde_json::Value::Array(records),
                    Err(_) => return Err(document_err).context("Failed to parse JSON"),
                }
            }
        };

        let mut table = records_to_table(document, &self.flatten)?;
        if self.expand_json_strings {
            expand_stringified_json(&mut table, &self.flatten)?;
            normalize_object_columns(&mut table)?;
        }
        debug!(rows = table.num_rows(), columns = table.num_columns(), "read JSON");
        Ok(table)
    }
}

/// Writes one JSON object per row, keys in column order
pub struct NdjsonEncoder;

impl Encoder for NdjsonEncoder {
    fn encode(&self, table: &Table, output_path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(
            File::create(output_path).context("Failed to create output file")?,
        );

        for row in 0..table.num_rows() {
            let mut json_obj = Map::new();
            for column in table.columns() {
                json_obj.insert(column.name().to_string(), column.values()[row].to_json());
            }
            let json_line = serde_json::to_string(&json_obj).context("Failed to serialize JSON")?;
            writeln!(writer, "{}", json_line).context("Failed to write output")?;
        }

        writer.flush().context("Failed to flush output")?;
        Ok(())
    }
}
