use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

use crate::format_detection::CsvDialect;
use crate::table::{Column, Table};
use crate::value_conversion::{infer_column_type, parse_field};

use super::Decoder;

pub struct CsvDecoder {
    pub dialect: CsvDialect,
    pub type_conversion: bool,
    pub string_fields: Vec<String>,
}

impl CsvDecoder {
    pub fn new(dialect: CsvDialect) -> Self {
        Self {
            dialect,
            type_conversion: true,
            string_fields: Vec::new(),
        }
    }

    pub fn with_type_conversion(mut self, enabled: bool) -> Self {
        self.type_conversion = enabled;
        self
    }

    pub fn with_string_fields(mut self, string_fields: Vec<String>) -> Self {
        self.string_fields = string_fields;
        self
    }
}

impl Decoder for CsvDecoder {
    /// Reads a headed CSV file; column types are inferred per column
    fn decode(&self, input_path: &Path) -> Result<Table> {
        let file = File::open(input_path)
            .context(format!("Failed to open input file: {:?}", input_path))?;

        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(self.dialect.delimiter)
            .quote(self.dialect.quote)
            .flexible(true) // Handle varying column counts
            .has_headers(true);

        if let Some(esc) = self.dialect.escape {
            builder.escape(Some(esc)).double_quote(false);
        } else {
            builder.double_quote(true);
        }

        let mut reader = builder.from_reader(BufReader::with_capacity(32 * 1024, file));

        let mut headers = dedup_headers(
            reader
                .headers()
                .context("Failed to read CSV headers")?
                .iter(),
        );
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];

        let mut record_count = 0;
        for result in reader.records() {
            let record = result.context("Failed to read CSV record")?;

            // Fields past the header get a generated name, earlier rows are padded
            while headers.len() < record.len() {
                let mut name = format!("column_{}", headers.len());
                while headers.contains(&name) {
                    name.push('_');
                }
                headers.push(name);
                cells.push(vec![String::new(); record_count]);
            }
            for (i, column) in cells.iter_mut().enumerate() {
                column.push(record.get(i).unwrap_or_default().to_string());
            }
            record_count += 1;
        }
        debug!(records = record_count, columns = headers.len(), "read CSV");

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, fields)| {
                let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
                let data_type = infer_column_type(
                    &fields,
                    &name,
                    !self.type_conversion,
                    &self.string_fields,
                );
                let values = fields.iter().map(|f| parse_field(f, data_type)).collect();
                Column::with_type(name, data_type, values)
            })
            .collect();

        Table::new(columns)
    }
}

/// Repeated header names get a `.1`, `.2`, ... suffix in order of appearance
fn dedup_headers<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for name in names {
        let mut unique = name.to_string();
        let mut n = 1;
        while headers.contains(&unique) {
            unique = format!("{}.{}", name, n);
            n += 1;
        }
        headers.push(unique);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{DataType, Value};
    use std::io::Write;

    fn decode(content: &str, decoder: CsvDecoder) -> Table {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        decoder.decode(file.path()).unwrap()
    }

    #[test]
    fn test_types_inferred_per_column() {
        let table = decode(
            "name,age,active\nAlice,30,true\nBob,25,false\n",
            CsvDecoder::new(CsvDialect::default()),
        );
        assert_eq!(table.column("age").unwrap().data_type(), DataType::Int64);
        assert_eq!(table.column("active").unwrap().data_type(), DataType::Boolean);
        assert_eq!(table.column("name").unwrap().data_type(), DataType::Utf8);
        assert_eq!(table.num_rows(), 2);
    }

    #[test]
    fn test_extra_fields_get_generated_names() {
        let table = decode(
            "a,b\n1,2\n3,4,5\n",
            CsvDecoder::new(CsvDialect::default()),
        );
        assert_eq!(table.column_names(), vec!["a", "b", "column_2"]);
        assert_eq!(
            table.column("column_2").unwrap().values(),
            &[Value::Null, Value::Int(5)]
        );
    }

    #[test]
    fn test_repeated_headers_are_renamed() {
        let table = decode("a,a,b,a\n1,2,3,4\n", CsvDecoder::new(CsvDialect::default()));
        assert_eq!(table.column_names(), vec!["a", "a.1", "b", "a.2"]);
        assert_eq!(table.column("a.1").unwrap().values(), &[Value::Int(2)]);
    }

    #[test]
    fn test_short_rows_are_padded_with_nulls() {
        let table = decode("a,b\n1\n", CsvDecoder::new(CsvDialect::default()));
        assert_eq!(table.column("b").unwrap().values(), &[Value::Null]);
    }

    #[test]
    fn test_backslash_escape() {
        let dialect = CsvDialect {
            escape: Some(b'\\'),
            ..CsvDialect::default()
        };
        let table = decode(
            "name\n\"Bob \\\"Bobby\\\" Smith\"\n",
            CsvDecoder::new(dialect),
        );
        assert_eq!(
            table.column("name").unwrap().values(),
            &[Value::Str("Bob \"Bobby\" Smith".into())]
        );
    }

    #[test]
    fn test_no_type_conversion_keeps_strings() {
        let table = decode(
            "age\n30\n",
            CsvDecoder::new(CsvDialect::default()).with_type_conversion(false),
        );
        assert_eq!(table.column("age").unwrap().values(), &[Value::Str("30".into())]);
    }
}
