pub mod avro;
pub mod csv;
pub mod json;
pub mod parquet;
pub mod xlsx;

use anyhow::Result;
use std::path::Path;
use tracing::info;

use crate::flatten::FlattenOptions;
use crate::format_detection::{detect_csv_format, detect_file_format, CsvDialect, FileFormat};
use crate::table::Table;

/// Reads a whole file into a table
pub trait Decoder {
    fn decode(&self, input_path: &Path) -> Result<Table>;
}

/// Writes a whole table to a file
pub trait Encoder {
    fn encode(&self, table: &Table, output_path: &Path) -> Result<()>;
}

/// Settings for every decoder, threaded from the command line
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// CSV dialect, detected from the file when `None`
    pub dialect: Option<CsvDialect>,
    /// Keep all CSV cells as strings
    pub no_type_conversion: bool,
    /// CSV columns that always stay strings
    pub string_fields: Vec<String>,
    /// Excel sheet to read, the first one when `None`
    pub sheet: Option<String>,
    pub flatten: FlattenOptions,
    /// Expand JSON string columns that hold stringified objects
    pub expand_json_strings: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            dialect: None,
            no_type_conversion: false,
            string_fields: Vec::new(),
            sheet: None,
            flatten: FlattenOptions::default(),
            expand_json_strings: true,
        }
    }
}

/// Decodes `input_path` with the decoder for its detected format
pub fn decode_file(input_path: &Path, options: &DecodeOptions) -> Result<Table> {
    let format = detect_file_format(input_path)?;
    info!(path = %input_path.display(), ?format, "decoding input");

    match format {
        FileFormat::Csv => {
            let dialect = match options.dialect {
                Some(dialect) => dialect,
                None => detect_csv_format(input_path)?,
            };
            csv::CsvDecoder::new(dialect)
                .with_type_conversion(!options.no_type_conversion)
                .with_string_fields(options.string_fields.clone())
                .decode(input_path)
        }
        FileFormat::Json => json::JsonDecoder::new(options.flatten.clone())
            .expand_json_strings(options.expand_json_strings)
            .decode(input_path),
        FileFormat::Parquet => parquet::ParquetDecoder.decode(input_path),
        FileFormat::Avro => avro::AvroDecoder.decode(input_path),
        FileFormat::Xlsx => {
            let decoder = match &options.sheet {
                Some(name) => xlsx::XlsxDecoder::with_sheet(name.clone()),
                None => xlsx::XlsxDecoder::new(),
            };
            decoder.decode(input_path)
        }
    }
}
