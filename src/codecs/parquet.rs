use anyhow::{bail, Context, Result};
use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType as ArrowType, Field as ArrowField, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use crate::table::{Column, DataType, Table, Value};

use super::{Decoder, Encoder};

/// Reads every row group of a Parquet file
pub struct ParquetDecoder;

/// Writes the table as a single record batch, one nullable column each
pub struct ParquetEncoder;

fn table_type(arrow_type: &ArrowType) -> DataType {
    match arrow_type {
        ArrowType::Boolean => DataType::Boolean,
        ArrowType::Int8
        | ArrowType::Int16
        | ArrowType::Int32
        | ArrowType::Int64
        | ArrowType::UInt8
        | ArrowType::UInt16
        | ArrowType::UInt32
        | ArrowType::UInt64 => DataType::Int64,
        ArrowType::Float16 | ArrowType::Float32 | ArrowType::Float64 => DataType::Float64,
        _ => DataType::Utf8,
    }
}

fn arrow_type(data_type: DataType) -> ArrowType {
    match data_type {
        DataType::Boolean => ArrowType::Boolean,
        DataType::Int64 => ArrowType::Int64,
        DataType::Float64 => ArrowType::Float64,
        DataType::Utf8 | DataType::Object => ArrowType::Utf8,
    }
}

/// Appends the cells of `array` as values of `data_type`
fn read_array(array: &ArrayRef, data_type: DataType, out: &mut Vec<Value>) -> Result<()> {
    match data_type {
        DataType::Boolean => {
            let array = array.as_boolean();
            out.extend(array.iter().map(|v| v.map_or(Value::Null, Value::Bool)));
        }
        DataType::Int64 => {
            let array = cast(array, &ArrowType::Int64).context("Failed to widen integer column")?;
            let array = array.as_primitive::<Int64Type>();
            out.extend(array.iter().map(|v| v.map_or(Value::Null, Value::Int)));
        }
        DataType::Float64 => {
            let array = cast(array, &ArrowType::Float64).context("Failed to widen float column")?;
            let array = array.as_primitive::<Float64Type>();
            out.extend(array.iter().map(|v| v.map_or(Value::Null, Value::Float)));
        }
        DataType::Utf8 | DataType::Object => {
            for row in 0..array.len() {
                if array.is_null(row) {
                    out.push(Value::Null);
                } else {
                    out.push(Value::Str(array_value_to_string(array, row)?));
                }
            }
        }
    }
    Ok(())
}

fn write_array(column: &Column) -> ArrayRef {
    let values = column.values();
    match column.data_type() {
        DataType::Boolean => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        DataType::Int64 => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Value::Int(i) => Some(*i),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        DataType::Float64 => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Value::Float(f) => Some(*f),
                    Value::Int(i) => Some(*i as f64),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        DataType::Utf8 | DataType::Object => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Value::Null => None,
                    Value::Str(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect::<StringArray>(),
        ),
    }
}

impl Decoder for ParquetDecoder {
    fn decode(&self, input_path: &Path) -> Result<Table> {
        let file = File::open(input_path)
            .context(format!("Failed to open input file: {:?}", input_path))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .context("Failed to open Parquet file")?;

        let schema = builder.schema().clone();
        let types: Vec<DataType> = schema
            .fields()
            .iter()
            .map(|f| table_type(f.data_type()))
            .collect();
        let mut cells: Vec<Vec<Value>> = vec![Vec::new(); types.len()];

        let reader = builder.build().context("Failed to build Parquet reader")?;
        for batch in reader {
            let batch = batch.context("Failed to read Parquet record batch")?;
            for (i, array) in batch.columns().iter().enumerate() {
                read_array(array, types[i], &mut cells[i])?;
            }
        }

        let columns = schema
            .fields()
            .iter()
            .zip(types)
            .zip(cells)
            .map(|((field, data_type), values)| Column::with_type(field.name(), data_type, values))
            .collect();
        Table::new(columns)
    }
}

impl Encoder for ParquetEncoder {
    fn encode(&self, table: &Table, output_path: &Path) -> Result<()> {
        if table.num_columns() == 0 {
            bail!("cannot write a table without columns to Parquet");
        }

        let fields: Vec<ArrowField> = table
            .columns()
            .iter()
            .map(|c| ArrowField::new(c.name(), arrow_type(c.data_type()), true))
            .collect();
        let schema = Arc::new(Schema::new(fields));
        let arrays: Vec<ArrayRef> = table.columns().iter().map(write_array).collect();
        let batch = RecordBatch::try_new(schema.clone(), arrays)
            .context("Failed to build record batch")?;

        let file = File::create(output_path).context("Failed to create output file")?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))
            .context("Failed to create Parquet writer")?;
        writer.write(&batch).context("Failed to write record batch")?;
        writer.close().context("Failed to finish Parquet file")?;
        Ok(())
    }
}
