use anyhow::{Context, Result};
use calamine::{open_workbook, DataType as Cell, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;
use tracing::{debug, info};

use crate::table::{Column, Table, Value};

use super::{Decoder, Encoder};

pub struct XlsxDecoder {
    pub sheet_name: Option<String>,
}

impl XlsxDecoder {
    pub fn new() -> Self {
        Self { sheet_name: None }
    }

    pub fn with_sheet(sheet_name: String) -> Self {
        Self {
            sheet_name: Some(sheet_name),
        }
    }
}

impl Default for XlsxDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for XlsxDecoder {
    /// Reads one sheet; the first row holds the column names
    fn decode(&self, input_path: &Path) -> Result<Table> {
        let mut workbook: Xlsx<_> =
            open_workbook(input_path).context("Failed to open XLSX file")?;

        let sheet_name = if let Some(name) = &self.sheet_name {
            name.clone()
        } else {
            workbook
                .sheet_names()
                .first()
                .context("No sheets found in workbook")?
                .clone()
        };

        info!("Reading from sheet: {}", sheet_name);

        let range = workbook
            .worksheet_range(&sheet_name)
            .ok_or_else(|| anyhow::anyhow!("Sheet '{}' not found", sheet_name))?
            .context(format!("Failed to read sheet: {}", sheet_name))?;

        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            debug!("sheet is empty");
            return Ok(Table::default());
        };

        let headers: Vec<String> = header
            .iter()
            .enumerate()
            .map(|(col, cell)| match cell {
                Cell::Empty => format!("column_{}", col),
                cell => datatype_to_string(cell),
            })
            .collect();
        let mut cells: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];

        for row in rows {
            for (col, column) in cells.iter_mut().enumerate() {
                column.push(row.get(col).map_or(Value::Null, cell_value));
            }
        }

        Table::new(
            headers
                .into_iter()
                .zip(cells)
                .map(|(name, values)| Column::new(name, values))
                .collect(),
        )
    }
}

fn cell_value(cell: &Cell) -> Value {
    match cell {
        Cell::Empty => Value::Null,
        Cell::Int(i) => Value::Int(*i),
        Cell::Float(f) => Value::Float(*f),
        Cell::Bool(b) => Value::Bool(*b),
        Cell::String(s) => Value::Str(s.clone()),
        other => Value::Str(datatype_to_string(other)),
    }
}

/// Convert calamine DataType to a string representation
fn datatype_to_string(data: &Cell) -> String {
    match data {
        Cell::Int(i) => i.to_string(),
        Cell::Float(f) => {
            // Whole numbers print without a decimal point
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                format!("{:.0}", f)
            } else {
                f.to_string()
            }
        }
        Cell::String(s) => s.clone(),
        Cell::Bool(b) => b.to_string(),
        Cell::DateTime(dt) => format!("{}", dt),
        Cell::Duration(d) => format!("{}", d),
        Cell::DateTimeIso(dt) => dt.clone(),
        Cell::DurationIso(d) => d.clone(),
        Cell::Error(e) => format!("ERROR: {:?}", e),
        Cell::Empty => String::new(),
    }
}

/// Writes a single worksheet: a bold header row, then one row per table row.
/// Numbers and booleans keep their cell types, nulls are blank cells.
pub struct XlsxEncoder;

impl Encoder for XlsxEncoder {
    fn encode(&self, table: &Table, output_path: &Path) -> Result<()> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        let bold = Format::new().set_bold();

        for (col, column) in table.columns().iter().enumerate() {
            let col = u16::try_from(col).context("Too many columns for a worksheet")?;
            worksheet
                .write_string_with_format(0, col, column.name(), &bold)
                .context("Failed to write header")?;
        }

        for (col, column) in table.columns().iter().enumerate() {
            let col = u16::try_from(col).context("Too many columns for a worksheet")?;
            for (row, value) in column.values().iter().enumerate() {
                let row = u32::try_from(row + 1).context("Too many rows for a worksheet")?;
                match value {
                    Value::Null => continue,
                    Value::Bool(b) => worksheet.write_boolean(row, col, *b),
                    Value::Int(i) => worksheet.write_number(row, col, *i as f64),
                    Value::Float(f) => worksheet.write_number(row, col, *f),
                    Value::Str(s) => worksheet.write_string(row, col, s),
                    Value::Json(v) => worksheet.write_string(row, col, v.to_string()),
                }
                .context(format!("Failed to write cell ({}, {})", row, col))?;
            }
        }

        workbook.save(output_path).context("Failed to save workbook")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::DataType;

    #[test]
    fn test_round_trip_keeps_header_and_cells() {
        let table = Table::new(vec![
            Column::new("name", vec![Value::Str("Alice".into()), Value::Null]),
            Column::new("age", vec![Value::Int(30), Value::Int(25)]),
        ])
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.xlsx");

        XlsxEncoder.encode(&table, &path).unwrap();
        let decoded = XlsxDecoder::new().decode(&path).unwrap();

        assert_eq!(decoded.column_names(), vec!["name", "age"]);
        assert_eq!(
            decoded.column("name").unwrap().values(),
            &[Value::Str("Alice".into()), Value::Null]
        );
        // Spreadsheets store numbers as floats
        let age = decoded.column("age").unwrap();
        assert_eq!(age.data_type(), DataType::Float64);
        assert_eq!(age.values(), &[Value::Float(30.0), Value::Float(25.0)]);
    }

    #[test]
    fn test_datatype_to_string_drops_whole_fraction() {
        assert_eq!(datatype_to_string(&Cell::Float(30.0)), "30");
        assert_eq!(datatype_to_string(&Cell::Float(2.5)), "2.5");
    }
}
