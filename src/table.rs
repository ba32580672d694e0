use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Boolean,
    Int64,
    Float64,
    Utf8,
    /// Mixed, nested or untyped values
    Object,
}

impl DataType {
    /// Type of a single value, `None` for nulls
    pub fn of(value: &Value) -> Option<DataType> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(DataType::Boolean),
            Value::Int(_) => Some(DataType::Int64),
            Value::Float(_) => Some(DataType::Float64),
            Value::Str(_) => Some(DataType::Utf8),
            Value::Json(_) => Some(DataType::Object),
        }
    }

    /// Unifies the types of all non-null values.
    ///
    /// Integers mixed with floats widen to `Float64`, any other mix (or a
    /// column with no non-null value) is `Object`.
    pub fn unify<'a>(values: impl IntoIterator<Item = &'a Value>) -> DataType {
        let mut unified: Option<DataType> = None;
        for value in values {
            let Some(current) = DataType::of(value) else {
                continue;
            };
            unified = Some(match (unified, current) {
                (None, t) => t,
                (Some(a), b) if a == b => a,
                (Some(DataType::Int64), DataType::Float64)
                | (Some(DataType::Float64), DataType::Int64) => DataType::Float64,
                _ => return DataType::Object,
            });
        }
        unified.unwrap_or(DataType::Object)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Boolean => "boolean",
            DataType::Int64 => "int64",
            DataType::Float64 => "float64",
            DataType::Utf8 => "utf8",
            DataType::Object => "object",
        };
        f.write_str(name)
    }
}

/// A single cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Arrays and objects that were not flattened into columns
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Cell equality used by the comparator: type-sensitive, NaN equals NaN
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Json(v) => v.clone(),
        }
    }

    pub fn from_json(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Str(s),
            other => Value::Json(other),
        }
    }
}

/// Text rendering used when a value has to become a string. Nulls render
/// empty and floats keep a fractional part (`1.0`, not `1`).
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => f.write_str(s),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

/// Name and declared type of a column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data_type: DataType,
    values: Vec<Value>,
}

impl Column {
    /// Builds a column whose type is inferred from its values
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        let data_type = DataType::unify(&values);
        let values = if data_type == DataType::Float64 {
            values
                .into_iter()
                .map(|v| match v {
                    Value::Int(i) => Value::Float(i as f64),
                    other => other,
                })
                .collect()
        } else {
            values
        };
        Self {
            name: name.into(),
            data_type,
            values,
        }
    }

    /// Builds a column with an explicit type. Callers guarantee every
    /// non-null value matches it.
    pub fn with_type(name: impl Into<String>, data_type: DataType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            data_type,
            values,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn field(&self) -> Field {
        Field {
            name: self.name.clone(),
            data_type: self.data_type,
        }
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Ordered, uniquely named columns of equal length
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut table = Table::default();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn fields(&self) -> Vec<Field> {
        self.columns.iter().map(Column::field).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    fn check_insertable(&self, column: &Column) -> Result<()> {
        if self.contains(&column.name) {
            bail!("duplicate column name '{}'", column.name);
        }
        if !self.columns.is_empty() && column.len() != self.num_rows() {
            bail!(
                "column '{}' has {} rows, table has {}",
                column.name,
                column.len(),
                self.num_rows()
            );
        }
        Ok(())
    }

    pub fn push_column(&mut self, column: Column) -> Result<()> {
        self.check_insertable(&column)?;
        self.columns.push(column);
        Ok(())
    }

    pub fn insert_column(&mut self, index: usize, column: Column) -> Result<()> {
        self.check_insertable(&column)?;
        self.columns.insert(index.min(self.columns.len()), column);
        Ok(())
    }

    /// Replaces the column with the same name, returning the old one
    pub fn replace_column(&mut self, column: Column) -> Result<Column> {
        let Some(index) = self.position(&column.name) else {
            bail!("no column named '{}'", column.name);
        };
        if column.len() != self.num_rows() {
            bail!(
                "column '{}' has {} rows, table has {}",
                column.name,
                column.len(),
                self.num_rows()
            );
        }
        Ok(std::mem::replace(&mut self.columns[index], column))
    }

    /// Removes a column, returning it with its former position
    pub fn remove_column(&mut self, name: &str) -> Option<(usize, Column)> {
        let index = self.position(name)?;
        Some((index, self.columns.remove(index)))
    }

    /// Projects the table onto `names`, in that order
    pub fn select(&self, names: &[&str]) -> Result<Table> {
        let mut columns = Vec::with_capacity(names.len());
        let mut seen = HashSet::new();
        for name in names {
            if !seen.insert(*name) {
                bail!("column '{}' selected twice", name);
            }
            match self.column(name) {
                Some(column) => columns.push(column.clone()),
                None => bail!("no column named '{}'", name),
            }
        }
        Ok(Table { columns })
    }
}
