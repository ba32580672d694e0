use std::path::PathBuf;

use crate::table::DataType;

/// Failures of a conversion run. Each one ends the run.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("input file does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("output directory does not exist: {}", .0.display())]
    OutputDirNotFound(PathBuf),

    #[error("unsupported output format '{0}' (writable formats: json, avro, parquet, excel)")]
    UnsupportedFormat(String),

    #[error("failed to decode {}: {cause:#}", .path.display())]
    Decode { path: PathBuf, cause: anyhow::Error },

    #[error("failed to encode {}: {cause:#}", .path.display())]
    Encode { path: PathBuf, cause: anyhow::Error },
}

/// A column that could not be coerced to the reference type.
///
/// Only an error under the strict policy; otherwise it is collected and the
/// column is compared with its original type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot coerce column '{column}' from {from} to {to}: value '{value}'")]
pub struct CoercionWarning {
    pub column: String,
    pub from: DataType,
    pub to: DataType,
    pub value: String,
}
