use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::codecs::avro::AvroEncoder;
use crate::codecs::json::NdjsonEncoder;
use crate::codecs::parquet::ParquetEncoder;
use crate::codecs::xlsx::XlsxEncoder;
use crate::codecs::{decode_file, DecodeOptions, Encoder};
use crate::compare::{compare_aligned, CoercionPolicy, ComparisonResult};
use crate::error::{CoercionWarning, ConvertError};
use crate::flatten::normalize_object_columns;
use crate::table::Table;

/// Target encodings a conversion can be asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Csv,
    Json,
    Avro,
    Parquet,
    Excel,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Csv,
        OutputFormat::Json,
        OutputFormat::Avro,
        OutputFormat::Parquet,
        OutputFormat::Excel,
    ];

    /// Lowercase name, also used as the output file extension
    pub fn tag(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Avro => "avro",
            OutputFormat::Parquet => "parquet",
            OutputFormat::Excel => "excel",
        }
    }

    /// The encoder behind each format. CSV output has none.
    pub fn encoder(self) -> Option<Box<dyn Encoder>> {
        match self {
            OutputFormat::Csv => None,
            OutputFormat::Json => Some(Box::new(NdjsonEncoder)),
            OutputFormat::Avro => Some(Box::new(AvroEncoder)),
            OutputFormat::Parquet => Some(Box::new(ParquetEncoder)),
            OutputFormat::Excel => Some(Box::new(XlsxEncoder)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for OutputFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        OutputFormat::ALL
            .into_iter()
            .find(|format| format.tag() == wanted)
            .ok_or_else(|| ConvertError::UnsupportedFormat(s.trim().to_string()))
    }
}

/// Outcome of a successful conversion
#[derive(Debug)]
pub struct Conversion {
    pub output_path: PathBuf,
    /// The table that was encoded, after flattening and normalization
    pub table: Table,
}

/// `<output_dir>/<input file stem>.<format tag>`
pub fn output_path_for(input_path: &Path, format: OutputFormat, output_dir: &Path) -> PathBuf {
    let stem = input_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{}.{}", stem, format.tag()))
}

/// Converts `input_path` into `format` inside `output_dir`.
///
/// Paths and the format are checked before anything is read or written. A
/// failed encode may leave a partial output file behind.
pub fn convert(
    input_path: &Path,
    format: OutputFormat,
    output_dir: &Path,
    options: &DecodeOptions,
) -> Result<Conversion, ConvertError> {
    if !input_path.is_file() {
        return Err(ConvertError::InputNotFound(input_path.to_path_buf()));
    }
    if !output_dir.is_dir() {
        return Err(ConvertError::OutputDirNotFound(output_dir.to_path_buf()));
    }
    let encoder = format
        .encoder()
        .ok_or_else(|| ConvertError::UnsupportedFormat(format.tag().to_string()))?;
    let output_path = output_path_for(input_path, format, output_dir);

    let decode_err = |cause: anyhow::Error| ConvertError::Decode {
        path: input_path.to_path_buf(),
        cause,
    };
    let mut table = decode_file(input_path, options).map_err(decode_err)?;
    normalize_object_columns(&mut table).map_err(decode_err)?;
    info!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        "decoded {}",
        input_path.display()
    );

    encoder
        .encode(&table, &output_path)
        .map_err(|cause| ConvertError::Encode {
            path: output_path.clone(),
            cause,
        })?;
    info!(format = %format, "wrote {}", output_path.display());

    Ok(Conversion { output_path, table })
}

/// Reads a converted file back and compares it with the table it was
/// written from
pub fn verify_conversion(
    source: &Table,
    output_path: &Path,
    policy: CoercionPolicy,
) -> Result<(ComparisonResult, Vec<CoercionWarning>), VerifyError> {
    let options = DecodeOptions {
        expand_json_strings: false,
        ..DecodeOptions::default()
    };
    let written = decode_file(output_path, &options).map_err(|cause| ConvertError::Decode {
        path: output_path.to_path_buf(),
        cause,
    })?;
    Ok(compare_aligned(source.clone(), written, policy)?)
}

/// Why a verification could not produce a result
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Coercion(#[from] CoercionWarning),
}
