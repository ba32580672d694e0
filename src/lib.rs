pub mod codecs;
pub mod compare;
pub mod convert;
pub mod error;
pub mod flatten;
pub mod format_detection;
pub mod table;
pub mod value_conversion;

// Re-export commonly used items for convenience
pub use codecs::{decode_file, DecodeOptions, Decoder, Encoder};
pub use compare::{align, compare, compare_aligned, Alignment, CoercionPolicy, ComparisonResult};
pub use convert::{convert, output_path_for, verify_conversion, Conversion, OutputFormat, VerifyError};
pub use error::{CoercionWarning, ConvertError};
pub use flatten::{expand_object_column, FlattenOptions};
pub use format_detection::{detect_csv_format, detect_file_format, CsvDialect, FileFormat};
pub use table::{Column, DataType, Field, Table, Value};
