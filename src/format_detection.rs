use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Encodings the decoders understand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Json,
    Parquet,
    Avro,
    Xlsx,
}

/// How a CSV file is delimited and quoted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvDialect {
    pub delimiter: u8,
    pub quote: u8,
    /// `None` means RFC 4180 doubled quotes (`""`)
    pub escape: Option<u8>,
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            escape: None,
        }
    }
}

/// Detects the file format based on extension and content
pub fn detect_file_format(file_path: &Path) -> Result<FileFormat> {
    if let Some(ext) = file_path.extension() {
        let ext_str = ext.to_string_lossy().to_lowercase();
        match ext_str.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "excel" => return Ok(FileFormat::Xlsx),
            "csv" | "tsv" | "txt" => return Ok(FileFormat::Csv),
            "json" | "ndjson" | "jsonl" => return Ok(FileFormat::Json),
            "parquet" | "pq" => return Ok(FileFormat::Parquet),
            "avro" => return Ok(FileFormat::Avro),
            _ => {}
        }
    }

    // Unknown extension: sniff the leading bytes
    let file = File::open(file_path).context("Failed to open file for format detection")?;
    let mut head = Vec::with_capacity(512);
    file.take(512)
        .read_to_end(&mut head)
        .context("Failed to read file for format detection")?;

    if head.starts_with(b"PAR1") {
        return Ok(FileFormat::Parquet);
    }
    if head.starts_with(b"Obj\x01") {
        return Ok(FileFormat::Avro);
    }
    // XLSX is a ZIP archive (PK), legacy XLS is OLE2 (D0 CF)
    if head.starts_with(&[0x50, 0x4B]) || head.starts_with(&[0xD0, 0xCF]) {
        return Ok(FileFormat::Xlsx);
    }
    match head.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') | Some(b'[') => Ok(FileFormat::Json),
        _ => Ok(FileFormat::Csv),
    }
}

/// Detects the CSV dialect by analyzing the first lines of the file
pub fn detect_csv_format(file_path: &Path) -> Result<CsvDialect> {
    let file = File::open(file_path).context("Failed to open file for format detection")?;
    let lines = BufReader::new(file)
        .lines()
        .take(250)
        .collect::<std::io::Result<Vec<String>>>()
        .context("Failed to read file for format detection")?;

    let Some((header, rest)) = lines.split_first() else {
        return Ok(CsvDialect::default());
    };

    // A delimiter counts only if every non-empty line has as many as the header.
    // Ties go to the earlier candidate.
    let count = |line: &str, delim: u8| line.bytes().filter(|&c| c == delim).count();
    let delimiter = [b',', b';', b'\t', b'|']
        .into_iter()
        .rev()
        .map(|delim| (delim, count(header, delim)))
        .filter(|&(delim, n)| {
            n > 0 && rest.iter().all(|line| line.is_empty() || count(line, delim) == n)
        })
        .max_by_key(|&(_, n)| n)
        .map(|(delim, _)| delim)
        .unwrap_or(b',');

    // \" without any "" means backslash escaping
    let backslash_escape = lines.iter().any(|line| line.contains("\\\""));
    let doubled_quotes = lines.iter().any(|line| line.contains("\"\""));
    let escape = (backslash_escape && !doubled_quotes).then_some(b'\\');

    Ok(CsvDialect {
        delimiter,
        quote: b'"',
        escape,
    })
}
