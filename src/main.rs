use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use table_converter::{
    compare, compare_aligned, convert, decode_file, detect_csv_format, detect_file_format,
    expand_object_column, verify_conversion, CoercionPolicy, ComparisonResult, ConvertError,
    CsvDialect, DecodeOptions, FileFormat, FlattenOptions, OutputFormat,
};

#[derive(Parser, Debug)]
#[command(
    name = "table-converter",
    about = "Converts tabular files between CSV, JSON, Avro, Parquet and Excel, and compares datasets"
)]
struct Cli {
    /// Defaults to `convert`, prompting for every value
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a file to another format; missing values are prompted for
    Convert(ConvertArgs),
    /// Compare two files for structural and content equivalence
    Compare(CompareArgs),
}

#[derive(Args, Debug, Default)]
struct ConvertArgs {
    /// Input file path
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output format: csv, json, avro, parquet or excel (case-insensitive)
    #[arg(short, long)]
    format: Option<String>,

    /// Existing directory the output file is written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[command(flatten)]
    decode: DecodeArgs,

    /// Read the written file back and compare it with the decoded input
    #[arg(long)]
    verify: bool,

    /// With --verify, fail when a column cannot be coerced for comparison
    #[arg(long, requires = "verify")]
    strict: bool,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Reference file
    reference: PathBuf,

    /// File compared against the reference
    candidate: PathBuf,

    /// Expand a candidate column of JSON objects into sibling columns (repeatable)
    #[arg(long)]
    expand: Vec<String>,

    /// Compare the tables as decoded, without aligning columns and types
    #[arg(long)]
    raw: bool,

    /// Fail when a column cannot be coerced to the reference type
    #[arg(long)]
    strict: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    decode: DecodeArgs,
}

#[derive(Args, Debug, Default)]
struct DecodeArgs {
    /// Override delimiter detection for CSV files (e.g., ',', ';', '\t')
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Override quote character detection for CSV files (default: '"')
    #[arg(short, long)]
    quote: Option<char>,

    /// Override escape character detection for CSV files (e.g., '\\' for backslash escaping)
    #[arg(short, long)]
    escape: Option<char>,

    /// Disable CSV dialect detection and use the standard format
    #[arg(long)]
    no_auto_detect: bool,

    /// Keep all CSV values as strings (disable type inference)
    #[arg(long)]
    no_type_conversion: bool,

    /// CSV columns to keep as strings (comma-separated, e.g., "zipcode,phone")
    #[arg(long, value_delimiter = ',')]
    string_fields: Vec<String>,

    /// For Excel files: sheet to read (default: first sheet)
    #[arg(short, long)]
    sheet: Option<String>,

    /// For JSON files: separator between nested key names (default: '.')
    #[arg(long)]
    separator: Option<String>,

    /// For JSON files: levels of nested objects to flatten (default: all)
    #[arg(long)]
    max_level: Option<usize>,
}

impl DecodeArgs {
    fn csv_overrides(&self) -> bool {
        self.delimiter.is_some() || self.quote.is_some() || self.escape.is_some() || self.no_auto_detect
    }

    /// Builds decoder settings for `input`. CSV overrides are applied on top
    /// of the detected dialect unless detection is disabled.
    fn to_options(&self, input: &Path) -> Result<DecodeOptions> {
        let format = detect_file_format(input)?;
        if format != FileFormat::Csv && self.csv_overrides() {
            warn!("CSV-specific options (delimiter, quote, escape, no-auto-detect) are ignored for {:?} files", format);
        }

        let dialect = if format != FileFormat::Csv || !self.csv_overrides() {
            None
        } else {
            let base = if self.no_auto_detect {
                CsvDialect::default()
            } else {
                detect_csv_format(input)?
            };
            Some(CsvDialect {
                delimiter: self.delimiter.map(|c| c as u8).unwrap_or(base.delimiter),
                quote: self.quote.map(|c| c as u8).unwrap_or(base.quote),
                escape: self.escape.map(|c| c as u8).or(base.escape),
            })
        };

        let mut flatten = FlattenOptions {
            max_level: self.max_level,
            ..FlattenOptions::default()
        };
        if let Some(separator) = &self.separator {
            flatten.separator = separator.clone();
        }

        Ok(DecodeOptions {
            dialect,
            no_type_conversion: self.no_type_conversion,
            string_fields: self.string_fields.clone(),
            sheet: self.sheet.clone(),
            flatten,
            expand_json_strings: true,
        })
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Some(Command::Convert(args)) => run_convert(args),
        Some(Command::Compare(args)) => run_compare(args),
        None => run_convert(ConvertArgs::default()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            println!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Asks for a value on stdin. End of input yields an empty answer.
fn prompt(question: &str) -> Result<String> {
    print!("{}: ", question);
    io::stdout().flush().context("Failed to write prompt")?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read answer")?;
    Ok(answer.trim().to_string())
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    let input = match args.input {
        Some(path) => path,
        None => PathBuf::from(prompt("Enter the input file path")?),
    };
    let format = match args.format {
        Some(format) => format,
        None => prompt("Enter the output format (CSV, JSON, Avro, Parquet, Excel)")?,
    };
    let output_dir = match args.output_dir {
        Some(path) => path,
        None => PathBuf::from(prompt("Enter the output directory")?),
    };

    if !input.is_file() {
        return Err(ConvertError::InputNotFound(input).into());
    }
    if !output_dir.is_dir() {
        return Err(ConvertError::OutputDirNotFound(output_dir).into());
    }
    let format: OutputFormat = format.parse()?;
    let options = args.decode.to_options(&input)?;

    let conversion = convert(&input, format, &output_dir, &options)?;
    println!(
        "Conversion complete. File saved to: {}",
        conversion.output_path.display()
    );

    if args.verify {
        let policy = if args.strict {
            CoercionPolicy::Strict
        } else {
            CoercionPolicy::Lenient
        };
        let (result, _) = verify_conversion(&conversion.table, &conversion.output_path, policy)?;
        print_comparison(&result);
    }
    Ok(())
}

fn run_compare(args: CompareArgs) -> Result<()> {
    for path in [&args.reference, &args.candidate] {
        if !path.is_file() {
            return Err(ConvertError::InputNotFound(path.clone()).into());
        }
    }

    let reference_options = DecodeOptions {
        expand_json_strings: false,
        ..args.decode.to_options(&args.reference)?
    };
    let candidate_options = DecodeOptions {
        expand_json_strings: false,
        ..args.decode.to_options(&args.candidate)?
    };
    let reference = decode_file(&args.reference, &reference_options)?;
    let mut candidate = decode_file(&args.candidate, &candidate_options)?;
    for column in &args.expand {
        expand_object_column(&mut candidate, column)?;
    }

    let result = if args.raw {
        compare(&reference, &candidate)
    } else {
        let policy = if args.strict {
            CoercionPolicy::Strict
        } else {
            CoercionPolicy::Lenient
        };
        compare_aligned(reference, candidate, policy)?.0
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_comparison(&result);
    }
    Ok(())
}

fn print_comparison(result: &ComparisonResult) {
    println!("Columns match: {}", result.columns_match);
    println!("Column similarity: {:.2}%", result.column_similarity_percentage);
    println!("Rows match: {}", result.rows_match);
    println!("Row similarity: {:.2}%", result.row_similarity_percentage);
    println!("Data match: {}", result.data_match);
    println!("Data similarity: {:.2}%", result.data_similarity_percentage);
}
