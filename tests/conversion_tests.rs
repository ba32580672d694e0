use apache_avro::Reader;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use table_converter::codecs::parquet::{ParquetDecoder, ParquetEncoder};
use table_converter::{
    compare, convert, decode_file, verify_conversion, CoercionPolicy, Column, ConvertError,
    DataType, DecodeOptions, Decoder, Encoder, OutputFormat, Table, Value,
};
use tempfile::TempDir;

/// Helper to create an input file in a fresh directory
fn create_input(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

fn output_dir(dir: &TempDir) -> PathBuf {
    let out = dir.path().join("out");
    fs::create_dir_all(&out).unwrap();
    out
}

#[test]
fn test_all_string_table_survives_parquet() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("strings.parquet");
    let table = Table::new(vec![
        Column::new("id", vec![Value::Str("1".into()), Value::Str("2".into())]),
        Column::new("name", vec![Value::Str("ana".into()), Value::Null]),
    ])
    .unwrap();

    ParquetEncoder.encode(&table, &path).unwrap();
    let decoded = ParquetDecoder.decode(&path).unwrap();

    let result = compare(&table, &decoded);
    assert!(result.data_match);
    assert_eq!(result.data_similarity_percentage, 100.0);
}

#[test]
fn test_typed_table_survives_parquet() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("typed.parquet");
    let table = Table::new(vec![
        Column::new("n", vec![Value::Int(1), Value::Null]),
        Column::new("x", vec![Value::Float(0.5), Value::Float(2.0)]),
        Column::new("ok", vec![Value::Bool(true), Value::Bool(false)]),
    ])
    .unwrap();

    ParquetEncoder.encode(&table, &path).unwrap();
    let decoded = ParquetDecoder.decode(&path).unwrap();

    assert_eq!(decoded, table);
}

#[test]
fn test_nested_json_to_parquet() {
    let dir = TempDir::new().unwrap();
    let input = create_input(&dir, "nested.json", r#"{"a": 1, "b": "{\"c\": 2}"}"#);
    let out = output_dir(&dir);

    let conversion = convert(&input, OutputFormat::Parquet, &out, &DecodeOptions::default()).unwrap();

    assert_eq!(conversion.output_path, out.join("nested.parquet"));
    let written = ParquetDecoder.decode(&conversion.output_path).unwrap();
    assert_eq!(written.column_names(), vec!["a", "c"]);
    assert_eq!(written.column("a").unwrap().values(), &[Value::Int(1)]);
    assert_eq!(written.column("c").unwrap().values(), &[Value::Int(2)]);
}

#[test]
fn test_json_object_columns_are_written_as_text() {
    let dir = TempDir::new().unwrap();
    let input = create_input(
        &dir,
        "records.json",
        r#"[{"id": 1, "tags": ["x"]}, {"id": 2, "tags": []}]"#,
    );
    let out = output_dir(&dir);

    let conversion = convert(&input, OutputFormat::Parquet, &out, &DecodeOptions::default()).unwrap();

    let tags = conversion.table.column("tags").unwrap();
    assert_eq!(tags.data_type(), DataType::Utf8);
    let written = ParquetDecoder.decode(&conversion.output_path).unwrap();
    assert_eq!(
        written.column("tags").unwrap().values(),
        &[Value::Str("[\"x\"]".into()), Value::Str("[]".into())]
    );
}

#[test]
fn test_csv_to_avro_declares_strings() {
    let dir = TempDir::new().unwrap();
    let input = create_input(&dir, "people.csv", "id,name\n1,Alice\n2,Bob\n3,Cy\n");
    let out = output_dir(&dir);

    let conversion = convert(&input, OutputFormat::Avro, &out, &DecodeOptions::default()).unwrap();

    let reader = Reader::new(File::open(&conversion.output_path).unwrap()).unwrap();
    let schema = reader.writer_schema().canonical_form();
    assert!(schema.contains(r#"{"name":"id","type":"string"}"#), "{}", schema);
    assert!(schema.contains(r#"{"name":"name","type":"string"}"#), "{}", schema);
    assert_eq!(reader.count(), 3);
}

#[test]
fn test_csv_headers_with_spaces_to_avro() {
    let dir = TempDir::new().unwrap();
    let input = create_input(&dir, "people.csv", "id,first name\n1,Ana\n");
    let out = output_dir(&dir);

    let conversion = convert(&input, OutputFormat::Avro, &out, &DecodeOptions::default()).unwrap();

    let reader = Reader::new(File::open(&conversion.output_path).unwrap()).unwrap();
    let schema = reader.writer_schema().canonical_form();
    assert!(schema.contains(r#"{"name":"first_name","type":"string"}"#), "{}", schema);

    let decoded = decode_file(&conversion.output_path, &DecodeOptions::default()).unwrap();
    assert_eq!(decoded.column_names(), vec!["id", "first name"]);
}

#[test]
fn test_nested_json_to_avro() {
    let dir = TempDir::new().unwrap();
    let input = create_input(&dir, "users.json", r#"[{"id": 1, "user": {"name": "ana"}}]"#);
    let out = output_dir(&dir);

    let conversion = convert(&input, OutputFormat::Avro, &out, &DecodeOptions::default()).unwrap();

    let decoded = decode_file(&conversion.output_path, &DecodeOptions::default()).unwrap();
    assert_eq!(decoded.column_names(), vec!["id", "user.name"]);
    assert_eq!(
        decoded.column("user.name").unwrap().values(),
        &[Value::Str("ana".into())]
    );
}

#[test]
fn test_parquet_to_ndjson() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.parquet");
    let table = Table::new(vec![
        Column::new("id", vec![Value::Int(1), Value::Int(2)]),
        Column::new("name", vec![Value::Str("ana".into()), Value::Null]),
    ])
    .unwrap();
    ParquetEncoder.encode(&table, &source).unwrap();
    let out = output_dir(&dir);

    let conversion = convert(&source, OutputFormat::Json, &out, &DecodeOptions::default()).unwrap();

    let text = fs::read_to_string(&conversion.output_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec![r#"{"id":1,"name":"ana"}"#, r#"{"id":2,"name":null}"#]);
}

#[test]
fn test_csv_to_excel_verifies() {
    let dir = TempDir::new().unwrap();
    let input = create_input(&dir, "sales.csv", "item,qty,price\npen,3,1.5\ncup,10,4.25\n");
    let out = output_dir(&dir);

    let conversion = convert(&input, OutputFormat::Excel, &out, &DecodeOptions::default()).unwrap();
    assert_eq!(conversion.output_path, out.join("sales.excel"));

    // Quantities come back as spreadsheet floats and are coerced for comparison
    let (result, warnings) =
        verify_conversion(&conversion.table, &conversion.output_path, CoercionPolicy::Strict)
            .unwrap();
    assert!(warnings.is_empty());
    assert!(result.columns_match);
    assert!(result.data_match);
}

#[test]
fn test_csv_output_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let input = create_input(&dir, "data.json", r#"[{"a": 1}]"#);
    let out = output_dir(&dir);

    let err = convert(&input, OutputFormat::Csv, &out, &DecodeOptions::default()).unwrap_err();

    assert!(matches!(err, ConvertError::UnsupportedFormat(_)));
    assert!(!out.join("data.csv").exists());
}

#[test]
fn test_missing_input() {
    let dir = TempDir::new().unwrap();
    let out = output_dir(&dir);

    let err = convert(
        &dir.path().join("nope.csv"),
        OutputFormat::Json,
        &out,
        &DecodeOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(err, ConvertError::InputNotFound(_)));
}

#[test]
fn test_missing_output_dir() {
    let dir = TempDir::new().unwrap();
    let input = create_input(&dir, "data.csv", "a\n1\n");

    let err = convert(
        &input,
        OutputFormat::Parquet,
        &dir.path().join("missing"),
        &DecodeOptions::default(),
    )
    .unwrap_err();

    assert!(matches!(err, ConvertError::OutputDirNotFound(_)));
}

#[test]
fn test_malformed_json_is_a_decode_error() {
    let dir = TempDir::new().unwrap();
    let input = create_input(&dir, "broken.json", "{\"a\": ");
    let out = output_dir(&dir);

    let err = convert(&input, OutputFormat::Parquet, &out, &DecodeOptions::default()).unwrap_err();

    assert!(matches!(err, ConvertError::Decode { .. }));
}

#[test]
fn test_ndjson_decodes_back_in_column_order() {
    let dir = TempDir::new().unwrap();
    let input = create_input(&dir, "rows.ndjson", "{\"z\": 1, \"a\": \"x\"}\n{\"z\": 2, \"a\": \"y\"}\n");

    let table = decode_file(&input, &DecodeOptions::default()).unwrap();

    assert_eq!(table.column_names(), vec!["z", "a"]);
    assert_eq!(table.num_rows(), 2);
}
