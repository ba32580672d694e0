use crate::table::{DataType, Value};

/// Infers the declared type of a text column (CSV cells).
///
/// Empty fields are nulls and do not take part in inference. A column is
/// only numeric or boolean when every non-empty field parses as such.
pub fn infer_column_type(
    fields: &[&str],
    header_name: &str,
    no_type_conversion: bool,
    string_fields: &[String],
) -> DataType {
    if no_type_conversion || string_fields.iter().any(|f| f == header_name) {
        return DataType::Utf8;
    }

    let mut present = fields.iter().filter(|f| !f.is_empty()).peekable();
    if present.peek().is_none() {
        return DataType::Utf8;
    }

    let mut all_bool = true;
    let mut all_int = true;
    let mut all_float = true;
    for field in present {
        // Leading zeros (zipcodes, phone numbers) keep the whole column textual
        if has_leading_zero(field) {
            return DataType::Utf8;
        }
        all_bool &= parse_bool(field).is_some();
        all_int &= field.parse::<i64>().is_ok();
        all_float &= field.parse::<f64>().is_ok();
        if !(all_bool || all_int || all_float) {
            return DataType::Utf8;
        }
    }

    if all_bool {
        DataType::Boolean
    } else if all_int {
        DataType::Int64
    } else if all_float {
        DataType::Float64
    } else {
        DataType::Utf8
    }
}

/// Parses a text field as the column's inferred type
pub fn parse_field(field: &str, data_type: DataType) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    let parsed = match data_type {
        DataType::Boolean => parse_bool(field).map(Value::Bool),
        DataType::Int64 => field.parse().ok().map(Value::Int),
        DataType::Float64 => field.parse().ok().map(Value::Float),
        DataType::Utf8 | DataType::Object => None,
    };
    parsed.unwrap_or_else(|| Value::Str(field.to_string()))
}

/// Converts `value` to `target`, `None` when it has no faithful
/// representation there. Nulls convert to anything.
pub fn coerce_value(value: &Value, target: DataType) -> Option<Value> {
    if value.is_null() || DataType::of(value) == Some(target) {
        return Some(value.clone());
    }
    match (target, value) {
        (DataType::Object, v) => Some(v.clone()),
        (DataType::Utf8, v) => Some(Value::Str(v.to_string())),

        (DataType::Int64, Value::Bool(b)) => Some(Value::Int(i64::from(*b))),
        (DataType::Int64, Value::Float(f)) => {
            let integral = f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64;
            integral.then(|| Value::Int(*f as i64))
        }
        (DataType::Int64, Value::Str(s)) => s.trim().parse().ok().map(Value::Int),

        (DataType::Float64, Value::Bool(b)) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),
        (DataType::Float64, Value::Int(i)) => Some(Value::Float(*i as f64)),
        (DataType::Float64, Value::Str(s)) => s.trim().parse().ok().map(Value::Float),

        (DataType::Boolean, Value::Int(0)) => Some(Value::Bool(false)),
        (DataType::Boolean, Value::Int(1)) => Some(Value::Bool(true)),
        (DataType::Boolean, Value::Str(s)) => parse_bool(s.trim()).map(Value::Bool),

        _ => None,
    }
}

fn parse_bool(field: &str) -> Option<bool> {
    if field.eq_ignore_ascii_case("true") {
        Some(true)
    } else if field.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn has_leading_zero(field: &str) -> bool {
    let digits = field.strip_prefix('-').unwrap_or(field);
    digits.starts_with('0') && digits.len() > 1 && !digits.starts_with("0.")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(fields: &[&str]) -> DataType {
        infer_column_type(fields, "field", false, &[])
    }

    #[test]
    fn test_infer_integers() {
        assert_eq!(infer(&["42", "-100", "0"]), DataType::Int64);
        assert_eq!(parse_field("42", DataType::Int64), Value::Int(42));
        assert_eq!(parse_field("-42", DataType::Int64), Value::Int(-42));
    }

    #[test]
    fn test_infer_floats() {
        assert_eq!(infer(&["3.14", "2"]), DataType::Float64);
        assert_eq!(parse_field("2", DataType::Float64), Value::Float(2.0));
    }

    #[test]
    fn test_infer_booleans() {
        assert_eq!(infer(&["true", "FALSE", "True"]), DataType::Boolean);
        assert_eq!(parse_field("FALSE", DataType::Boolean), Value::Bool(false));
    }

    #[test]
    fn test_leading_zeros_keep_column_textual() {
        assert_eq!(infer(&["02134", "10001"]), DataType::Utf8);
        assert_eq!(
            parse_field("02134", DataType::Utf8),
            Value::Str("02134".to_string())
        );
    }

    #[test]
    fn test_decimal_leading_zero_is_numeric() {
        assert_eq!(infer(&["0.5", "0.99"]), DataType::Float64);
    }

    #[test]
    fn test_empty_fields_are_null() {
        assert_eq!(infer(&["", "7", ""]), DataType::Int64);
        assert_eq!(parse_field("", DataType::Int64), Value::Null);
        assert_eq!(infer(&["", ""]), DataType::Utf8);
    }

    #[test]
    fn test_mixed_column_is_text() {
        assert_eq!(infer(&["1", "two"]), DataType::Utf8);
    }

    #[test]
    fn test_string_fields_override() {
        let string_fields = vec!["zipcode".to_string()];
        let data_type = infer_column_type(&["12345"], "zipcode", false, &string_fields);
        assert_eq!(data_type, DataType::Utf8);
    }

    #[test]
    fn test_no_type_conversion() {
        assert_eq!(
            infer_column_type(&["42", "true"], "age", true, &[]),
            DataType::Utf8
        );
    }

    #[test]
    fn test_coerce_numeric_strings() {
        assert_eq!(
            coerce_value(&Value::Str("7".into()), DataType::Int64),
            Some(Value::Int(7))
        );
        assert_eq!(
            coerce_value(&Value::Str("2.5".into()), DataType::Float64),
            Some(Value::Float(2.5))
        );
        assert_eq!(coerce_value(&Value::Str("seven".into()), DataType::Int64), None);
    }

    #[test]
    fn test_coerce_rejects_fractional_floats_to_int() {
        assert_eq!(coerce_value(&Value::Float(3.0), DataType::Int64), Some(Value::Int(3)));
        assert_eq!(coerce_value(&Value::Float(3.5), DataType::Int64), None);
    }

    #[test]
    fn test_coerce_to_text_and_null() {
        assert_eq!(
            coerce_value(&Value::Int(3), DataType::Utf8),
            Some(Value::Str("3".into()))
        );
        assert_eq!(coerce_value(&Value::Null, DataType::Boolean), Some(Value::Null));
    }
}
