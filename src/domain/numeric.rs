use serde_json::Value;

/// Reads a JSON number or a numeric string the way vendor payloads encode
/// them (`5.2`, `"5.2"`, `"5.2 kW"`). Non-finite results are rejected.
pub fn parse_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|value| value.is_finite()),
        Value::String(text) => parse_f64_from_text(text),
        _ => None,
    }
}

pub fn parse_i64(value: &Value) -> Option<i64> {
    if let Value::Number(number) = value
        && let Some(integer) = number.as_i64()
    {
        return Some(integer);
    }

    parse_f64(value).map(|value| value.floor() as i64)
}

fn parse_f64_from_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<f64>() {
        return value.is_finite().then_some(value);
    }

    let end = trimmed
        .char_indices()
        .find(|(index, char)| {
            !(char.is_ascii_digit() || *char == '.' || (*index == 0 && matches!(char, '-' | '+')))
        })
        .map(|(index, _)| index)
        .unwrap_or(trimmed.len());

    trimmed[..end]
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{parse_f64, parse_i64};

    #[test]
    fn parses_numbers_and_numeric_strings() {
        assert_eq!(parse_f64(&json!(5.2)), Some(5.2));
        assert_eq!(parse_f64(&json!("5.2")), Some(5.2));
        assert_eq!(parse_f64(&json!(" 12.5 kW")), Some(12.5));
        assert_eq!(parse_f64(&json!("-3")), Some(-3.0));
    }

    #[test]
    fn rejects_non_numeric_values() {
        assert_eq!(parse_f64(&json!("n/a")), None);
        assert_eq!(parse_f64(&json!(null)), None);
        assert_eq!(parse_f64(&json!([1])), None);
        assert_eq!(parse_f64(&json!("NaN")), None);
    }

    #[test]
    fn parses_epoch_seconds_from_float_and_string() {
        assert_eq!(parse_i64(&json!(1_700_000_000)), Some(1_700_000_000));
        assert_eq!(parse_i64(&json!(1_700_000_000.75)), Some(1_700_000_000));
        assert_eq!(parse_i64(&json!("1700000000")), Some(1_700_000_000));
    }
}
