//! Scalar conversions applied by operators before they compute.

use formula_model::{format_number, ErrorValue};

use crate::value::Value;

/// Numeric view of a value. Blanks are zero and booleans are 0/1; text must parse.
pub fn to_number(value: &Value) -> Result<f64, ErrorValue> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Blank => Ok(0.0),
        Value::Text(s) => parse_number(s).ok_or(ErrorValue::Value),
        Value::Error(e) => Err(*e),
        Value::Array(arr) => arr.values.first().map_or(Ok(0.0), to_number),
    }
}

/// Text view of a value. Numbers use their shortest decimal form.
pub fn to_text(value: &Value) -> Result<String, ErrorValue> {
    match value {
        Value::Number(n) => Ok(format_number(*n)),
        Value::Text(s) => Ok(s.clone()),
        Value::Bool(true) => Ok("TRUE".to_string()),
        Value::Bool(false) => Ok("FALSE".to_string()),
        Value::Blank => Ok(String::new()),
        Value::Error(e) => Err(*e),
        Value::Array(arr) => arr.values.first().map_or(Ok(String::new()), to_text),
    }
}

pub fn to_bool(value: &Value) -> Result<bool, ErrorValue> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(*n != 0.0),
        Value::Blank => Ok(false),
        Value::Text(s) => {
            if s.eq_ignore_ascii_case("TRUE") {
                Ok(true)
            } else if s.eq_ignore_ascii_case("FALSE") {
                Ok(false)
            } else {
                Err(ErrorValue::Value)
            }
        }
        Value::Error(e) => Err(*e),
        Value::Array(arr) => arr.values.first().map_or(Ok(false), to_bool),
    }
}

/// Parse text the way arithmetic operators read it: surrounding spaces are ignored, a
/// trailing `%` divides by 100 and thousands separators are accepted in the integer part.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (body, scale) = match trimmed.strip_suffix('%') {
        Some(rest) => (rest.trim_end(), 0.01),
        None => (trimmed, 1.0),
    };
    let (sign, digits) = match body.as_bytes().first() {
        Some(b'-') => (-1.0, &body[1..]),
        Some(b'+') => (1.0, &body[1..]),
        _ => (1.0, body),
    };
    if digits.is_empty() || !digits.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let cleaned: String = if digits.contains(',') {
        let int_end = digits.find(['.', 'e', 'E']).unwrap_or(digits.len());
        let (int_part, rest) = digits.split_at(int_end);
        if !valid_grouping(int_part) {
            return None;
        }
        let mut out: String = int_part.chars().filter(|c| *c != ',').collect();
        out.push_str(rest);
        out
    } else {
        digits.to_string()
    };
    let n: f64 = cleaned.parse().ok()?;
    n.is_finite().then_some(sign * n * scale)
}

fn valid_grouping(int_part: &str) -> bool {
    let mut groups = int_part.split(',');
    let first_ok = groups
        .next()
        .is_some_and(|g| (1..=3).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()));
    first_ok && groups.all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit()))
}
