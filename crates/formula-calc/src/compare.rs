//! Ordering used by the comparison operators.

use std::cmp::Ordering;

use formula_model::ErrorValue;
use formula_ptg::BinaryOp;

use crate::value::Value;

/// Compare two scalars.
///
/// An error on either side is returned instead of an ordering, the left one first. A blank
/// (or empty text) side takes the other side's type: zero against a number, empty text
/// against text, `FALSE` against a boolean. Numbers within `epsilon` of each other (relative
/// to the larger magnitude) compare equal, text compares case-insensitively, and mixed types
/// order as numbers < text < booleans.
pub fn compare(left: &Value, right: &Value, epsilon: f64) -> Result<Ordering, ErrorValue> {
    let left = normalize(left);
    let right = normalize(right);
    if let Value::Error(e) = left {
        return Err(e);
    }
    if let Value::Error(e) = right {
        return Err(e);
    }

    let (l, r) = match (&left, &right) {
        (Value::Blank, Value::Number(_)) => (Value::Number(0.0), right.clone()),
        (Value::Number(_), Value::Blank) => (left.clone(), Value::Number(0.0)),
        (Value::Blank, Value::Bool(_)) => (Value::Bool(false), right.clone()),
        (Value::Bool(_), Value::Blank) => (left.clone(), Value::Bool(false)),
        (Value::Blank, Value::Text(_)) => (Value::Text(String::new()), right.clone()),
        (Value::Text(_), Value::Blank) => (left.clone(), Value::Text(String::new())),
        _ => (left.clone(), right.clone()),
    };

    Ok(match (&l, &r) {
        (Value::Number(a), Value::Number(b)) => compare_numbers(*a, *b, epsilon),
        (Value::Text(a), Value::Text(b)) => a.to_uppercase().cmp(&b.to_uppercase()),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(_), Value::Text(_) | Value::Bool(_)) => Ordering::Less,
        (Value::Text(_), Value::Bool(_)) => Ordering::Less,
        (Value::Text(_), Value::Number(_)) => Ordering::Greater,
        (Value::Bool(_), Value::Number(_) | Value::Text(_)) => Ordering::Greater,
        (Value::Blank, Value::Blank) => Ordering::Equal,
        (Value::Blank, _) => Ordering::Less,
        (_, Value::Blank) => Ordering::Greater,
        // Errors and arrays were handled above.
        _ => Ordering::Equal,
    })
}

/// Apply a comparison operator, producing `TRUE`/`FALSE` or the propagated error.
pub fn compare_op(op: BinaryOp, left: &Value, right: &Value, epsilon: f64) -> Value {
    let ord = match compare(left, right, epsilon) {
        Ok(ord) => ord,
        Err(e) => return Value::Error(e),
    };
    let result = match op {
        BinaryOp::Eq => ord == Ordering::Equal,
        BinaryOp::Ne => ord != Ordering::Equal,
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Le => ord != Ordering::Greater,
        BinaryOp::Gt => ord == Ordering::Greater,
        BinaryOp::Ge => ord != Ordering::Less,
        _ => return Value::Error(ErrorValue::Value),
    };
    Value::Bool(result)
}

pub fn numbers_equal(a: f64, b: f64, epsilon: f64) -> bool {
    if a == b {
        return true;
    }
    (a - b).abs() <= epsilon * a.abs().max(b.abs())
}

fn compare_numbers(a: f64, b: f64, epsilon: f64) -> Ordering {
    if numbers_equal(a, b, epsilon) {
        Ordering::Equal
    } else {
        a.partial_cmp(&b).unwrap_or(Ordering::Equal)
    }
}

fn normalize(value: &Value) -> Value {
    match value {
        Value::Text(s) if s.is_empty() => Value::Blank,
        Value::Array(arr) => arr.values.first().map_or(Value::Blank, normalize),
        other => other.clone(),
    }
}
