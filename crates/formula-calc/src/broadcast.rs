//! Element-wise application of operators to arrays.
//!
//! A scalar paired with an array is held fixed against every element. Two arrays are
//! aligned by flattened (row-major) position; where only one side has an element the
//! result at that position is `#VALUE!` and the other positions still compute. A result
//! is an array whenever either side was one.

use formula_model::ErrorValue;

use crate::value::{ArrayValue, Value};

pub fn broadcast_unary(value: &Value, f: impl Fn(&Value) -> Value) -> Value {
    match value {
        Value::Array(arr) => map(arr, f),
        other => f(other),
    }
}

pub fn broadcast_binary(left: &Value, right: &Value, f: impl Fn(&Value, &Value) -> Value) -> Value {
    match (left, right) {
        (Value::Array(l), Value::Array(r)) => match (single(l), single(r)) {
            (_, Some(r)) => map(l, |x| f(x, r)),
            (Some(l), None) => map(r, |x| f(l, x)),
            (None, None) => zip_positional(l, r, f),
        },
        (Value::Array(l), r) => map(l, |x| f(x, r)),
        (l, Value::Array(r)) => map(r, |x| f(l, x)),
        (l, r) => f(l, r),
    }
}

/// The element of a single-element array, which pairs with every element of the other
/// side like a scalar.
fn single(arr: &ArrayValue) -> Option<&Value> {
    match arr.values.as_slice() {
        [only] => Some(only),
        _ => None,
    }
}

fn map(arr: &ArrayValue, f: impl Fn(&Value) -> Value) -> Value {
    Value::Array(ArrayValue::new(arr.rows, arr.cols, arr.iter().map(f).collect()))
}

fn zip_positional(
    left: &ArrayValue,
    right: &ArrayValue,
    f: impl Fn(&Value, &Value) -> Value,
) -> Value {
    let (rows, cols) = if right.len() > left.len() {
        (right.rows, right.cols)
    } else {
        (left.rows, left.cols)
    };
    let values = (0..rows * cols)
        .map(|i| match (left.values.get(i), right.values.get(i)) {
            (Some(l), Some(r)) => f(l, r),
            _ => Value::Error(ErrorValue::Value),
        })
        .collect();
    Value::Array(ArrayValue::new(rows, cols, values))
}
