//! The function-dispatch seam and a small built-in library.
//!
//! The evaluator never interprets function semantics: it hands the evaluated arguments to a
//! [`FunctionDispatch`] and pushes whatever comes back. [`BasicFunctions`] covers the
//! aggregate, logical and information functions that formulas most commonly lean on;
//! embedders supply their own dispatcher for the rest.

use formula_model::{CalcSettings, ErrorValue};

use crate::broadcast::broadcast_unary;
use crate::coercion::{to_bool, to_number, to_text};
use crate::resolve::{array_value, reference_values, scalar_value, EvalContext};
use crate::value::{Operand, Value};
use crate::workbook::Workbook;

/// Returned by a dispatcher that does not implement the requested function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotSupported;

/// The function being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionCall<'a> {
    /// `iftab` id; 255 for add-in and user-defined calls.
    pub id: u16,
    /// Canonical name for built-ins, the callee's name for add-in calls.
    pub name: &'a str,
}

/// Everything a function needs to read its arguments.
#[derive(Clone, Copy)]
pub struct CallContext<'a> {
    pub workbook: &'a dyn Workbook,
    pub ctx: EvalContext,
    pub settings: &'a CalcSettings,
}

impl CallContext<'_> {
    /// One value, using implicit intersection for references.
    pub fn scalar(&self, arg: &Operand) -> Value {
        scalar_value(arg, self.ctx, self.workbook)
    }

    /// References become arrays; everything else is unchanged.
    pub fn array(&self, arg: &Operand) -> Value {
        array_value(arg, self.workbook, self.settings.max_array_cells)
    }

    /// Every value an argument contributes: cells of a reference in component order,
    /// elements of an array row-major, or the scalar itself.
    pub fn values(&self, arg: &Operand) -> Vec<Value> {
        match arg {
            Operand::Ref(r) => reference_values(r, self.workbook).collect(),
            Operand::Value(Value::Array(arr)) => arr.values.clone(),
            Operand::Value(v) => vec![v.clone()],
            Operand::Missing => vec![Value::Blank],
        }
    }
}

pub trait FunctionDispatch {
    fn call(
        &self,
        call: &FunctionCall<'_>,
        args: &[Operand],
        cx: &CallContext<'_>,
    ) -> Result<Operand, NotSupported>;
}

/// Dispatcher that supports nothing; every call evaluates to `#NAME?`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFunctions;

impl FunctionDispatch for NoFunctions {
    fn call(
        &self,
        _call: &FunctionCall<'_>,
        _args: &[Operand],
        _cx: &CallContext<'_>,
    ) -> Result<Operand, NotSupported> {
        Err(NotSupported)
    }
}

/// A compact built-in library.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicFunctions;

impl FunctionDispatch for BasicFunctions {
    fn call(
        &self,
        call: &FunctionCall<'_>,
        args: &[Operand],
        cx: &CallContext<'_>,
    ) -> Result<Operand, NotSupported> {
        let upper = call.name.to_ascii_uppercase();
        let name = upper.strip_prefix("_XLFN.").unwrap_or(&upper);
        let value = match name {
            "SUM" => aggregate(cx, args, Aggregate::Sum),
            "PRODUCT" => aggregate(cx, args, Aggregate::Product),
            "AVERAGE" => aggregate(cx, args, Aggregate::Average),
            "MIN" => aggregate(cx, args, Aggregate::Min),
            "MAX" => aggregate(cx, args, Aggregate::Max),
            "COUNT" => count(cx, args, Counting::Numbers),
            "COUNTA" => count(cx, args, Counting::NonBlank),
            "IF" => return Ok(if_function(cx, args)),
            "IFERROR" => return Ok(if_error(cx, args)),
            "ISERROR" => info(cx, args, |v| v.is_error()),
            "ISERR" => info(cx, args, |v| {
                matches!(v, Value::Error(e) if *e != ErrorValue::NA)
            }),
            "ISNA" => info(cx, args, |v| *v == Value::Error(ErrorValue::NA)),
            "ISBLANK" => info(cx, args, |v| *v == Value::Blank),
            "ISNUMBER" => info(cx, args, |v| matches!(v, Value::Number(_))),
            "ISTEXT" => info(cx, args, |v| matches!(v, Value::Text(_))),
            "ERROR.TYPE" => error_type(cx, args),
            "NA" => Value::Error(ErrorValue::NA),
            "TRUE" => Value::Bool(true),
            "FALSE" => Value::Bool(false),
            "AND" => logical(cx, args, true),
            "OR" => logical(cx, args, false),
            "NOT" => unary(cx, args, |v| match to_bool(v) {
                Ok(b) => Value::Bool(!b),
                Err(e) => Value::Error(e),
            }),
            "ABS" => numeric(cx, args, f64::abs),
            "INT" => numeric(cx, args, f64::floor),
            "SQRT" => numeric(cx, args, |n| if n < 0.0 { f64::NAN } else { n.sqrt() }),
            "ROUND" => round(cx, args),
            "MOD" => modulo(cx, args),
            "LEN" => unary(cx, args, |v| match to_text(v) {
                Ok(s) => Value::Number(s.chars().count() as f64),
                Err(e) => Value::Error(e),
            }),
            "UPPER" => text(cx, args, |s| s.to_uppercase()),
            "LOWER" => text(cx, args, |s| s.to_lowercase()),
            "CONCATENATE" => concatenate(cx, args),
            "ROWS" => dimension(args, true),
            "COLUMNS" => dimension(args, false),
            _ => return Err(NotSupported),
        };
        Ok(Operand::Value(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregate {
    Sum,
    Product,
    Average,
    Min,
    Max,
}

/// Numbers contributed by the arguments of an aggregate.
///
/// Cells and array elements only contribute numbers; text and booleans there are skipped.
/// Scalar arguments are coerced, so `SUM("2", TRUE)` is 3.
fn numbers(cx: &CallContext<'_>, args: &[Operand]) -> Result<Vec<f64>, ErrorValue> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Operand::Ref(_) | Operand::Value(Value::Array(_)) => {
                for v in cx.values(arg) {
                    match v {
                        Value::Number(n) => out.push(n),
                        Value::Error(e) => return Err(e),
                        _ => {}
                    }
                }
            }
            Operand::Missing => {}
            Operand::Value(v) => out.push(to_number(v)?),
        }
    }
    Ok(out)
}

fn aggregate(cx: &CallContext<'_>, args: &[Operand], kind: Aggregate) -> Value {
    let nums = match numbers(cx, args) {
        Ok(nums) => nums,
        Err(e) => return Value::Error(e),
    };
    let result = match kind {
        Aggregate::Sum => nums.iter().sum(),
        Aggregate::Product => nums.iter().product(),
        Aggregate::Average => {
            if nums.is_empty() {
                return Value::Error(ErrorValue::Div0);
            }
            nums.iter().sum::<f64>() / nums.len() as f64
        }
        Aggregate::Min => nums.iter().copied().reduce(f64::min).unwrap_or(0.0),
        Aggregate::Max => nums.iter().copied().reduce(f64::max).unwrap_or(0.0),
    };
    number(result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Counting {
    Numbers,
    NonBlank,
}

fn count(cx: &CallContext<'_>, args: &[Operand], kind: Counting) -> Value {
    let mut n = 0usize;
    for arg in args {
        n += match (arg, kind) {
            (Operand::Missing, _) => 0,
            (Operand::Ref(_) | Operand::Value(Value::Array(_)), Counting::Numbers) => cx
                .values(arg)
                .iter()
                .filter(|v| matches!(v, Value::Number(_)))
                .count(),
            (Operand::Ref(_) | Operand::Value(Value::Array(_)), Counting::NonBlank) => cx
                .values(arg)
                .iter()
                .filter(|v| !matches!(v, Value::Blank))
                .count(),
            // Direct arguments count when they can be read as numbers.
            (Operand::Value(v), Counting::Numbers) => {
                usize::from(!v.is_error() && to_number(v).is_ok())
            }
            (Operand::Value(_), Counting::NonBlank) => 1,
        };
    }
    Value::Number(n as f64)
}

fn if_function(cx: &CallContext<'_>, args: &[Operand]) -> Operand {
    let Some(cond) = args.first() else {
        return Operand::error(ErrorValue::Value);
    };
    let branch = match to_bool(&cx.scalar(cond)) {
        Ok(true) => args.get(1),
        Ok(false) => match args.get(2) {
            Some(arg) => Some(arg),
            None => return Operand::Value(Value::Bool(false)),
        },
        Err(e) => return Operand::error(e),
    };
    match branch {
        Some(Operand::Missing) | None => Operand::Value(Value::Number(0.0)),
        Some(arg) => arg.clone(),
    }
}

fn if_error(cx: &CallContext<'_>, args: &[Operand]) -> Operand {
    let [value, fallback] = args else {
        return Operand::error(ErrorValue::Value);
    };
    if cx.scalar(value).is_error() {
        match fallback {
            Operand::Missing => Operand::Value(Value::Number(0.0)),
            other => other.clone(),
        }
    } else {
        value.clone()
    }
}

fn info(cx: &CallContext<'_>, args: &[Operand], test: impl Fn(&Value) -> bool) -> Value {
    unary(cx, args, |v| Value::Bool(test(v)))
}

fn error_type(cx: &CallContext<'_>, args: &[Operand]) -> Value {
    unary(cx, args, |v| match v {
        Value::Error(e) => {
            let index = ErrorValue::ALL
                .iter()
                .position(|k| *k == e.surfaced())
                .unwrap_or(0);
            Value::Number((index + 1) as f64)
        }
        _ => Value::Error(ErrorValue::NA),
    })
}

fn logical(cx: &CallContext<'_>, args: &[Operand], all: bool) -> Value {
    let mut seen = false;
    let mut acc = all;
    for arg in args {
        let values = match arg {
            Operand::Missing => continue,
            Operand::Ref(_) | Operand::Value(Value::Array(_)) => cx
                .values(arg)
                .into_iter()
                .filter(|v| matches!(v, Value::Number(_) | Value::Bool(_) | Value::Error(_)))
                .collect(),
            Operand::Value(v) => vec![v.clone()],
        };
        for v in values {
            let b = match to_bool(&v) {
                Ok(b) => b,
                Err(e) => return Value::Error(e),
            };
            seen = true;
            acc = if all { acc && b } else { acc || b };
        }
    }
    if seen {
        Value::Bool(acc)
    } else {
        Value::Error(ErrorValue::Value)
    }
}

/// Apply `f` to the single argument, element-wise over arrays.
fn unary(cx: &CallContext<'_>, args: &[Operand], f: impl Fn(&Value) -> Value) -> Value {
    match args {
        [arg] => broadcast_unary(&cx.array(arg), f),
        _ => Value::Error(ErrorValue::Value),
    }
}

fn numeric(cx: &CallContext<'_>, args: &[Operand], f: impl Fn(f64) -> f64) -> Value {
    unary(cx, args, |v| match to_number(v) {
        Ok(n) => number(f(n)),
        Err(e) => Value::Error(e),
    })
}

fn text(cx: &CallContext<'_>, args: &[Operand], f: impl Fn(&str) -> String) -> Value {
    unary(cx, args, |v| match to_text(v) {
        Ok(s) => Value::Text(f(&s)),
        Err(e) => Value::Error(e),
    })
}

fn two_numbers(cx: &CallContext<'_>, args: &[Operand]) -> Result<(f64, f64), ErrorValue> {
    match args {
        [a, b] => Ok((to_number(&cx.scalar(a))?, to_number(&cx.scalar(b))?)),
        _ => Err(ErrorValue::Value),
    }
}

fn round(cx: &CallContext<'_>, args: &[Operand]) -> Value {
    match two_numbers(cx, args) {
        Ok((n, digits)) => {
            let factor = 10f64.powi(digits.trunc() as i32);
            // Halves round away from zero.
            number((n * factor).round() / factor)
        }
        Err(e) => Value::Error(e),
    }
}

fn modulo(cx: &CallContext<'_>, args: &[Operand]) -> Value {
    match two_numbers(cx, args) {
        Ok((_, d)) if d == 0.0 => Value::Error(ErrorValue::Div0),
        Ok((n, d)) => number(n - d * (n / d).floor()),
        Err(e) => Value::Error(e),
    }
}

fn concatenate(cx: &CallContext<'_>, args: &[Operand]) -> Value {
    let mut out = String::new();
    for arg in args {
        match to_text(&cx.scalar(arg)) {
            Ok(s) => out.push_str(&s),
            Err(e) => return Value::Error(e),
        }
    }
    Value::Text(out)
}

fn dimension(args: &[Operand], rows: bool) -> Value {
    let [arg] = args else {
        return Value::Error(ErrorValue::Value);
    };
    let n = match arg {
        Operand::Ref(r) => match r.single_area() {
            Some(area) if rows => area.range.height() as usize,
            Some(area) => area.range.width() as usize,
            None => return Value::Error(ErrorValue::Ref),
        },
        Operand::Value(Value::Array(arr)) => {
            if rows {
                arr.rows
            } else {
                arr.cols
            }
        }
        Operand::Value(Value::Error(e)) => return Value::Error(*e),
        Operand::Value(_) | Operand::Missing => 1,
    };
    Value::Number(n as f64)
}

fn number(n: f64) -> Value {
    if n.is_finite() {
        Value::Number(n)
    } else {
        Value::Error(ErrorValue::Num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryWorkbook;
    use crate::value::{Reference, SheetArea};
    use formula_model::{CellRef, Range};
    use pretty_assertions::assert_eq;

    fn call(wb: &MemoryWorkbook, name: &str, args: &[Operand]) -> Result<Operand, NotSupported> {
        let settings = CalcSettings::default();
        let cx = CallContext {
            workbook: wb,
            ctx: EvalContext::new(0, CellRef::new(0, 5)),
            settings: &settings,
        };
        BasicFunctions.call(&FunctionCall { id: 0, name }, args, &cx)
    }

    fn column_a() -> Operand {
        Operand::Ref(Reference::new(SheetArea::new(
            0,
            Range::from_a1("A1:A4").unwrap(),
        )))
    }

    fn book() -> MemoryWorkbook {
        let mut wb = MemoryWorkbook::new();
        wb.add_sheet("Sheet1");
        wb.set_value(0, CellRef::new(0, 0), 1.0);
        wb.set_value(0, CellRef::new(1, 0), "text");
        wb.set_value(0, CellRef::new(2, 0), 4.0);
        wb
    }

    #[test]
    fn aggregates_skip_text_in_references() {
        let wb = book();
        assert_eq!(
            call(&wb, "SUM", &[column_a(), Operand::from(Value::from("2"))]),
            Ok(Operand::Value(Value::Number(7.0)))
        );
        assert_eq!(
            call(&wb, "AVERAGE", &[column_a()]),
            Ok(Operand::Value(Value::Number(2.5)))
        );
        assert_eq!(
            call(&wb, "COUNT", &[column_a()]),
            Ok(Operand::Value(Value::Number(2.0)))
        );
        assert_eq!(
            call(&wb, "COUNTA", &[column_a()]),
            Ok(Operand::Value(Value::Number(3.0)))
        );
    }

    #[test]
    fn errors_in_ranges_propagate() {
        let mut wb = book();
        wb.set_value(0, CellRef::new(3, 0), ErrorValue::Ref);
        assert_eq!(
            call(&wb, "SUM", &[column_a()]),
            Ok(Operand::error(ErrorValue::Ref))
        );
        assert_eq!(
            call(&wb, "ISERROR", &[Operand::error(ErrorValue::Div0)]),
            Ok(Operand::Value(Value::Bool(true)))
        );
    }

    #[test]
    fn if_returns_the_chosen_argument_unevaluated() {
        let wb = book();
        assert_eq!(
            call(&wb, "IF", &[Operand::from(Value::Bool(true)), column_a()]),
            Ok(column_a())
        );
        assert_eq!(
            call(&wb, "IF", &[Operand::from(Value::Number(0.0)), column_a()]),
            Ok(Operand::Value(Value::Bool(false)))
        );
    }

    #[test]
    fn iferror_replaces_errors_only() {
        let wb = book();
        let fallback = Operand::from(Value::from("none"));
        assert_eq!(
            call(&wb, "IFERROR", &[Operand::error(ErrorValue::NA), fallback.clone()]),
            Ok(fallback.clone())
        );
        assert_eq!(
            call(&wb, "IFERROR", &[Operand::from(Value::Number(3.0)), fallback]),
            Ok(Operand::Value(Value::Number(3.0)))
        );
    }

    #[test]
    fn error_type_numbers_each_kind() {
        let wb = book();
        assert_eq!(
            call(&wb, "ERROR.TYPE", &[Operand::error(ErrorValue::NA)]),
            Ok(Operand::Value(Value::Number(7.0)))
        );
        assert_eq!(
            call(&wb, "ERROR.TYPE", &[Operand::error(ErrorValue::Circular)]),
            Ok(Operand::Value(Value::Number(3.0)))
        );
    }

    #[test]
    fn round_and_mod() {
        let wb = book();
        let n = |v: f64| Operand::from(Value::Number(v));
        assert_eq!(
            call(&wb, "ROUND", &[n(2.5), n(0.0)]),
            Ok(Operand::Value(Value::Number(3.0)))
        );
        assert_eq!(
            call(&wb, "MOD", &[n(-3.0), n(2.0)]),
            Ok(Operand::Value(Value::Number(1.0)))
        );
        assert_eq!(
            call(&wb, "MOD", &[n(1.0), n(0.0)]),
            Ok(Operand::error(ErrorValue::Div0))
        );
    }

    #[test]
    fn unknown_names_are_not_supported() {
        let wb = book();
        assert_eq!(call(&wb, "VLOOKUP", &[]), Err(NotSupported));
        assert_eq!(
            call(&wb, "_xlfn.concatenate", &[Operand::from(Value::from("a"))]),
            Ok(Operand::Value(Value::from("a")))
        );
        let settings = CalcSettings::default();
        let cx = CallContext {
            workbook: &wb,
            ctx: EvalContext::new(0, CellRef::new(0, 0)),
            settings: &settings,
        };
        let sum = FunctionCall { id: 4, name: "SUM" };
        assert_eq!(NoFunctions.call(&sum, &[], &cx), Err(NotSupported));
    }
}
