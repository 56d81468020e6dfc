use std::fmt;

use formula_model::{format_number, CellRef, ErrorValue, Range, SheetId};
use formula_ptg::{ArrayConstant, ArrayElement};
use smallvec::SmallVec;

/// A computed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Error(ErrorValue),
    Blank,
    Array(ArrayValue),
}

impl Value {
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// First element of an array, or the value itself.
    pub fn into_scalar(self) -> Value {
        match self {
            Value::Array(arr) => arr.values.into_iter().next().unwrap_or(Value::Blank),
            other => other,
        }
    }

    /// Replace internal error kinds with what a user gets to see.
    pub fn surfaced(self) -> Value {
        match self {
            Value::Error(e) => Value::Error(e.surfaced()),
            Value::Array(mut arr) => {
                for v in &mut arr.values {
                    if let Value::Error(e) = v {
                        *e = e.surfaced();
                    }
                }
                Value::Array(arr)
            }
            other => other,
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<ErrorValue> for Value {
    fn from(value: ErrorValue) -> Self {
        Value::Error(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Text(s) => f.write_str(s),
            Value::Bool(true) => f.write_str("TRUE"),
            Value::Bool(false) => f.write_str("FALSE"),
            Value::Error(e) => write!(f, "{e}"),
            Value::Blank => Ok(()),
            Value::Array(arr) => match arr.values.first() {
                Some(v) => write!(f, "{v}"),
                None => Ok(()),
            },
        }
    }
}

/// A rectangular block of values stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<Value>,
}

impl ArrayValue {
    pub fn new(rows: usize, cols: usize, values: Vec<Value>) -> Self {
        debug_assert_eq!(rows * cols, values.len());
        Self { rows, cols, values }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Value> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.values.get(row * self.cols + col)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }
}

impl From<&ArrayConstant> for ArrayValue {
    fn from(constant: &ArrayConstant) -> Self {
        let values = constant
            .values
            .iter()
            .map(|element| match element {
                ArrayElement::Empty { .. } => Value::Blank,
                ArrayElement::Number(n) => Value::Number(*n),
                ArrayElement::Str(s) => Value::Text(s.text.clone()),
                ArrayElement::Bool { raw, .. } => Value::Bool(*raw != 0),
                ArrayElement::Error { value, .. } => Value::Error(*value),
            })
            .collect();
        ArrayValue::new(constant.rows, constant.cols, values)
    }
}

/// One rectangle on one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SheetArea {
    pub sheet: SheetId,
    pub range: Range,
}

impl SheetArea {
    pub const fn new(sheet: SheetId, range: Range) -> Self {
        Self { sheet, range }
    }

    pub const fn cell(sheet: SheetId, cell: CellRef) -> Self {
        Self {
            sheet,
            range: Range::single(cell),
        }
    }
}

/// A resolved reference: one or more areas, possibly on different sheets.
///
/// Multiple areas come from the union operator and from 3D references that span sheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    areas: SmallVec<[SheetArea; 1]>,
}

impl Reference {
    pub fn new(area: SheetArea) -> Self {
        let mut areas = SmallVec::new();
        areas.push(area);
        Self { areas }
    }

    pub fn from_areas(areas: impl IntoIterator<Item = SheetArea>) -> Option<Self> {
        let areas: SmallVec<[SheetArea; 1]> = areas.into_iter().collect();
        (!areas.is_empty()).then_some(Self { areas })
    }

    pub fn areas(&self) -> &[SheetArea] {
        &self.areas
    }

    /// The only area, when there is exactly one.
    pub fn single_area(&self) -> Option<SheetArea> {
        match self.areas.as_slice() {
            [area] => Some(*area),
            _ => None,
        }
    }

    /// The referenced cell, when the reference is exactly one cell.
    pub fn single_cell(&self) -> Option<(SheetId, CellRef)> {
        self.single_area()
            .filter(|area| area.range.is_single_cell())
            .map(|area| (area.sheet, area.range.start))
    }

    pub fn cell_count(&self) -> u64 {
        self.areas.iter().map(|a| a.range.cell_count()).sum()
    }

    /// Every cell of every area, in area order and column-major within an area.
    pub fn cells(&self) -> impl Iterator<Item = (SheetId, CellRef)> + '_ {
        self.areas
            .iter()
            .flat_map(|area| area.range.components().map(move |cell| (area.sheet, cell)))
    }

    pub fn union(mut self, other: Reference) -> Reference {
        self.areas.extend(other.areas);
        self
    }
}

/// A stack entry: either a value or a still-unresolved reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Ref(Reference),
    /// An omitted function argument (`PtgMissArg`).
    Missing,
}

impl Operand {
    pub fn error(e: ErrorValue) -> Operand {
        Operand::Value(Value::Error(e))
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Operand::Ref(r) => Some(r),
            _ => None,
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<Reference> for Operand {
    fn from(value: Reference) -> Self {
        Operand::Ref(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_results_collapse_to_their_first_element() {
        let arr = ArrayValue::new(1, 2, vec![Value::Number(3.0), Value::Number(4.0)]);
        assert_eq!(Value::Array(arr).into_scalar(), Value::Number(3.0));
    }

    #[test]
    fn circular_surfaces_as_value_error() {
        assert_eq!(
            Value::Error(ErrorValue::Circular).surfaced(),
            Value::Error(ErrorValue::Value)
        );
    }

    #[test]
    fn union_keeps_area_order() {
        let a = Reference::new(SheetArea::cell(0, CellRef::new(0, 0)));
        let b = Reference::new(SheetArea::cell(1, CellRef::new(2, 2)));
        let u = a.union(b);
        assert_eq!(u.areas().len(), 2);
        assert_eq!(u.single_cell(), None);
        assert_eq!(
            u.cells().collect::<Vec<_>>(),
            vec![(0, CellRef::new(0, 0)), (1, CellRef::new(2, 2))]
        );
    }
}
