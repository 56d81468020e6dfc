//! Reference tokens to areas, and areas to values.

use std::ops::RangeInclusive;

use formula_model::{AreaAddr, CellRef, ErrorValue, Range, SheetId, SheetLimits};
use formula_ptg::Ptg;

use crate::value::{ArrayValue, Operand, Reference, SheetArea, Value};
use crate::workbook::{ExternSheet, Workbook};

/// The cell a formula is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalContext {
    pub sheet: SheetId,
    pub cell: CellRef,
}

impl EvalContext {
    pub const fn new(sheet: SheetId, cell: CellRef) -> Self {
        Self { sheet, cell }
    }
}

/// Resolve a cell or area token to a reference operand.
///
/// Returns `None` for tokens that are not cell or area references (names are evaluated
/// by the caller). Failures to resolve become `#REF!` operands.
pub fn resolve_reference(
    ptg: &Ptg,
    ctx: EvalContext,
    workbook: &dyn Workbook,
    limits: &SheetLimits,
) -> Option<Operand> {
    let resolved = match ptg {
        Ptg::Ref { addr, .. } => Ok(Reference::new(SheetArea::cell(ctx.sheet, addr.cell()))),
        Ptg::Area { area, .. } => Ok(Reference::new(area_on(ctx.sheet, area, workbook, limits))),
        Ptg::RefN { addr, .. } => {
            let cell = addr.resolve(ctx.cell, limits).cell();
            Ok(Reference::new(SheetArea::cell(ctx.sheet, cell)))
        }
        Ptg::AreaN { area, .. } => {
            let area = area.resolve(ctx.cell, limits);
            Ok(Reference::new(area_on(ctx.sheet, &area, workbook, limits)))
        }
        Ptg::Ref3d { ixti, addr, .. } => sheets_of(*ixti, workbook).and_then(|sheets| {
            Reference::from_areas(sheets.map(|sheet| SheetArea::cell(sheet, addr.cell())))
                .ok_or(ErrorValue::Ref)
        }),
        Ptg::Area3d { ixti, area, .. } => sheets_of(*ixti, workbook).and_then(|sheets| {
            Reference::from_areas(sheets.map(|sheet| area_on(sheet, area, workbook, limits)))
                .ok_or(ErrorValue::Ref)
        }),
        Ptg::RefErr { .. }
        | Ptg::AreaErr { .. }
        | Ptg::RefErr3d { .. }
        | Ptg::AreaErr3d { .. } => Err(ErrorValue::Ref),
        _ => return None,
    };
    Some(match resolved {
        Ok(reference) => Operand::Ref(reference),
        Err(e) => Operand::error(e),
    })
}

/// Sheets an external-sheet index covers in this workbook.
pub fn sheets_of(
    ixti: u16,
    workbook: &dyn Workbook,
) -> Result<RangeInclusive<SheetId>, ErrorValue> {
    match workbook.extern_sheet(ixti) {
        Some(ExternSheet::Local { first, last }) => {
            let (first, last) = (first.min(last), first.max(last));
            if last >= workbook.sheet_count() {
                log::debug!("externsheet {ixti} points past the last sheet ({last})");
                return Err(ErrorValue::Ref);
            }
            Ok(first..=last)
        }
        Some(ExternSheet::External { book, sheet }) => {
            log::debug!("reference into external workbook [{book}]{sheet} has no values");
            Err(ErrorValue::Ref)
        }
        Some(ExternSheet::Deleted { .. }) | None => Err(ErrorValue::Ref),
    }
}

/// An area on `sheet`, with whole rows and columns cut to the sheet's current used extent.
pub fn area_on(
    sheet: SheetId,
    area: &AreaAddr,
    workbook: &dyn Workbook,
    limits: &SheetLimits,
) -> SheetArea {
    let mut range = area.range();
    let whole_col = area.is_whole_column(limits);
    let whole_row = area.is_whole_row(limits);
    if whole_col || whole_row {
        let used = workbook.used_extent(sheet);
        if whole_col {
            let last_row = used.map_or(0, |u| u.end.row);
            range.end.row = last_row.max(range.start.row);
        }
        if whole_row {
            let last_col = used.map_or(0, |u| u.end.col);
            range.end.col = last_col.max(range.start.col);
        }
    }
    SheetArea::new(sheet, range)
}

/// The one cell of `reference` implicit intersection picks for the formula cell.
///
/// A single cell is itself. A one-column or one-row area is intersected with the formula
/// cell's row or column. Anything else has no such cell.
pub fn intersection_cell(reference: &Reference, ctx: EvalContext) -> Option<(SheetId, CellRef)> {
    let area = reference.single_area()?;
    let range = area.range;
    let here = ctx.cell;
    let cell = if range.is_single_cell() {
        range.start
    } else if range.width() == 1 && (range.start.row..=range.end.row).contains(&here.row) {
        CellRef::new(here.row, range.start.col)
    } else if range.height() == 1 && (range.start.col..=range.end.col).contains(&here.col) {
        CellRef::new(range.start.row, here.col)
    } else {
        return None;
    };
    Some((area.sheet, cell))
}

/// Value of a reference where one value is expected; `#VALUE!` when
/// [`intersection_cell`] finds nothing.
pub fn implicit_intersection(
    reference: &Reference,
    ctx: EvalContext,
    workbook: &dyn Workbook,
) -> Value {
    match intersection_cell(reference, ctx) {
        Some((sheet, cell)) => workbook.cell_value(sheet, cell),
        None => Value::Error(ErrorValue::Value),
    }
}

/// Values of a single-area reference laid out row-major. A single cell stays a scalar.
pub fn reference_to_array(
    reference: &Reference,
    workbook: &dyn Workbook,
    max_cells: usize,
) -> Value {
    let Some(area) = reference.single_area() else {
        return Value::Error(ErrorValue::Value);
    };
    let range = area.range;
    if range.is_single_cell() {
        return workbook.cell_value(area.sheet, range.start);
    }
    if range.cell_count() > max_cells as u64 {
        return Value::Error(ErrorValue::Num);
    }
    let rows = range.height() as usize;
    let cols = range.width() as usize;
    let mut values = vec![Value::Blank; rows * cols];
    for cell in range.components() {
        let r = (cell.row - range.start.row) as usize;
        let c = (cell.col - range.start.col) as usize;
        values[r * cols + c] = workbook.cell_value(area.sheet, cell);
    }
    Value::Array(ArrayValue::new(rows, cols, values))
}

/// Values of every referenced cell, in component order.
pub fn reference_values<'a>(
    reference: &'a Reference,
    workbook: &'a dyn Workbook,
) -> impl Iterator<Item = Value> + 'a {
    reference
        .cells()
        .map(move |(sheet, cell)| workbook.cell_value(sheet, cell))
}

/// The value of an operand for a consumer that wants one value.
pub fn scalar_value(operand: &Operand, ctx: EvalContext, workbook: &dyn Workbook) -> Value {
    match operand {
        Operand::Value(v) => v.clone(),
        Operand::Ref(r) => implicit_intersection(r, ctx, workbook),
        Operand::Missing => Value::Blank,
    }
}

/// The value of an operand for an operator that broadcasts over arrays.
pub fn array_value(operand: &Operand, workbook: &dyn Workbook, max_cells: usize) -> Value {
    match operand {
        Operand::Value(v) => v.clone(),
        Operand::Ref(r) => reference_to_array(r, workbook, max_cells),
        Operand::Missing => Value::Blank,
    }
}

/// Bounding area of two references on the same sheet (the `:` operator).
pub fn range_operator(left: &Reference, right: &Reference) -> Result<Reference, ErrorValue> {
    let mut areas = left.areas().iter().chain(right.areas());
    let first = areas.next().ok_or(ErrorValue::Value)?;
    let mut range: Range = first.range;
    for area in areas {
        if area.sheet != first.sheet {
            return Err(ErrorValue::Value);
        }
        range = range.bounding(&area.range);
    }
    Ok(Reference::new(SheetArea::new(first.sheet, range)))
}

/// Cells common to both references (the space operator); `#NULL!` when there are none.
pub fn intersect_operator(left: &Reference, right: &Reference) -> Result<Reference, ErrorValue> {
    let areas = left.areas().iter().flat_map(move |a| {
        right
            .areas()
            .iter()
            .filter(move |b| b.sheet == a.sheet)
            .filter_map(move |b| a.range.intersect(&b.range).map(|r| SheetArea::new(a.sheet, r)))
    });
    Reference::from_areas(areas).ok_or(ErrorValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryWorkbook;
    use formula_model::CellAddr;
    use formula_ptg::{PtgClass, RelCellAddr};
    use pretty_assertions::assert_eq;

    fn book() -> MemoryWorkbook {
        let mut wb = MemoryWorkbook::new();
        let s = wb.add_sheet("Sheet1");
        wb.set_value(s, CellRef::new(0, 0), 1.0);
        wb.set_value(s, CellRef::new(1, 0), 2.0);
        wb.set_value(s, CellRef::new(2, 0), 3.0);
        wb.set_value(s, CellRef::new(0, 1), 10.0);
        wb
    }

    fn ctx(row: u32, col: u32) -> EvalContext {
        EvalContext::new(0, CellRef::new(row, col))
    }

    #[test]
    fn refn_resolves_against_the_consuming_cell() {
        let wb = book();
        let ptg = Ptg::RefN {
            class: PtgClass::Value,
            addr: RelCellAddr::new(1, 0, true, true),
        };
        let op = resolve_reference(&ptg, ctx(1, 1), &wb, &SheetLimits::default()).unwrap();
        assert_eq!(
            op,
            Operand::Ref(Reference::new(SheetArea::cell(0, CellRef::new(2, 1))))
        );
    }

    #[test]
    fn whole_column_follows_the_used_extent() {
        let mut wb = book();
        let limits = SheetLimits::default();
        let col_a = AreaAddr::new(
            CellAddr::new(0, 0, false, true),
            CellAddr::new(limits.last_row(), 0, false, true),
        );
        let area = area_on(0, &col_a, &wb, &limits);
        assert_eq!(area.range, Range::from_a1("A1:A3").unwrap());

        wb.set_value(0, CellRef::new(9, 3), 4.0);
        let area = area_on(0, &col_a, &wb, &limits);
        assert_eq!(area.range, Range::from_a1("A1:A10").unwrap());
    }

    #[test]
    fn implicit_intersection_uses_the_formula_row() {
        let wb = book();
        let col = Reference::new(SheetArea::new(0, Range::from_a1("A1:A3").unwrap()));
        assert_eq!(implicit_intersection(&col, ctx(1, 4), &wb), Value::Number(2.0));
        assert_eq!(
            implicit_intersection(&col, ctx(7, 4), &wb),
            Value::Error(ErrorValue::Value)
        );
    }

    #[test]
    fn areas_become_row_major_arrays() {
        let wb = book();
        let area = Reference::new(SheetArea::new(0, Range::from_a1("A1:B2").unwrap()));
        assert_eq!(
            reference_to_array(&area, &wb, 100),
            Value::Array(ArrayValue::new(
                2,
                2,
                vec![
                    Value::Number(1.0),
                    Value::Number(10.0),
                    Value::Number(2.0),
                    Value::Blank,
                ],
            ))
        );
        assert_eq!(
            reference_to_array(&area, &wb, 3),
            Value::Error(ErrorValue::Num)
        );
    }

    #[test]
    fn values_follow_component_order() {
        let wb = book();
        let area = Reference::new(SheetArea::new(0, Range::from_a1("A1:B2").unwrap()));
        let values: Vec<Value> = reference_values(&area, &wb).collect();
        assert_eq!(
            values,
            vec![
                Value::Number(1.0),
                Value::Number(2.0),
                Value::Number(10.0),
                Value::Blank,
            ]
        );
    }

    #[test]
    fn unresolvable_3d_reference_is_a_ref_error() {
        let wb = book();
        let ptg = Ptg::Ref3d {
            class: PtgClass::Reference,
            ixti: 42,
            addr: CellAddr::new(0, 0, false, false),
        };
        let op = resolve_reference(&ptg, ctx(0, 0), &wb, &SheetLimits::default()).unwrap();
        assert_eq!(op, Operand::error(ErrorValue::Ref));
    }

    #[test]
    fn reference_operators() {
        let a1 = Reference::new(SheetArea::cell(0, CellRef::new(0, 0)));
        let c3 = Reference::new(SheetArea::cell(0, CellRef::new(2, 2)));
        let bounding = range_operator(&a1, &c3).unwrap();
        assert_eq!(bounding.single_area().unwrap().range, Range::from_a1("A1:C3").unwrap());
        assert_eq!(intersect_operator(&a1, &c3), Err(ErrorValue::Null));
        let b = Reference::new(SheetArea::new(0, Range::from_a1("B1:B5").unwrap()));
        let row2 = Reference::new(SheetArea::new(0, Range::from_a1("A2:D2").unwrap()));
        assert_eq!(
            intersect_operator(&b, &row2).unwrap().single_cell(),
            Some((0, CellRef::new(1, 1)))
        );
    }
}
