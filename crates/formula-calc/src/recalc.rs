//! On-demand recalculation with a per-pass memo and recursion lock.
//!
//! [`Recalc`] wraps a [`Workbook`] and answers `cell_value` for formula cells by evaluating
//! them. A formula reached again while it is still being evaluated reads
//! [`ErrorValue::Circular`] instead of recursing; callers see it as `#VALUE!`. Locks and
//! memoized results live until [`Recalc::end_pass`].

use std::cell::RefCell;

use ahash::{AHashMap, AHashSet};
use formula_model::{CalcSettings, CellRef, ErrorValue, Range, SheetId};
use formula_ptg::Ptg;

use crate::error::EvalError;
use crate::eval::Evaluator;
use crate::functions::FunctionDispatch;
use crate::resolve::EvalContext;
use crate::shared::{instantiate, Instantiated};
use crate::value::Value;
use crate::workbook::{ArrayFormula, DefinedName, ExternName, ExternSheet, SharedFormula, Workbook};

/// Cell, or array-block anchor, on a sheet.
type Position = (SheetId, CellRef);

#[derive(Debug, Default)]
struct Pass {
    cells: AHashMap<Position, Value>,
    blocks: AHashMap<Position, Value>,
    locked: AHashSet<Position>,
}

pub struct Recalc<'a> {
    workbook: &'a dyn Workbook,
    functions: &'a dyn FunctionDispatch,
    settings: &'a CalcSettings,
    pass: RefCell<Pass>,
}

impl<'a> Recalc<'a> {
    pub fn new(
        workbook: &'a dyn Workbook,
        functions: &'a dyn FunctionDispatch,
        settings: &'a CalcSettings,
    ) -> Self {
        Self {
            workbook,
            functions,
            settings,
            pass: RefCell::new(Pass::default()),
        }
    }

    /// Value of a cell as a reader sees it. Formula cells are computed (at most once per
    /// pass); a circular result surfaces as `#VALUE!`.
    pub fn value(&self, sheet: SheetId, cell: CellRef) -> Result<Value, EvalError> {
        self.compute(sheet, cell).map(Value::surfaced)
    }

    /// Like [`Recalc::value`], but fails with [`EvalError::NoFormula`] for constant cells.
    pub fn formula_value(&self, sheet: SheetId, cell: CellRef) -> Result<Value, EvalError> {
        if self.workbook.cell_formula(sheet, cell).is_none() {
            return Err(EvalError::NoFormula { sheet, cell });
        }
        self.value(sheet, cell)
    }

    /// Compute every formula cell of the workbook in one pass.
    pub fn recalculate_all(&self) -> Vec<(SheetId, CellRef, Result<Value, EvalError>)> {
        let cells = self.workbook.formula_cells();
        log::trace!("recalculating {} formula cells", cells.len());
        cells
            .into_iter()
            .map(|(sheet, cell)| (sheet, cell, self.value(sheet, cell)))
            .collect()
    }

    /// Drop memoized results and release every lock.
    pub fn end_pass(&self) {
        let mut pass = self.pass.borrow_mut();
        log::trace!(
            "pass ended with {} cells and {} array blocks computed",
            pass.cells.len(),
            pass.blocks.len()
        );
        *pass = Pass::default();
    }

    fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(self, self.functions, self.settings)
    }

    fn compute(&self, sheet: SheetId, cell: CellRef) -> Result<Value, EvalError> {
        let Some(tokens) = self.workbook.cell_formula(sheet, cell) else {
            return Ok(self.workbook.cell_value(sheet, cell));
        };
        if let Some(value) = self.pass.borrow().cells.get(&(sheet, cell)) {
            return Ok(value.clone());
        }

        let limits = self.settings.limits;
        let value = match instantiate(tokens, sheet, cell, self.workbook, &limits)? {
            Instantiated::Array { range, tokens } => {
                let block = self.array_block(sheet, range, tokens)?;
                array_member(&block, range, cell)
            }
            formula => {
                let ctx = EvalContext::new(sheet, cell);
                self.locked((sheet, cell), || {
                    self.evaluator().evaluate(formula.tokens(), ctx)
                })?
            }
        };
        self.pass
            .borrow_mut()
            .cells
            .insert((sheet, cell), value.clone());
        Ok(value)
    }

    fn array_block(
        &self,
        sheet: SheetId,
        range: Range,
        tokens: &[Ptg],
    ) -> Result<Value, EvalError> {
        let anchor = (sheet, range.start);
        if let Some(value) = self.pass.borrow().blocks.get(&anchor) {
            return Ok(value.clone());
        }
        let ctx = EvalContext::new(sheet, range.start);
        let value = self.locked(anchor, || self.evaluator().evaluate_array(tokens, ctx))?;
        log::trace!("array block at {} on sheet {sheet} computed", range.start);
        self.pass.borrow_mut().blocks.insert(anchor, value.clone());
        Ok(value)
    }

    fn locked(
        &self,
        position: Position,
        evaluate: impl FnOnce() -> Result<Value, EvalError>,
    ) -> Result<Value, EvalError> {
        if !self.pass.borrow_mut().locked.insert(position) {
            log::debug!(
                "circular reference through {} on sheet {}",
                position.1,
                position.0
            );
            return Ok(Value::Error(ErrorValue::Circular));
        }
        let result = evaluate();
        self.pass.borrow_mut().locked.remove(&position);
        result
    }
}

/// The part of an array block result that `cell` displays.
fn array_member(block: &Value, range: Range, cell: CellRef) -> Value {
    match block {
        Value::Array(array) => {
            let row = (cell.row - range.start.row) as usize;
            let col = (cell.col - range.start.col) as usize;
            array
                .get(row, col)
                .cloned()
                .unwrap_or(Value::Error(ErrorValue::NA))
        }
        scalar => scalar.clone(),
    }
}

impl Workbook for Recalc<'_> {
    fn sheet_count(&self) -> usize {
        self.workbook.sheet_count()
    }

    fn sheet_name(&self, sheet: SheetId) -> Option<&str> {
        self.workbook.sheet_name(sheet)
    }

    fn extern_sheet(&self, ixti: u16) -> Option<ExternSheet> {
        self.workbook.extern_sheet(ixti)
    }

    fn defined_name(&self, index: u16) -> Option<&DefinedName> {
        self.workbook.defined_name(index)
    }

    fn extern_name(&self, ixti: u16, index: u16) -> Option<&ExternName> {
        self.workbook.extern_name(ixti, index)
    }

    /// Formula cells are computed. A structural failure in a referenced formula reads as
    /// `#VALUE!` to the formula that asked.
    fn cell_value(&self, sheet: SheetId, cell: CellRef) -> Value {
        match self.compute(sheet, cell) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("formula at {cell} on sheet {sheet} failed: {err}");
                Value::Error(ErrorValue::Value)
            }
        }
    }

    fn used_extent(&self, sheet: SheetId) -> Option<Range> {
        self.workbook.used_extent(sheet)
    }

    fn shared_formula(&self, sheet: SheetId, anchor: CellRef) -> Option<&SharedFormula> {
        self.workbook.shared_formula(sheet, anchor)
    }

    fn array_formula(&self, sheet: SheetId, anchor: CellRef) -> Option<&ArrayFormula> {
        self.workbook.array_formula(sheet, anchor)
    }

    fn cell_formula(&self, sheet: SheetId, cell: CellRef) -> Option<&[Ptg]> {
        self.workbook.cell_formula(sheet, cell)
    }

    fn formula_cells(&self) -> Vec<(SheetId, CellRef)> {
        self.workbook.formula_cells()
    }
}
