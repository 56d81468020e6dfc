//! What the evaluator needs to know about the workbook around a formula.

use formula_model::{CellRef, Range, SheetId, SheetLimits};
use formula_ptg::{Ptg, RenderContext, SheetLabel};

use crate::value::Value;

/// Result of looking up an external-sheet (`ixti`) index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternSheet {
    /// A sheet (`first == last`) or a span of sheets in this workbook.
    Local { first: SheetId, last: SheetId },
    /// A sheet in another workbook; its values are not available.
    External { book: String, sheet: String },
    /// The target sheet was deleted. `name` is kept for rendering.
    Deleted { name: Option<String> },
}

/// A defined name and the tokens of its definition.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinedName {
    pub name: String,
    /// `None` for workbook scope.
    pub scope: Option<SheetId>,
    pub tokens: Vec<Ptg>,
}

/// A name reached through `PtgNameX`.
///
/// Add-in functions have no definition; they only ever appear as the callee of a
/// user-defined function call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternName {
    pub name: String,
    pub tokens: Option<Vec<Ptg>>,
}

/// The canonical body of a shared formula group.
///
/// Relative references in `tokens` are offsets (`PtgRefN`/`PtgAreaN`) or, for 3D tokens,
/// coordinates as seen from `anchor`.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedFormula {
    pub anchor: CellRef,
    pub range: Range,
    pub tokens: Vec<Ptg>,
}

/// An array formula block; `range.start` is its anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayFormula {
    pub range: Range,
    pub tokens: Vec<Ptg>,
}

/// Workbook collaborator consulted during evaluation.
pub trait Workbook {
    fn sheet_count(&self) -> usize;

    fn sheet_name(&self, sheet: SheetId) -> Option<&str>;

    fn extern_sheet(&self, ixti: u16) -> Option<ExternSheet>;

    /// Defined name at a 1-based index.
    fn defined_name(&self, index: u16) -> Option<&DefinedName>;

    fn extern_name(&self, ixti: u16, index: u16) -> Option<&ExternName>;

    /// Current value of a cell; formula cells report their computed result.
    fn cell_value(&self, sheet: SheetId, cell: CellRef) -> Value;

    /// Bounding box of the cells in use, `None` for an empty sheet.
    fn used_extent(&self, sheet: SheetId) -> Option<Range>;

    fn shared_formula(&self, sheet: SheetId, anchor: CellRef) -> Option<&SharedFormula>;

    fn array_formula(&self, sheet: SheetId, anchor: CellRef) -> Option<&ArrayFormula>;

    /// Stored tokens of a formula cell; shared and array members hold a single `PtgExp`.
    fn cell_formula(&self, _sheet: SheetId, _cell: CellRef) -> Option<&[Ptg]> {
        None
    }

    /// Every formula cell, in a stable order.
    fn formula_cells(&self) -> Vec<(SheetId, CellRef)> {
        Vec::new()
    }
}

/// Adapts a [`Workbook`] for [`formula_ptg::render_formula`].
pub struct WorkbookNames<'a, W: ?Sized> {
    workbook: &'a W,
    limits: SheetLimits,
}

impl<'a, W: Workbook + ?Sized> WorkbookNames<'a, W> {
    pub fn new(workbook: &'a W, limits: SheetLimits) -> Self {
        Self { workbook, limits }
    }
}

impl<W: Workbook + ?Sized> RenderContext for WorkbookNames<'_, W> {
    fn sheet_label(&self, ixti: u16) -> SheetLabel {
        let name = |sheet: SheetId| self.workbook.sheet_name(sheet).map(str::to_string);
        match self.workbook.extern_sheet(ixti) {
            Some(ExternSheet::Local { first, last }) => match (name(first), name(last)) {
                (Some(first), Some(last)) => SheetLabel::Local { first, last },
                (first, _) => SheetLabel::Deleted { name: first },
            },
            Some(ExternSheet::External { book, sheet }) => SheetLabel::External { book, sheet },
            Some(ExternSheet::Deleted { name }) => SheetLabel::Deleted { name },
            None => SheetLabel::Deleted { name: None },
        }
    }

    fn defined_name(&self, index: u16) -> Option<String> {
        self.workbook.defined_name(index).map(|n| n.name.clone())
    }

    fn extern_name(&self, ixti: u16, index: u16) -> Option<String> {
        self.workbook.extern_name(ixti, index).map(|n| n.name.clone())
    }

    fn limits(&self) -> SheetLimits {
        self.limits
    }
}
