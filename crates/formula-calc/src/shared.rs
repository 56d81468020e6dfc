//! Shared and array formula expansion.
//!
//! A member of a shared formula group or an array formula block stores a single `PtgExp`
//! naming the anchor cell. Its tokens are compressed until evaluation asks for them; they
//! are then expanded against the consuming cell. Nothing is cached, so every member
//! resolves its own offsets from the group's canonical body.

use formula_model::{AreaAddr, CellRef, Range, SheetId, SheetLimits};
use formula_ptg::{shift_relative, Ptg};

use crate::error::EvalError;
use crate::workbook::Workbook;

/// The tokens to evaluate for one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Instantiated<'a> {
    /// An ordinary formula, evaluated as stored.
    Plain(&'a [Ptg]),
    /// A shared formula body expanded for the consuming cell.
    Shared(Vec<Ptg>),
    /// A member of an array formula block. The body is evaluated once at `range.start`;
    /// each member reads the result at its offset.
    Array { range: Range, tokens: &'a [Ptg] },
}

impl Instantiated<'_> {
    pub fn tokens(&self) -> &[Ptg] {
        match self {
            Instantiated::Plain(tokens) => tokens,
            Instantiated::Shared(tokens) => tokens,
            Instantiated::Array { tokens, .. } => tokens,
        }
    }
}

/// The anchor named by a leading `PtgExp`, if the stored tokens are a placeholder.
pub fn placeholder_anchor(tokens: &[Ptg]) -> Option<CellRef> {
    match tokens.first() {
        Some(Ptg::Exp { row, col }) => Some(CellRef::new(u32::from(*row), u32::from(*col))),
        _ => None,
    }
}

/// Expand the stored tokens of `cell` on `sheet`.
///
/// Array blocks take precedence over shared groups anchored at the same cell.
pub fn instantiate<'a>(
    tokens: &'a [Ptg],
    sheet: SheetId,
    cell: CellRef,
    workbook: &'a dyn Workbook,
    limits: &SheetLimits,
) -> Result<Instantiated<'a>, EvalError> {
    let Some(anchor) = placeholder_anchor(tokens) else {
        return Ok(Instantiated::Plain(tokens));
    };
    if let Some(array) = workbook.array_formula(sheet, anchor) {
        if array.range.contains(cell) {
            return Ok(Instantiated::Array {
                range: array.range,
                tokens: &array.tokens,
            });
        }
    }
    if let Some(shared) = workbook.shared_formula(sheet, anchor) {
        return Ok(Instantiated::Shared(instantiate_shared(
            &shared.tokens,
            shared.anchor,
            cell,
            limits,
        )));
    }
    Err(EvalError::FormulaStructureNotFound { sheet, anchor })
}

/// Bind a shared formula body to `cell`.
///
/// `PtgRefN`/`PtgAreaN` offsets are added to the cell's coordinates, wrapping at the grid
/// edge. Relative parts of 3D references are stored as seen from `anchor` and are moved by
/// the cell's distance from it; if that leaves the grid the token becomes its `#REF!` form.
pub fn instantiate_shared(
    body: &[Ptg],
    anchor: CellRef,
    cell: CellRef,
    limits: &SheetLimits,
) -> Vec<Ptg> {
    let d_row = i64::from(cell.row) - i64::from(anchor.row);
    let d_col = i64::from(cell.col) - i64::from(anchor.col);
    body.iter()
        .map(|ptg| match ptg {
            Ptg::RefN { class, addr } => Ptg::Ref {
                class: *class,
                addr: addr.resolve(cell, limits),
            },
            Ptg::AreaN { class, area } => Ptg::Area {
                class: *class,
                area: area.resolve(cell, limits),
            },
            Ptg::Ref3d { class, ixti, addr } => {
                match shift_relative(*addr, d_row, d_col, limits) {
                    Some(addr) => Ptg::Ref3d {
                        class: *class,
                        ixti: *ixti,
                        addr,
                    },
                    None => {
                        log::warn!("shared 3D reference moved off the grid at {cell}");
                        Ptg::RefErr3d {
                            class: *class,
                            ixti: *ixti,
                            reserved: [0; 4],
                        }
                    }
                }
            }
            Ptg::Area3d { class, ixti, area } => {
                let first = shift_relative(area.first, d_row, d_col, limits);
                let last = shift_relative(area.last, d_row, d_col, limits);
                match first.zip(last) {
                    Some((first, last)) => Ptg::Area3d {
                        class: *class,
                        ixti: *ixti,
                        area: AreaAddr::new(first, last),
                    },
                    None => {
                        log::warn!("shared 3D area moved off the grid at {cell}");
                        Ptg::AreaErr3d {
                            class: *class,
                            ixti: *ixti,
                            reserved: [0; 8],
                        }
                    }
                }
            }
            other => other.clone(),
        })
        .collect()
}
