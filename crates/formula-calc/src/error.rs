use formula_model::{CellRef, SheetId};
use formula_ptg::DecodeRgceError;
use thiserror::Error;

/// Structural failures: the token stream or the workbook around it is inconsistent.
///
/// Spreadsheet errors such as `#DIV/0!` are never reported here; they are ordinary values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Decode(#[from] DecodeRgceError),
    #[error("token {index} (ptg 0x{ptg:02X}) needs {needed} operand(s) but only {available} are on the stack")]
    StackUnderflow {
        index: usize,
        ptg: u8,
        needed: usize,
        available: usize,
    },
    #[error("formula left {remaining} value(s) on the stack instead of one")]
    MalformedStack { remaining: usize },
    #[error("token {index} calls function id {iftab}, which has no fixed argument count")]
    UnknownFunctionArity { index: usize, iftab: u16 },
    #[error("token {index} (ptg 0x{ptg:02X}) cannot be evaluated")]
    UnsupportedInEvaluation { index: usize, ptg: u8 },
    #[error("no shared or array formula anchored at {anchor} on sheet {sheet}")]
    FormulaStructureNotFound { sheet: SheetId, anchor: CellRef },
    #[error("no formula stored at {cell} on sheet {sheet}")]
    NoFormula { sheet: SheetId, cell: CellRef },
}
