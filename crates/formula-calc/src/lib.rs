//! Evaluation of BIFF8 parsed formulas.
//!
//! [`Evaluator`] runs a token stream as a stack machine against a [`Workbook`] and a
//! [`FunctionDispatch`]. Spreadsheet errors (`#DIV/0!`, `#REF!`, ...) are ordinary values;
//! only a token stream that cannot be evaluated at all is an [`EvalError`].
//!
//! Around the stack machine sit the reference resolver, the array broadcaster, shared and
//! array formula instantiation, the reference tracker that lets edits find the tokens
//! pointing at moved cells, and [`Recalc`], which evaluates formula cells on demand and
//! turns circular chains into `#VALUE!`.

mod arena;
mod broadcast;
mod coercion;
mod compare;
mod error;
mod eval;
mod functions;
mod memory;
mod recalc;
mod resolve;
mod shared;
mod tracker;
mod value;
mod workbook;

pub use arena::{FormulaArena, FormulaBody, FormulaId, FormulaRecord, RefHandle, SheetResolver};
pub use broadcast::{broadcast_binary, broadcast_unary};
pub use coercion::{parse_number, to_bool, to_number, to_text};
pub use compare::{compare, compare_op};
pub use error::EvalError;
pub use eval::Evaluator;
pub use functions::{
    BasicFunctions, CallContext, FunctionCall, FunctionDispatch, NoFunctions, NotSupported,
};
pub use memory::MemoryWorkbook;
pub use recalc::Recalc;
pub use resolve::{
    implicit_intersection, intersection_cell, reference_to_array, resolve_reference, EvalContext,
};
pub use shared::{instantiate, instantiate_shared, placeholder_anchor, Instantiated};
pub use tracker::ReferenceTracker;
pub use value::{ArrayValue, Operand, Reference, SheetArea, Value};
pub use workbook::{
    ArrayFormula, DefinedName, ExternName, ExternSheet, SharedFormula, Workbook, WorkbookNames,
};
