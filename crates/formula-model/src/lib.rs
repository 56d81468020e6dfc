//! Core addressing and error types shared by the token model and the calculation engine.
//!
//! Rows and columns are 0-indexed throughout; A1 text is produced only at the edges.

mod address;
mod calc_settings;
mod display;
mod error;
mod sheet_name;

pub use address::{
    col_to_name, name_to_col_index, A1ParseError, AreaAddr, CellAddr, CellRef, Components, Range,
    RangeParseError,
};
pub use calc_settings::{CalcSettings, CalculationMode, SheetLimits};
pub use display::format_number;
pub use error::{ErrorValue, UnknownErrorLiteral};
pub use sheet_name::{format_sheet_span, quote_sheet_name, sheet_name_needs_quotes};

/// Index of a worksheet within its workbook (0-based, in tab order).
pub type SheetId = usize;
