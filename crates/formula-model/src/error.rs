use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Spreadsheet error values.
///
/// `Circular` is internal to the calculation engine: it marks a formula reached again
/// while it was still being evaluated. Anything shown to a user goes through
/// [`ErrorValue::surfaced`], which turns it into `#VALUE!`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorValue {
    /// Range intersection returned no cells.
    Null,
    /// Division by zero.
    Div0,
    /// Operand type mismatch.
    Value,
    /// Reference to a nonexistent cell or sheet.
    Ref,
    /// Unknown function or defined name.
    Name,
    /// Numeric overflow or invalid numeric argument.
    Num,
    /// Lookup produced no match.
    NA,
    /// Circular dependency detected during recalculation.
    Circular,
}

impl ErrorValue {
    /// All user-visible error kinds, in BIFF code order.
    pub const ALL: [ErrorValue; 7] = [
        ErrorValue::Null,
        ErrorValue::Div0,
        ErrorValue::Value,
        ErrorValue::Ref,
        ErrorValue::Name,
        ErrorValue::Num,
        ErrorValue::NA,
    ];

    /// Machine code name.
    pub const fn code(self) -> &'static str {
        match self {
            ErrorValue::Null => "NULL",
            ErrorValue::Div0 => "DIV0",
            ErrorValue::Value => "VALUE",
            ErrorValue::Ref => "REF",
            ErrorValue::Name => "NAME",
            ErrorValue::Num => "NUM",
            ErrorValue::NA => "NA",
            ErrorValue::Circular => "CIRCULAR",
        }
    }

    /// Display string, e.g. `#DIV/0!`.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorValue::Null => "#NULL!",
            ErrorValue::Div0 => "#DIV/0!",
            ErrorValue::Value | ErrorValue::Circular => "#VALUE!",
            ErrorValue::Ref => "#REF!",
            ErrorValue::Name => "#NAME?",
            ErrorValue::Num => "#NUM!",
            ErrorValue::NA => "#N/A",
        }
    }

    /// One-byte code used by `PtgErr`, `BoolErr` records and array constants.
    pub const fn biff_code(self) -> u8 {
        match self.surfaced() {
            ErrorValue::Null => 0x00,
            ErrorValue::Div0 => 0x07,
            ErrorValue::Ref => 0x17,
            ErrorValue::Name => 0x1D,
            ErrorValue::Num => 0x24,
            ErrorValue::NA => 0x2A,
            ErrorValue::Value | ErrorValue::Circular => 0x0F,
        }
    }

    pub const fn from_biff_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => ErrorValue::Null,
            0x07 => ErrorValue::Div0,
            0x0F => ErrorValue::Value,
            0x17 => ErrorValue::Ref,
            0x1D => ErrorValue::Name,
            0x24 => ErrorValue::Num,
            0x2A => ErrorValue::NA,
            _ => return None,
        })
    }

    /// The kind a user sees.
    pub const fn surfaced(self) -> Self {
        match self {
            ErrorValue::Circular => ErrorValue::Value,
            other => other,
        }
    }

    pub const fn is_internal(self) -> bool {
        matches!(self, ErrorValue::Circular)
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown error literal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownErrorLiteral(pub String);

impl fmt::Display for UnknownErrorLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown error literal `{}`", self.0)
    }
}

impl std::error::Error for UnknownErrorLiteral {}

impl FromStr for ErrorValue {
    type Err = UnknownErrorLiteral;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        ErrorValue::ALL
            .into_iter()
            .find(|e| e.as_str() == upper)
            .ok_or_else(|| UnknownErrorLiteral(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn biff_codes_roundtrip_for_visible_errors() {
        for err in ErrorValue::ALL {
            assert_eq!(ErrorValue::from_biff_code(err.biff_code()), Some(err));
        }
        assert_eq!(ErrorValue::from_biff_code(0x01), None);
    }

    #[test]
    fn circular_surfaces_as_value() {
        assert_eq!(ErrorValue::Circular.surfaced(), ErrorValue::Value);
        assert_eq!(ErrorValue::Circular.to_string(), "#VALUE!");
        assert_eq!(ErrorValue::Circular.code(), "CIRCULAR");
        assert_eq!(ErrorValue::Circular.biff_code(), 0x0F);
    }

    #[test]
    fn parses_display_literals() {
        assert_eq!("#div/0!".parse::<ErrorValue>(), Ok(ErrorValue::Div0));
        assert_eq!("#N/A".parse::<ErrorValue>(), Ok(ErrorValue::NA));
        assert!("#SPILL!".parse::<ErrorValue>().is_err());
    }
}
