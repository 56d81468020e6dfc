//! Array constants (`{1,2;3,4}`), whose values live in the rgcb block after the token stream.

use formula_model::{format_number, ErrorValue};

use crate::reader::Reader;
use crate::strings::{read_long, write_long, PtgString};
use crate::{DecodeRgceError, EncodeRgceError};

const SER_NIL: u8 = 0x00;
const SER_NUM: u8 = 0x01;
const SER_STR: u8 = 0x02;
const SER_BOOL: u8 = 0x04;
const SER_ERR: u8 = 0x10;
/// Type byte plus the shortest payload (an empty string's `cch` and flags).
const MIN_ELEMENT_LEN: usize = 4;

/// One element of an array constant.
///
/// The unused bytes of the fixed-size element layouts are kept so a decoded block
/// re-encodes byte for byte.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayElement {
    Empty { reserved: [u8; 8] },
    Number(f64),
    Str(PtgString),
    /// `raw` is the stored byte; any non-zero value is TRUE.
    Bool { raw: u8, reserved: [u8; 7] },
    Error { value: ErrorValue, reserved: [u8; 7] },
}

impl ArrayElement {
    pub const fn empty() -> Self {
        ArrayElement::Empty { reserved: [0; 8] }
    }

    pub const fn bool(value: bool) -> Self {
        ArrayElement::Bool {
            raw: value as u8,
            reserved: [0; 7],
        }
    }

    pub const fn error(value: ErrorValue) -> Self {
        ArrayElement::Error {
            value,
            reserved: [0; 7],
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            ArrayElement::Empty { .. } => {}
            ArrayElement::Number(n) => out.push_str(&format_number(*n)),
            ArrayElement::Str(s) => {
                out.push('"');
                out.push_str(&s.text.replace('"', "\"\""));
                out.push('"');
            }
            ArrayElement::Bool { raw: 0, .. } => out.push_str("FALSE"),
            ArrayElement::Bool { .. } => out.push_str("TRUE"),
            ArrayElement::Error { value, .. } => out.push_str(value.as_str()),
        }
    }
}

/// A rectangular constant with its values stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayConstant {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<ArrayElement>,
}

impl ArrayConstant {
    /// Returns `None` when `values` does not hold exactly `rows * cols` elements.
    pub fn new(rows: usize, cols: usize, values: Vec<ArrayElement>) -> Option<Self> {
        (rows > 0 && cols > 0 && rows * cols == values.len()).then_some(Self {
            rows,
            cols,
            values,
        })
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&ArrayElement> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.values.get(row * self.cols + col)
    }

    /// Formula text, e.g. `{1,2;"a",TRUE}`.
    pub fn to_formula_text(&self) -> String {
        let mut out = String::from("{");
        for row in 0..self.rows {
            if row > 0 {
                out.push(';');
            }
            for col in 0..self.cols {
                if col > 0 {
                    out.push(',');
                }
                if let Some(v) = self.get(row, col) {
                    v.render(&mut out);
                }
            }
        }
        out.push('}');
        out
    }

    pub(crate) fn read(r: &mut Reader<'_>) -> Result<Self, DecodeRgceError> {
        // Dimensions are stored as `cols - 1` (one byte) then `rows - 1` (two bytes).
        let cols = usize::from(r.u8()?) + 1;
        let rows = usize::from(r.u16()?) + 1;
        // The header is untrusted; never reserve more elements than the block can hold.
        let mut values = Vec::with_capacity((rows * cols).min(r.remaining() / MIN_ELEMENT_LEN));
        for _ in 0..rows * cols {
            let kind = r.u8()?;
            let value = match kind {
                SER_NIL => ArrayElement::Empty {
                    reserved: r.array()?,
                },
                SER_NUM => ArrayElement::Number(r.f64()?),
                SER_STR => ArrayElement::Str(read_long(r)?),
                SER_BOOL => ArrayElement::Bool {
                    raw: r.u8()?,
                    reserved: r.array()?,
                },
                SER_ERR => {
                    let code = r.u8()?;
                    let value = ErrorValue::from_biff_code(code).ok_or(
                        DecodeRgceError::InvalidErrorCode {
                            offset: r.ptg_offset(),
                            code,
                        },
                    )?;
                    ArrayElement::Error {
                        value,
                        reserved: r.array()?,
                    }
                }
                other => {
                    return Err(DecodeRgceError::InvalidArrayElement {
                        offset: r.ptg_offset(),
                        kind: other,
                    })
                }
            };
            values.push(value);
        }
        Ok(Self { rows, cols, values })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) -> Result<(), EncodeRgceError> {
        let too_large = EncodeRgceError::ArrayTooLarge {
            rows: self.rows,
            cols: self.cols,
        };
        if self.rows == 0 || self.cols == 0 || self.values.len() != self.rows * self.cols {
            return Err(too_large);
        }
        let cols = u8::try_from(self.cols - 1).map_err(|_| too_large.clone())?;
        let rows = u16::try_from(self.rows - 1).map_err(|_| too_large)?;
        out.push(cols);
        out.extend_from_slice(&rows.to_le_bytes());
        for value in &self.values {
            match value {
                ArrayElement::Empty { reserved } => {
                    out.push(SER_NIL);
                    out.extend_from_slice(reserved);
                }
                ArrayElement::Number(n) => {
                    out.push(SER_NUM);
                    out.extend_from_slice(&n.to_le_bytes());
                }
                ArrayElement::Str(s) => {
                    out.push(SER_STR);
                    write_long(s, out)?;
                }
                ArrayElement::Bool { raw, reserved } => {
                    out.push(SER_BOOL);
                    out.push(*raw);
                    out.extend_from_slice(reserved);
                }
                ArrayElement::Error { value, reserved } => {
                    out.push(SER_ERR);
                    out.push(value.biff_code());
                    out.extend_from_slice(reserved);
                }
            }
        }
        Ok(())
    }
}
