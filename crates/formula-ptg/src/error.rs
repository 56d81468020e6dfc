use thiserror::Error;

/// Failure to decode an rgce token stream (or its trailing rgcb block).
///
/// Offsets are byte positions of the offending token within `rgce`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeRgceError {
    #[error("unexpected end of rgce at offset {offset} (ptg={ptg:#04x}, needed {needed} bytes, {remaining} remaining)")]
    UnexpectedEof {
        offset: usize,
        ptg: u8,
        needed: usize,
        remaining: usize,
    },
    #[error("unsupported ptg {ptg:#04x} at offset {offset}")]
    UnsupportedToken { offset: usize, ptg: u8 },
    #[error("invalid error code {code:#04x} at offset {offset}")]
    InvalidErrorCode { offset: usize, code: u8 },
    #[error("invalid string flags {flags:#04x} at offset {offset}")]
    InvalidStringFlags { offset: usize, flags: u8 },
    #[error("invalid UTF-16 string at offset {offset}")]
    InvalidUtf16 { offset: usize },
    #[error("invalid array element type {kind:#04x} for token at offset {offset}")]
    InvalidArrayElement { offset: usize, kind: u8 },
    #[error("rgcb data for token at offset {offset} (ptg={ptg:#04x}) is truncated")]
    TruncatedRgcb { offset: usize, ptg: u8 },
}

impl DecodeRgceError {
    /// Offset of the token the error refers to.
    pub fn offset(&self) -> usize {
        match self {
            DecodeRgceError::UnexpectedEof { offset, .. }
            | DecodeRgceError::UnsupportedToken { offset, .. }
            | DecodeRgceError::InvalidErrorCode { offset, .. }
            | DecodeRgceError::InvalidStringFlags { offset, .. }
            | DecodeRgceError::InvalidUtf16 { offset }
            | DecodeRgceError::InvalidArrayElement { offset, .. }
            | DecodeRgceError::TruncatedRgcb { offset, .. } => *offset,
        }
    }
}

/// A token that cannot be represented in the BIFF8 binary layout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeRgceError {
    #[error("string of {len} characters exceeds the {max} character limit")]
    StringTooLong { len: usize, max: usize },
    #[error("character {ch:?} cannot be stored in a compressed string")]
    NotCompressible { ch: char },
    #[error("array constant of {rows}x{cols} does not fit the value block")]
    ArrayTooLarge { rows: usize, cols: usize },
    #[error("cell address {row}:{col} is outside the encodable grid")]
    AddressOutOfRange { row: u32, col: u32 },
    #[error("argument count {argc} exceeds 127")]
    TooManyArguments { argc: u8 },
    #[error("function id {iftab} exceeds 0x7FFF")]
    FunctionIdOutOfRange { iftab: u16 },
    #[error("list of {len} entries does not fit a 16-bit count")]
    ListTooLong { len: usize },
}

/// Failure to render a token sequence as formula text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("token {index} (ptg={ptg:#04x}) needs {needed} operands but only {available} are available")]
    StackUnderflow {
        index: usize,
        ptg: u8,
        needed: usize,
        available: usize,
    },
    #[error("formula left {remaining} expressions on the stack")]
    StackNotSingular { remaining: usize },
    #[error("unknown function id {iftab} at token {index}")]
    UnknownFunction { index: usize, iftab: u16 },
    #[error("token {index} is a shared/array placeholder that must be instantiated first")]
    UnresolvedPlaceholder { index: usize },
}
