//! Unicode string payloads (`ShortXLUnicodeString` in rgce, `XLUnicodeString` in rgcb).

use crate::reader::Reader;
use crate::{DecodeRgceError, EncodeRgceError};

const STR_FLAG_HIGH_BYTE: u8 = 0x01;

/// A string literal together with its storage form.
///
/// `high_byte` records whether the characters were stored as UTF-16 code units or in the
/// compressed one-byte form, so re-encoding reproduces the original bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PtgString {
    pub text: String,
    pub high_byte: bool,
}

impl PtgString {
    /// Pick the compressed form whenever every character fits in one byte.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let high_byte = text.chars().any(|c| u32::from(c) > 0xFF);
        Self { text, high_byte }
    }

    fn char_count(&self) -> usize {
        if self.high_byte {
            self.text.encode_utf16().count()
        } else {
            self.text.chars().count()
        }
    }

    fn write_chars(&self, out: &mut Vec<u8>) -> Result<(), EncodeRgceError> {
        if self.high_byte {
            for unit in self.text.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
        } else {
            for ch in self.text.chars() {
                let byte = u8::try_from(u32::from(ch))
                    .map_err(|_| EncodeRgceError::NotCompressible { ch })?;
                out.push(byte);
            }
        }
        Ok(())
    }
}

impl From<&str> for PtgString {
    fn from(value: &str) -> Self {
        PtgString::new(value)
    }
}

/// `ShortXLUnicodeString`: `cch: u8`, flags, characters.
pub(crate) fn read_short(r: &mut Reader<'_>) -> Result<PtgString, DecodeRgceError> {
    let cch = usize::from(r.u8()?);
    read_chars(r, cch)
}

/// `XLUnicodeString`: `cch: u16`, flags, characters.
pub(crate) fn read_long(r: &mut Reader<'_>) -> Result<PtgString, DecodeRgceError> {
    let cch = usize::from(r.u16()?);
    read_chars(r, cch)
}

fn read_chars(r: &mut Reader<'_>, cch: usize) -> Result<PtgString, DecodeRgceError> {
    let flags = r.u8()?;
    // Formula strings never carry the extended or rich-text runs.
    if flags & !STR_FLAG_HIGH_BYTE != 0 {
        return Err(DecodeRgceError::InvalidStringFlags {
            offset: r.ptg_offset(),
            flags,
        });
    }
    let high_byte = flags & STR_FLAG_HIGH_BYTE != 0;
    let text = if high_byte {
        let raw = r.bytes(cch * 2)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16(&units).map_err(|_| DecodeRgceError::InvalidUtf16 {
            offset: r.ptg_offset(),
        })?
    } else {
        r.bytes(cch)?.iter().copied().map(char::from).collect()
    };
    Ok(PtgString { text, high_byte })
}

pub(crate) fn write_short(s: &PtgString, out: &mut Vec<u8>) -> Result<(), EncodeRgceError> {
    let cch = s.char_count();
    let cch =
        u8::try_from(cch).map_err(|_| EncodeRgceError::StringTooLong { len: cch, max: 255 })?;
    out.push(cch);
    out.push(if s.high_byte { STR_FLAG_HIGH_BYTE } else { 0 });
    s.write_chars(out)
}

pub(crate) fn write_long(s: &PtgString, out: &mut Vec<u8>) -> Result<(), EncodeRgceError> {
    let cch = s.char_count();
    let cch = u16::try_from(cch).map_err(|_| EncodeRgceError::StringTooLong {
        len: cch,
        max: usize::from(u16::MAX),
    })?;
    out.extend_from_slice(&cch.to_le_bytes());
    out.push(if s.high_byte { STR_FLAG_HIGH_BYTE } else { 0 });
    s.write_chars(out)
}
