use crate::DecodeRgceError;

/// Little-endian cursor over one rgce or rgcb buffer.
///
/// Every read reports the opcode and offset of the token being decoded so errors point at
/// the offending ptg rather than at the byte that ran out.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    ptg_offset: usize,
    ptg: u8,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            ptg_offset: 0,
            ptg: 0,
        }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Attribute subsequent failures to the token at `offset`.
    pub(crate) fn begin_token(&mut self, offset: usize, ptg: u8) {
        self.ptg_offset = offset;
        self.ptg = ptg;
    }

    pub(crate) fn ptg_offset(&self) -> usize {
        self.ptg_offset
    }

    pub(crate) fn bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeRgceError> {
        if self.remaining() < n {
            return Err(DecodeRgceError::UnexpectedEof {
                offset: self.ptg_offset,
                ptg: self.ptg,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeRgceError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DecodeRgceError> {
        Ok(self.array::<1>()?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, DecodeRgceError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub(crate) fn f64(&mut self) -> Result<f64, DecodeRgceError> {
        Ok(f64::from_le_bytes(self.array()?))
    }
}
