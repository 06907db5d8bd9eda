use crate::error::DecodeError;

/// Sequential reader over an in-memory pickle buffer.
///
/// Knows nothing about opcodes; every read either returns the requested
/// bytes or fails with a premature-end error carrying the offset where the
/// read started.
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn eof(&self, wanted: usize) -> DecodeError {
        DecodeError::malformed(
            self.pos,
            format!(
                "unexpected end of stream (wanted {wanted} bytes, {} left)",
                self.remaining()
            ),
        )
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        match self.data.get(self.pos) {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => Err(self.eof(1)),
        }
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| self.eof(n))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.read_bytes(N)?);
        Ok(buf)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32_le(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// BINFLOAT stores its double big-endian, unlike every integer opcode.
    pub fn read_f64_be(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }

    /// Read up to (not including) the next `\n`, consuming the newline.
    pub fn read_line(&mut self) -> Result<&'a [u8], DecodeError> {
        let rest = &self.data[self.pos..];
        match rest.iter().position(|&b| b == b'\n') {
            Some(idx) => {
                let line = &rest[..idx];
                self.pos += idx + 1;
                Ok(line)
            }
            None => Err(DecodeError::malformed(
                self.pos,
                "unexpected end of stream (unterminated line)",
            )),
        }
    }

    /// Read a newline-terminated line that must be ASCII/UTF-8 text.
    pub fn read_text_line(&mut self) -> Result<&'a str, DecodeError> {
        let start = self.pos;
        let line = self.read_line()?;
        std::str::from_utf8(line)
            .map_err(|_| DecodeError::malformed(start, "non-UTF-8 text argument"))
    }
}
