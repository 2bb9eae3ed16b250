//! Bounds-checked reader over a borrowed datagram

use thiserror::Error;

/// A read ran past the end of the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("truncated input: need {needed} bytes, have {have}")]
pub struct Truncated {
    /// Bytes the read required
    pub needed: usize,
    /// Bytes that were left
    pub have: usize,
}

/// Forward-only cursor; every read is fallible and never advances on failure
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Create a cursor at the start of `buf`
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whether every byte has been consumed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Offset of the next unread byte
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Look at the next byte without consuming it
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Look `offset` bytes ahead without consuming anything
    #[must_use]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.buf.get(self.pos + offset).copied()
    }

    /// Consume exactly `n` bytes
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if fewer than `n` bytes remain.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], Truncated> {
        if n > self.remaining() {
            return Err(Truncated {
                needed: n,
                have: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Consume everything that is left
    pub fn take_rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }

    /// Read one byte
    ///
    /// # Errors
    ///
    /// Returns `Truncated` at the end of the buffer.
    pub fn read_u8(&mut self) -> Result<u8, Truncated> {
        Ok(self.take(1)?[0])
    }

    /// Read a big-endian `u16`
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if fewer than 2 bytes remain.
    pub fn read_u16(&mut self) -> Result<u16, Truncated> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read a big-endian `u32`
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if fewer than 4 bytes remain.
    pub fn read_u32(&mut self) -> Result<u32, Truncated> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a big-endian `u64`
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if fewer than 8 bytes remain.
    pub fn read_u64(&mut self) -> Result<u64, Truncated> {
        let b = self.take(8)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(b);
        Ok(u64::from_be_bytes(word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_advance() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A];
        let mut cursor = ByteCursor::new(&data);

        assert_eq!(cursor.read_u16().unwrap(), 0x1234);
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.peek(), Some(0x56));
        assert_eq!(cursor.read_u8().unwrap(), 0x56);
        assert_eq!(cursor.remaining(), 2);
        assert_eq!(cursor.take_rest(), &[0x78, 0x9A]);
        assert!(cursor.is_empty());
        assert_eq!(cursor.peek(), None);
    }

    #[test]
    fn test_failed_read_does_not_advance() {
        let data = [0x01, 0x02, 0x03];
        let mut cursor = ByteCursor::new(&data);

        let err = cursor.read_u32().unwrap_err();
        assert_eq!(err, Truncated { needed: 4, have: 3 });
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.take(3).unwrap(), &data);
        assert!(cursor.read_u8().is_err());
    }

    #[test]
    fn test_read_u64() {
        let data = 0x0102_0304_0506_0708u64.to_be_bytes();
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_u64().unwrap(), 0x0102_0304_0506_0708);
    }
}
