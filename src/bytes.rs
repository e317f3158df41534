//! A forward-only cursor over a byte buffer, with big-endian integer reads.
//!
//! Every parser in this crate takes a [`ByteReader`](struct.ByteReader.html) and propagates
//! [`ReadError`](enum.ReadError.html) with `?` when the buffer runs out before the structure
//! does.  Bounded sub-structures (a descriptor body, a TLV payload) are handed out as
//! sub-readers so that a malformed inner length can never cause reads beyond the enclosing
//! structure.

use byteorder::{BigEndian, ByteOrder};

/// Error produced when a structure can't be read from the buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadError {
    /// the read would pass the end of the buffer
    UnexpectedEnd {
        requested: usize,
        remaining: usize,
    },
    /// a field value whose following layout this crate doesn't know, making the remainder of
    /// the enclosing structure unparseable
    UnhandledValue { field: &'static str, value: u8 },
}

/// Forward byte cursor over a bounded buffer.
#[derive(Clone, Debug)]
pub struct ByteReader<'buf> {
    buf: &'buf [u8],
    pos: usize,
}
impl<'buf> ByteReader<'buf> {
    pub fn new(buf: &'buf [u8]) -> ByteReader<'buf> {
        ByteReader { buf, pos: 0 }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn take(&mut self, count: usize) -> Result<&'buf [u8], ReadError> {
        if self.remaining() < count {
            return Err(ReadError::UnexpectedEnd {
                requested: count,
                remaining: self.remaining(),
            });
        }
        let s = &self.buf[self.pos..self.pos + count];
        self.pos += count;
        Ok(s)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.take(1)?[0])
    }
    pub fn read_u16(&mut self) -> Result<u16, ReadError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }
    pub fn read_u24(&mut self) -> Result<u32, ReadError> {
        Ok(BigEndian::read_u24(self.take(3)?))
    }
    pub fn read_u32(&mut self) -> Result<u32, ReadError> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }
    pub fn read_u40(&mut self) -> Result<u64, ReadError> {
        Ok(BigEndian::read_uint(self.take(5)?, 5))
    }
    pub fn read_u64(&mut self) -> Result<u64, ReadError> {
        Ok(BigEndian::read_u64(self.take(8)?))
    }

    /// Borrows the next `count` bytes without copying.
    pub fn read_slice(&mut self, count: usize) -> Result<&'buf [u8], ReadError> {
        self.take(count)
    }

    /// Copies the next `count` bytes into an owned buffer.
    pub fn read_vec(&mut self, count: usize) -> Result<Vec<u8>, ReadError> {
        Ok(self.take(count)?.to_vec())
    }

    /// Borrows everything up to the end of the buffer.
    pub fn rest(&mut self) -> &'buf [u8] {
        let s = &self.buf[self.pos..];
        self.pos = self.buf.len();
        s
    }

    pub fn peek_u8(&self) -> Result<u8, ReadError> {
        self.peek_at(0)
    }
    pub fn peek_at(&self, offset: usize) -> Result<u8, ReadError> {
        if self.remaining() <= offset {
            return Err(ReadError::UnexpectedEnd {
                requested: offset + 1,
                remaining: self.remaining(),
            });
        }
        Ok(self.buf[self.pos + offset])
    }
    pub fn peek_u16(&self) -> Result<u16, ReadError> {
        if self.remaining() < 2 {
            return Err(ReadError::UnexpectedEnd {
                requested: 2,
                remaining: self.remaining(),
            });
        }
        Ok(BigEndian::read_u16(&self.buf[self.pos..self.pos + 2]))
    }

    pub fn skip(&mut self, count: usize) -> Result<(), ReadError> {
        self.take(count).map(|_| ())
    }

    /// A bounded reader over the next `len` bytes; the parent cursor advances past them.
    pub fn sub_reader(&mut self, len: usize) -> Result<ByteReader<'buf>, ReadError> {
        Ok(ByteReader::new(self.take(len)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use matches::assert_matches;

    #[test]
    fn integers() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09];
        let mut r = ByteReader::new(&data[..]);
        assert_eq!(r.read_u8().unwrap(), 0x01);
        assert_eq!(r.read_u16().unwrap(), 0x0203);
        assert_eq!(r.read_u24().unwrap(), 0x040506);
        assert_eq!(r.remaining(), 3);
        assert_matches!(
            r.read_u32(),
            Err(ReadError::UnexpectedEnd {
                requested: 4,
                remaining: 3
            })
        );
        // a failed read must not consume anything,
        assert_eq!(r.remaining(), 3);
        assert_eq!(r.read_u24().unwrap(), 0x070809);
        assert!(r.is_eof());
    }

    #[test]
    fn wide_integers() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut r = ByteReader::new(&data[..]);
        assert_eq!(r.read_u40().unwrap(), 0x0102030405);
        let mut r = ByteReader::new(&data[..]);
        assert_eq!(r.read_u64().unwrap(), 0x0102030405060708);
    }

    #[test]
    fn peek_does_not_consume() {
        let data = [0xAB, 0xCD];
        let r = ByteReader::new(&data[..]);
        assert_eq!(r.peek_u8().unwrap(), 0xAB);
        assert_eq!(r.peek_at(1).unwrap(), 0xCD);
        assert_matches!(r.peek_at(2), Err(ReadError::UnexpectedEnd { .. }));
        assert_eq!(r.peek_u16().unwrap(), 0xABCD);
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn sub_reader_bounds() {
        let data = [1, 2, 3, 4, 5];
        let mut r = ByteReader::new(&data[..]);
        let mut sub = r.sub_reader(3).unwrap();
        assert_eq!(sub.read_u16().unwrap(), 0x0102);
        assert_matches!(sub.read_u16(), Err(ReadError::UnexpectedEnd { .. }));
        // parent has advanced past the sub-reader's bytes regardless,
        assert_eq!(r.read_u16().unwrap(), 0x0405);
    }

    #[test]
    fn rest() {
        let data = [1, 2, 3];
        let mut r = ByteReader::new(&data[..]);
        r.skip(1).unwrap();
        assert_eq!(r.rest(), &[2, 3]);
        assert!(r.is_eof());
        assert_eq!(r.rest(), &[] as &[u8]);
    }
}
