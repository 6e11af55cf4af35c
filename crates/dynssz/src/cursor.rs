//! Decode cursors.
//!
//! The decoder reads through a cursor so the same walker serves in-memory
//! buffers and streams. A cursor tracks a stack of byte limits: entering a
//! dynamic region pushes its exact length, and popping reports how many
//! bytes the region left unconsumed.
//!
//! [`SliceCursor`] is seekable, which lets container decoding read dynamic
//! offsets in place. [`StreamCursor`] is not; the decoder collects offsets
//! into a pooled vector instead.

use std::io::Read;

use smallvec::SmallVec;

use crate::error::SszError;

/// Stack of absolute region ends. Deep nesting spills to the heap.
type LimitStack = SmallVec<[usize; 8]>;

/// Unknown stream length sentinel.
const UNBOUNDED: usize = usize::MAX;

/// A positioned, limit-tracking byte source.
pub(crate) trait Cursor {
    /// Read `out.len()` bytes.
    fn decode_bytes_into(&mut self, out: &mut [u8]) -> Result<(), SszError>;

    /// Advance past `n` bytes without interpreting them.
    fn skip(&mut self, n: usize) -> Result<(), SszError>;

    /// Absolute position in the underlying source.
    fn position(&self) -> usize;

    /// Bytes left before the innermost limit; `None` when unbounded.
    fn remaining(&self) -> Option<usize>;

    /// Bound the next `n` bytes as a nested region.
    fn push_limit(&mut self, n: usize) -> Result<(), SszError>;

    /// Leave the innermost region, reporting unconsumed bytes.
    fn pop_limit(&mut self) -> usize;

    /// `true` when [`Cursor::decode_offset_at`] is available.
    fn can_seek(&self) -> bool {
        false
    }

    /// Read a 4-byte offset at an absolute position without moving.
    fn decode_offset_at(&mut self, _pos: usize) -> Result<usize, SszError> {
        Err(SszError::Offset(
            "offset lookup on a non-seekable cursor".to_string(),
        ))
    }

    /// Read one byte.
    fn decode_u8(&mut self) -> Result<u8, SszError> {
        let mut buf = [0u8; 1];
        self.decode_bytes_into(&mut buf)?;
        Ok(buf[0])
    }

    /// Read a little-endian `u16`.
    fn decode_u16(&mut self) -> Result<u16, SszError> {
        let mut buf = [0u8; 2];
        self.decode_bytes_into(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Read a little-endian `u32`.
    fn decode_u32(&mut self) -> Result<u32, SszError> {
        let mut buf = [0u8; 4];
        self.decode_bytes_into(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a little-endian `u64`.
    fn decode_u64(&mut self) -> Result<u64, SszError> {
        let mut buf = [0u8; 8];
        self.decode_bytes_into(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a boolean; bytes other than 0 and 1 are invalid.
    fn decode_bool(&mut self) -> Result<bool, SszError> {
        match self.decode_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SszError::InvalidValue(format!(
                "boolean byte must be 0 or 1, found {other}"
            ))),
        }
    }

    /// Read `n` bytes into a fresh buffer.
    fn decode_bytes(&mut self, n: usize) -> Result<Vec<u8>, SszError> {
        let mut out = vec![0u8; n];
        self.decode_bytes_into(&mut out)?;
        Ok(out)
    }

    /// Read a 4-byte little-endian offset.
    fn decode_offset(&mut self) -> Result<usize, SszError> {
        Ok(self.decode_u32()? as usize)
    }
}

/// Seekable cursor over an in-memory buffer.
#[derive(Debug)]
pub(crate) struct SliceCursor<'a> {
    data: &'a [u8],
    pos: usize,
    limits: LimitStack,
}

impl<'a> SliceCursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        let mut limits = LimitStack::new();
        limits.push(data.len());
        Self {
            data,
            pos: 0,
            limits,
        }
    }

    fn end(&self) -> usize {
        *self.limits.last().expect("base limit always present")
    }

    fn check(&self, n: usize) -> Result<(), SszError> {
        let available = self.end() - self.pos;
        if n > available {
            return Err(SszError::UnexpectedEof {
                needed: n,
                available,
            });
        }
        Ok(())
    }
}

impl Cursor for SliceCursor<'_> {
    fn decode_bytes_into(&mut self, out: &mut [u8]) -> Result<(), SszError> {
        self.check(out.len())?;
        out.copy_from_slice(&self.data[self.pos..self.pos + out.len()]);
        self.pos += out.len();
        Ok(())
    }

    fn skip(&mut self, n: usize) -> Result<(), SszError> {
        self.check(n)?;
        self.pos += n;
        Ok(())
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.end() - self.pos)
    }

    fn push_limit(&mut self, n: usize) -> Result<(), SszError> {
        let end = self.pos + n;
        if end > self.end() {
            return Err(SszError::Offset(format!(
                "region of {n} bytes at {} exceeds the enclosing region",
                self.pos
            )));
        }
        self.limits.push(end);
        Ok(())
    }

    fn pop_limit(&mut self) -> usize {
        let end = self.limits.pop().expect("pop matches a push");
        end - self.pos
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn decode_offset_at(&mut self, pos: usize) -> Result<usize, SszError> {
        if pos + 4 > self.data.len() {
            return Err(SszError::UnexpectedEof {
                needed: 4,
                available: self.data.len().saturating_sub(pos),
            });
        }
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[pos..pos + 4]);
        Ok(u32::from_le_bytes(buf) as usize)
    }
}

/// Non-seekable cursor over a byte stream.
#[derive(Debug)]
pub(crate) struct StreamCursor<R> {
    inner: R,
    pos: usize,
    limits: LimitStack,
}

impl<R: Read> StreamCursor<R> {
    /// `declared` bounds the whole value when the caller knows it.
    pub(crate) fn new(inner: R, declared: Option<usize>) -> Self {
        let mut limits = LimitStack::new();
        limits.push(declared.unwrap_or(UNBOUNDED));
        Self {
            inner,
            pos: 0,
            limits,
        }
    }

    fn end(&self) -> usize {
        *self.limits.last().expect("base limit always present")
    }

    fn check(&self, n: usize) -> Result<(), SszError> {
        let end = self.end();
        if end != UNBOUNDED {
            let available = end - self.pos;
            if n > available {
                return Err(SszError::UnexpectedEof {
                    needed: n,
                    available,
                });
            }
        }
        Ok(())
    }
}

impl<R: Read> Cursor for StreamCursor<R> {
    fn decode_bytes_into(&mut self, out: &mut [u8]) -> Result<(), SszError> {
        self.check(out.len())?;
        self.inner.read_exact(out).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                SszError::UnexpectedEof {
                    needed: out.len(),
                    available: 0,
                }
            } else {
                SszError::Io(e)
            }
        })?;
        self.pos += out.len();
        Ok(())
    }

    fn skip(&mut self, n: usize) -> Result<(), SszError> {
        self.check(n)?;
        let mut left = n;
        let mut scratch = [0u8; 64];
        while left > 0 {
            let step = left.min(scratch.len());
            self.decode_bytes_into_unchecked(&mut scratch[..step])?;
            left -= step;
        }
        Ok(())
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> Option<usize> {
        match self.end() {
            UNBOUNDED => None,
            end => Some(end - self.pos),
        }
    }

    fn push_limit(&mut self, n: usize) -> Result<(), SszError> {
        let end = self.pos + n;
        let top = self.end();
        if top != UNBOUNDED && end > top {
            return Err(SszError::Offset(format!(
                "region of {n} bytes at {} exceeds the enclosing region",
                self.pos
            )));
        }
        self.limits.push(end);
        Ok(())
    }

    fn pop_limit(&mut self) -> usize {
        let end = self.limits.pop().expect("pop matches a push");
        if end == UNBOUNDED {
            0
        } else {
            end - self.pos
        }
    }
}

impl<R: Read> StreamCursor<R> {
    fn decode_bytes_into_unchecked(&mut self, out: &mut [u8]) -> Result<(), SszError> {
        self.inner.read_exact(out).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                SszError::UnexpectedEof {
                    needed: out.len(),
                    available: 0,
                }
            } else {
                SszError::Io(e)
            }
        })?;
        self.pos += out.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_cursor_reads_and_limits() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let mut cur = SliceCursor::new(&data);
        assert!(cur.can_seek());
        assert_eq!(cur.decode_u16().unwrap(), 0x0201);
        cur.push_limit(2).unwrap();
        assert_eq!(cur.decode_u8().unwrap(), 3);
        assert_eq!(cur.pop_limit(), 1);
        assert_eq!(cur.position(), 3);
        assert_eq!(cur.remaining(), Some(3));
    }

    #[test]
    fn slice_cursor_eof() {
        let data = [1u8, 2];
        let mut cur = SliceCursor::new(&data);
        assert!(matches!(
            cur.decode_u32(),
            Err(SszError::UnexpectedEof {
                needed: 4,
                available: 2
            })
        ));
    }

    #[test]
    fn slice_cursor_limit_overflow_is_offset_error() {
        let data = [0u8; 4];
        let mut cur = SliceCursor::new(&data);
        assert!(matches!(cur.push_limit(8), Err(SszError::Offset(_))));
    }

    #[test]
    fn slice_cursor_offset_at() {
        let data = [0u8, 0, 8, 0, 0, 0];
        let mut cur = SliceCursor::new(&data);
        assert_eq!(cur.decode_offset_at(2).unwrap(), 8);
        assert_eq!(cur.position(), 0);
    }

    #[test]
    fn bool_validation() {
        let data = [2u8];
        let mut cur = SliceCursor::new(&data);
        assert!(matches!(cur.decode_bool(), Err(SszError::InvalidValue(_))));
    }

    #[test]
    fn stream_cursor_tracks_limits() {
        let data = vec![7u8; 10];
        let mut cur = StreamCursor::new(data.as_slice(), Some(10));
        assert!(!cur.can_seek());
        cur.skip(3).unwrap();
        assert_eq!(cur.position(), 3);
        assert_eq!(cur.remaining(), Some(7));
        cur.push_limit(4).unwrap();
        assert_eq!(cur.decode_u32().unwrap(), 0x0707_0707);
        assert_eq!(cur.pop_limit(), 0);
    }

    #[test]
    fn stream_cursor_eof_maps_to_ssz_error() {
        let data = [1u8];
        let mut cur = StreamCursor::new(data.as_slice(), None);
        assert!(matches!(
            cur.decode_u64(),
            Err(SszError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn stream_cursor_refuses_seeking() {
        let data = [0u8; 8];
        let mut cur = StreamCursor::new(data.as_slice(), Some(8));
        assert!(matches!(cur.decode_offset_at(0), Err(SszError::Offset(_))));
    }
}
