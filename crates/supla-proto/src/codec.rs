//! Binary codec for fixed-layout SUPLA records.
//!
//! Records are sequences of little-endian fields: fixed-width integers,
//! fixed or length-prefixed byte strings, NUL-terminated strings, enums
//! wrapping an integer, nested records and count-prefixed arrays. Some
//! records place the count of a variable member before other fixed fields,
//! so array items are always read relative to an explicit cursor rather
//! than an implicit layout.
//!
//! Decoding is incremental: a [`Reader`] walks the input field by field and
//! tracks its position, which lets callers such as the packet framer decode
//! a prefix of a record (the header) before the rest of the bytes have
//! arrived.

use crate::errors::CodecError;

/// A record that can be encoded to and decoded from its wire layout.
pub trait Codec: Sized {
    /// Append the wire form of `self` to `buf`.
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CodecError>;

    /// Decode one value from the reader, advancing it past the consumed
    /// bytes.
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError>;

    /// Encode into a fresh buffer.
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        self.encode_to(&mut buf)?;
        Ok(buf)
    }

    /// Decode one record from `bytes`, returning the value and the number
    /// of bytes consumed. Trailing bytes are left untouched.
    fn decode(bytes: &[u8]) -> Result<(Self, usize), CodecError> {
        let mut r = Reader::new(bytes);
        let value = Self::decode_from(&mut r)?;
        Ok((value, r.position()))
    }
}

/// Cursor over a byte slice with typed little-endian accessors.
#[derive(Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader over `bytes`, positioned at the start.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Take the next `n` raw bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEof);
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Read a fixed-size byte array.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read a `u8`.
    pub fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.array::<1>()?[0])
    }

    /// Read a `u8` interpreted as a boolean (non-zero is true).
    pub fn bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.u8()? != 0)
    }

    /// Read an `i16`.
    pub fn i16(&mut self) -> Result<i16, CodecError> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    /// Read a `u16`.
    pub fn u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    /// Read an `i32`.
    pub fn i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    /// Read a `u32`.
    pub fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Read an `i64`.
    pub fn i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    /// Read a `u64`.
    pub fn u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Read an `f64`.
    pub fn f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    /// Read a fixed-size NUL-terminated string field of `len` bytes.
    ///
    /// The string ends at the first NUL; any bytes after it inside the
    /// field are discarded.
    pub fn fixed_str(&mut self, len: usize) -> Result<String, CodecError> {
        let raw = self.take(len)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        std::str::from_utf8(&raw[..end])
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    /// Read `len` bytes of string data whose size prefix was already
    /// consumed by the caller. When `null_terminated`, the prefix counted a
    /// trailing NUL which is stripped here.
    pub fn var_str(&mut self, len: usize, null_terminated: bool) -> Result<String, CodecError> {
        let raw = self.take(len)?;
        let raw = if null_terminated {
            match raw.split_last() {
                Some((&0, head)) => head,
                _ => return Err(CodecError::InvalidUtf8),
            }
        } else {
            raw
        };
        std::str::from_utf8(raw).map(str::to_owned).map_err(|_| CodecError::InvalidUtf8)
    }
}

/// Append a fixed-size NUL-padded string field.
///
/// The string must leave room for at least one terminating NUL.
pub fn put_fixed_str(
    buf: &mut Vec<u8>,
    what: &'static str,
    s: &str,
    len: usize,
) -> Result<(), CodecError> {
    let bytes = s.as_bytes();
    if bytes.len() >= len {
        return Err(CodecError::TooLarge { what, len: bytes.len(), max: len - 1 });
    }
    buf.extend_from_slice(bytes);
    buf.resize(buf.len() + (len - bytes.len()), 0);
    Ok(())
}

/// Bounds-check a variable-length field against its declared maximum.
pub fn check_len(what: &'static str, len: usize, max: usize) -> Result<(), CodecError> {
    if len > max {
        return Err(CodecError::TooLarge { what, len, max });
    }
    Ok(())
}
