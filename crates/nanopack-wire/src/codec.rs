use bytes::{BufMut, BytesMut};

use crate::error::{Result, WireError};

/// Integer tag identifying a message's schema, stored in the first 4 bytes
/// of every message buffer.
pub type TypeId = i32;

/// Byte length of a variable-length field.
///
/// Signed: generated schemas use negative sizes to mark unset optional
/// fields.
pub type Size = i32;

/// Width of one size-header entry (and of the leading type ID).
pub const SIZE_ENTRY_WIDTH: usize = 4;

/// Byte offset of the size-header entry for field `field`.
///
/// Entry offsets are always 4-byte aligned relative to the buffer start;
/// the *values* they hold may describe unaligned payload regions.
pub const fn field_size_offset(field: usize) -> usize {
    SIZE_ENTRY_WIDTH * (field + 1)
}

fn bytes_at<const N: usize>(buf: &[u8], at: usize) -> Result<[u8; N]> {
    let end = at.checked_add(N).ok_or(WireError::OutOfBounds {
        offset: at,
        need: N,
        len: buf.len(),
    })?;
    let slice = buf.get(at..end).ok_or(WireError::OutOfBounds {
        offset: at,
        need: N,
        len: buf.len(),
    })?;
    let mut out = [0u8; N];
    out.copy_from_slice(slice);
    Ok(out)
}

/// Read access to a NanoPack-formatted byte buffer.
///
/// All multi-byte values are little-endian and may sit at any byte offset,
/// regardless of natural alignment. Implemented for `[u8]`, so it is
/// available on slices, `Vec<u8>`, `Bytes`, and `BytesMut` alike.
pub trait WireRead {
    /// Read the type ID of the message stored in the buffer (offset 0).
    fn read_type_id(&self) -> Result<TypeId>;

    fn read_i8(&self, at: usize) -> Result<i8>;
    fn read_u8(&self, at: usize) -> Result<u8>;
    fn read_i16(&self, at: usize) -> Result<i16>;
    fn read_u16(&self, at: usize) -> Result<u16>;
    fn read_i32(&self, at: usize) -> Result<i32>;
    fn read_u32(&self, at: usize) -> Result<u32>;
    fn read_i64(&self, at: usize) -> Result<i64>;
    fn read_u64(&self, at: usize) -> Result<u64>;

    /// Read a boolean. Byte value 1 is `true`; any other value is `false`.
    fn read_bool(&self, at: usize) -> Result<bool>;

    /// Read an IEEE-754 double (8 bytes, little-endian).
    fn read_f64(&self, at: usize) -> Result<f64>;

    /// Read a UTF-8 string of exactly `len` bytes.
    ///
    /// NanoPack strings are never NUL-terminated — `len` is the exact byte
    /// length recorded in the corresponding size header.
    fn read_string(&self, at: usize, len: usize) -> Result<String>;

    /// Read the size-header entry for field `field`.
    fn read_field_size(&self, field: usize) -> Result<Size>;

    /// Read a size embedded at an arbitrary (possibly unaligned) offset in
    /// the payload region, outside the header table.
    fn read_size_at(&self, at: usize) -> Result<Size>;
}

impl WireRead for [u8] {
    fn read_type_id(&self) -> Result<TypeId> {
        self.read_i32(0)
    }

    fn read_i8(&self, at: usize) -> Result<i8> {
        Ok(i8::from_le_bytes(bytes_at::<1>(self, at)?))
    }

    fn read_u8(&self, at: usize) -> Result<u8> {
        Ok(u8::from_le_bytes(bytes_at::<1>(self, at)?))
    }

    fn read_i16(&self, at: usize) -> Result<i16> {
        Ok(i16::from_le_bytes(bytes_at::<2>(self, at)?))
    }

    fn read_u16(&self, at: usize) -> Result<u16> {
        Ok(u16::from_le_bytes(bytes_at::<2>(self, at)?))
    }

    fn read_i32(&self, at: usize) -> Result<i32> {
        Ok(i32::from_le_bytes(bytes_at::<4>(self, at)?))
    }

    fn read_u32(&self, at: usize) -> Result<u32> {
        Ok(u32::from_le_bytes(bytes_at::<4>(self, at)?))
    }

    fn read_i64(&self, at: usize) -> Result<i64> {
        Ok(i64::from_le_bytes(bytes_at::<8>(self, at)?))
    }

    fn read_u64(&self, at: usize) -> Result<u64> {
        Ok(u64::from_le_bytes(bytes_at::<8>(self, at)?))
    }

    fn read_bool(&self, at: usize) -> Result<bool> {
        Ok(self.read_u8(at)? == 1)
    }

    fn read_f64(&self, at: usize) -> Result<f64> {
        Ok(f64::from_le_bytes(bytes_at::<8>(self, at)?))
    }

    fn read_string(&self, at: usize, len: usize) -> Result<String> {
        let end = at.checked_add(len).ok_or(WireError::OutOfBounds {
            offset: at,
            need: len,
            len: self.len(),
        })?;
        let slice = self.get(at..end).ok_or(WireError::OutOfBounds {
            offset: at,
            need: len,
            len: self.len(),
        })?;
        std::str::from_utf8(slice)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8 { offset: at })
    }

    fn read_field_size(&self, field: usize) -> Result<Size> {
        self.read_i32(field_size_offset(field))
    }

    fn read_size_at(&self, at: usize) -> Result<Size> {
        self.read_i32(at)
    }
}

/// Write access to a growable NanoPack buffer.
///
/// `append_*` methods grow the buffer; `write_*` methods overwrite bytes in
/// place and fail if the buffer is too short — the caller pre-sizes the
/// header region before filling it in.
pub trait WireWrite {
    /// Overwrite the size-header entry for field `field`.
    fn write_field_size(&mut self, field: usize, size: Size) -> Result<()>;

    /// Overwrite 4 bytes at an arbitrary offset with a little-endian size.
    fn write_size_at(&mut self, at: usize, size: Size) -> Result<()>;

    fn append_size(&mut self, size: Size);
    fn append_bool(&mut self, value: bool);
    fn append_i8(&mut self, value: i8);
    fn append_u8(&mut self, value: u8);
    fn append_i16(&mut self, value: i16);
    fn append_u16(&mut self, value: u16);
    fn append_i32(&mut self, value: i32);
    fn append_u32(&mut self, value: u32);
    fn append_i64(&mut self, value: i64);
    fn append_u64(&mut self, value: u64);

    /// Append an IEEE-754 double (8 bytes, little-endian).
    fn append_f64(&mut self, value: f64);

    /// Append raw UTF-8 bytes with no length prefix or terminator.
    ///
    /// The byte length must be recorded separately in a size header.
    fn append_string(&mut self, value: &str);
}

impl WireWrite for BytesMut {
    fn write_field_size(&mut self, field: usize, size: Size) -> Result<()> {
        self.write_size_at(field_size_offset(field), size)
    }

    fn write_size_at(&mut self, at: usize, size: Size) -> Result<()> {
        let end = at.checked_add(SIZE_ENTRY_WIDTH).ok_or(WireError::OutOfBounds {
            offset: at,
            need: SIZE_ENTRY_WIDTH,
            len: self.len(),
        })?;
        let len = self.len();
        let slot = self.get_mut(at..end).ok_or(WireError::OutOfBounds {
            offset: at,
            need: SIZE_ENTRY_WIDTH,
            len,
        })?;
        slot.copy_from_slice(&size.to_le_bytes());
        Ok(())
    }

    fn append_size(&mut self, size: Size) {
        self.append_i32(size);
    }

    fn append_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }

    fn append_i8(&mut self, value: i8) {
        self.put_i8(value);
    }

    fn append_u8(&mut self, value: u8) {
        self.put_u8(value);
    }

    fn append_i16(&mut self, value: i16) {
        self.put_i16_le(value);
    }

    fn append_u16(&mut self, value: u16) {
        self.put_u16_le(value);
    }

    fn append_i32(&mut self, value: i32) {
        self.put_i32_le(value);
    }

    fn append_u32(&mut self, value: u32) {
        self.put_u32_le(value);
    }

    fn append_i64(&mut self, value: i64) {
        self.put_i64_le(value);
    }

    fn append_u64(&mut self, value: u64) {
        self.put_u64_le(value);
    }

    fn append_f64(&mut self, value: f64) {
        self.put_f64_le(value);
    }

    fn append_string(&mut self, value: &str) {
        self.put_slice(value.as_bytes());
    }
}
