//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Elastic byte buffer with independent read and write cursors.
//!
//! [`ElasticBytes`] is the backing store every wire borrows: a growable
//! byte sequence with a read position, a write position, and an optional
//! read limit used to bound reading to the current document. Integers are
//! little-endian on the wire; unbounded small integers use a stop-bit
//! varint (seven data bits per byte, high bit set on the terminal byte),
//! signed values zigzag-folded first.
//!
//! [`BytesPool`] recycles buffers by size class so per-thread output
//! sinks and scratch decoders do not allocate per document.

use crate::error::{ProtocolError, WireResult};
use bytes::{BufMut, BytesMut};
use parking_lot::Mutex;

/// A growable byte sequence with independent read/write cursors.
///
/// The write cursor is the end of the underlying storage: writes append,
/// and the cursor retreats only through [`truncate_writes`]. The read
/// cursor walks from 0 toward the read limit, which defaults to the
/// write position and is narrowed while a document is open.
///
/// [`truncate_writes`]: ElasticBytes::truncate_writes
///
/// # Examples
///
/// ```rust
/// use tapewire::buffer::ElasticBytes;
///
/// # fn example() -> tapewire::WireResult<()> {
/// let mut bytes = ElasticBytes::new();
/// bytes.write_i32(42);
/// bytes.append("hi");
///
/// assert_eq!(bytes.read_i32()?, 42);
/// assert_eq!(bytes.read_utf8(2)?, "hi");
/// assert_eq!(bytes.read_remaining(), 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ElasticBytes {
    data: BytesMut,
    read_pos: usize,
    read_limit: Option<usize>,
}

impl ElasticBytes {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with at least `capacity` bytes reserved.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            read_pos: 0,
            read_limit: None,
        }
    }

    /// Current read position, in bytes from the start of the stream.
    #[must_use]
    pub fn read_position(&self) -> u64 {
        self.read_pos as u64
    }

    /// Moves the read cursor to an absolute position.
    pub fn set_read_position(&mut self, position: u64) {
        self.read_pos = (position as usize).min(self.data.len());
    }

    /// Current write position (end of written bytes).
    #[must_use]
    pub fn write_position(&self) -> u64 {
        self.data.len() as u64
    }

    /// Retreats the write cursor, discarding everything after `position`.
    pub fn truncate_writes(&mut self, position: u64) {
        self.data.truncate(position as usize);
        self.read_pos = self.read_pos.min(self.data.len());
    }

    /// Upper bound of the readable region.
    #[must_use]
    pub fn read_limit(&self) -> u64 {
        self.read_limit.unwrap_or(self.data.len()) as u64
    }

    /// Narrows the readable region to end at `limit`.
    pub fn set_read_limit(&mut self, limit: u64) {
        self.read_limit = Some((limit as usize).min(self.data.len()));
    }

    /// Restores the readable region to the full written extent.
    pub fn clear_read_limit(&mut self) {
        self.read_limit = None;
    }

    /// Bytes readable before the read limit.
    #[must_use]
    pub fn read_remaining(&self) -> u64 {
        (self.read_limit() as usize).saturating_sub(self.read_pos) as u64
    }

    /// Reads the byte at an absolute position without moving the cursor.
    ///
    /// Returns `None` past the written extent, mirroring how an absent
    /// document header reads as not-present.
    #[must_use]
    pub fn peek_unsigned_byte(&self, position: u64) -> Option<u8> {
        self.data.get(position as usize).copied()
    }

    /// Drops all content and resets both cursors.
    pub fn clear(&mut self) {
        self.data.clear();
        self.read_pos = 0;
        self.read_limit = None;
    }

    /// The full written content.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn ensure_readable(&self, needed: usize) -> WireResult<()> {
        let remaining = self.read_remaining();
        if (needed as u64) > remaining {
            return Err(ProtocolError::UnexpectedEnd {
                needed: needed as u64,
                remaining,
            }
            .into());
        }
        Ok(())
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> WireResult<u8> {
        self.ensure_readable(1)?;
        let b = self.data[self.read_pos];
        self.read_pos += 1;
        Ok(b)
    }

    /// Reads one signed byte.
    pub fn read_i8(&mut self) -> WireResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Reads a little-endian i16.
    pub fn read_i16(&mut self) -> WireResult<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    /// Reads a little-endian i32.
    pub fn read_i32(&mut self) -> WireResult<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Reads a little-endian u32.
    pub fn read_u32(&mut self) -> WireResult<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Reads a little-endian i64.
    pub fn read_i64(&mut self) -> WireResult<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Reads a little-endian f32.
    pub fn read_f32(&mut self) -> WireResult<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Reads a little-endian f64.
    pub fn read_f64(&mut self) -> WireResult<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    fn read_array<const N: usize>(&mut self) -> WireResult<[u8; N]> {
        self.ensure_readable(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.read_pos..self.read_pos + N]);
        self.read_pos += N;
        Ok(out)
    }

    /// Reads `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> WireResult<&[u8]> {
        self.ensure_readable(len)?;
        let start = self.read_pos;
        self.read_pos += len;
        Ok(&self.data[start..start + len])
    }

    /// Reads `len` bytes as UTF-8 text.
    pub fn read_utf8(&mut self, len: usize) -> WireResult<&str> {
        self.ensure_readable(len)?;
        let start = self.read_pos;
        let s = std::str::from_utf8(&self.data[start..start + len])
            .map_err(ProtocolError::Utf8)?;
        self.read_pos += len;
        Ok(s)
    }

    /// Reads a stop-bit encoded unsigned integer.
    pub fn read_stop_bit(&mut self) -> WireResult<u64> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let b = self.read_u8()?;
            value |= u64::from(b & 0x7F) << shift;
            if b & 0x80 != 0 {
                return Ok(value);
            }
            shift += 7;
            if shift >= 64 {
                return Err(ProtocolError::MalformedHeader {
                    header: 0,
                    position: self.read_position(),
                }
                .into());
            }
        }
    }

    /// Reads a zigzag stop-bit encoded signed integer.
    pub fn read_stop_bit_signed(&mut self) -> WireResult<i64> {
        let z = self.read_stop_bit()?;
        Ok(((z >> 1) as i64) ^ -((z & 1) as i64))
    }

    /// Appends one byte.
    pub fn write_u8(&mut self, value: u8) {
        self.data.put_u8(value);
    }

    /// Appends one signed byte.
    pub fn write_i8(&mut self, value: i8) {
        self.data.put_i8(value);
    }

    /// Appends a little-endian i16.
    pub fn write_i16(&mut self, value: i16) {
        self.data.put_i16_le(value);
    }

    /// Appends a little-endian i32.
    pub fn write_i32(&mut self, value: i32) {
        self.data.put_i32_le(value);
    }

    /// Appends a little-endian u32.
    pub fn write_u32(&mut self, value: u32) {
        self.data.put_u32_le(value);
    }

    /// Appends a little-endian i64.
    pub fn write_i64(&mut self, value: i64) {
        self.data.put_i64_le(value);
    }

    /// Appends a little-endian f32.
    pub fn write_f32(&mut self, value: f32) {
        self.data.put_f32_le(value);
    }

    /// Appends a little-endian f64.
    pub fn write_f64(&mut self, value: f64) {
        self.data.put_f64_le(value);
    }

    /// Appends raw bytes.
    pub fn write_slice(&mut self, bytes: &[u8]) {
        self.data.put_slice(bytes);
    }

    /// Appends UTF-8 text.
    pub fn append(&mut self, text: &str) {
        self.data.put_slice(text.as_bytes());
    }

    /// Patches a little-endian u32 at an absolute position.
    ///
    /// The region must already have been written; this is how a document
    /// header reserved at open time is filled in at commit.
    pub fn write_u32_at(&mut self, position: u64, value: u32) {
        let pos = position as usize;
        self.data[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Appends a stop-bit encoded unsigned integer.
    pub fn write_stop_bit(&mut self, mut value: u64) {
        loop {
            let bits = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.data.put_u8(bits | 0x80);
                return;
            }
            self.data.put_u8(bits);
        }
    }

    /// Appends a zigzag stop-bit encoded signed integer.
    pub fn write_stop_bit_signed(&mut self, value: i64) {
        self.write_stop_bit(((value << 1) ^ (value >> 63)) as u64);
    }
}

const POOL_CLASSES: [usize; 3] = [256, 4 * 1024, 64 * 1024];
const POOL_DEPTH: usize = 32;

static POOL: [Mutex<Vec<ElasticBytes>>; 3] =
    [Mutex::new(Vec::new()), Mutex::new(Vec::new()), Mutex::new(Vec::new())];

/// Thread-safe recycling of [`ElasticBytes`] by size class.
///
/// Buffers come back cleared; classes are 256 B, 4 KiB, and 64 KiB, and
/// requests above the largest class allocate unpooled. Each class keeps a
/// bounded free list so the pool cannot grow without limit.
pub struct BytesPool;

impl BytesPool {
    /// Takes a buffer with at least `capacity` bytes from the pool.
    #[must_use]
    pub fn get(capacity: usize) -> PooledBytes {
        for (class, &size) in POOL_CLASSES.iter().enumerate() {
            if capacity <= size {
                let recycled = POOL[class].lock().pop();
                let bytes =
                    recycled.unwrap_or_else(|| ElasticBytes::with_capacity(size));
                return PooledBytes {
                    bytes: Some(bytes),
                    class: Some(class),
                };
            }
        }
        PooledBytes {
            bytes: Some(ElasticBytes::with_capacity(capacity)),
            class: None,
        }
    }
}

/// A pooled buffer, returned to its size class on drop.
pub struct PooledBytes {
    bytes: Option<ElasticBytes>,
    class: Option<usize>,
}

impl PooledBytes {
    /// Detaches the buffer from the pool, keeping it permanently.
    #[must_use]
    pub fn into_inner(mut self) -> ElasticBytes {
        self.bytes.take().unwrap_or_default()
    }
}

impl std::ops::Deref for PooledBytes {
    type Target = ElasticBytes;

    fn deref(&self) -> &Self::Target {
        self.bytes.as_ref().expect("pooled buffer taken")
    }
}

impl std::ops::DerefMut for PooledBytes {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.bytes.as_mut().expect("pooled buffer taken")
    }
}

impl Drop for PooledBytes {
    fn drop(&mut self) {
        if let (Some(mut bytes), Some(class)) = (self.bytes.take(), self.class) {
            bytes.clear();
            let mut shelf = POOL[class].lock();
            if shelf.len() < POOL_DEPTH {
                shelf.push(bytes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_roundtrip() {
        let mut bytes = ElasticBytes::new();
        bytes.write_u8(0xAB);
        bytes.write_i16(-2);
        bytes.write_i32(1 << 20);
        bytes.write_i64(i64::MIN);
        bytes.write_f32(1.5);
        bytes.write_f64(-0.25);

        assert_eq!(bytes.read_u8().unwrap(), 0xAB);
        assert_eq!(bytes.read_i16().unwrap(), -2);
        assert_eq!(bytes.read_i32().unwrap(), 1 << 20);
        assert_eq!(bytes.read_i64().unwrap(), i64::MIN);
        assert_eq!(bytes.read_f32().unwrap(), 1.5);
        assert_eq!(bytes.read_f64().unwrap(), -0.25);
    }

    #[test]
    fn test_stop_bit_roundtrip() {
        let mut bytes = ElasticBytes::new();
        for value in [0u64, 1, 127, 128, 300, u64::from(u32::MAX), u64::MAX] {
            bytes.write_stop_bit(value);
            assert_eq!(bytes.read_stop_bit().unwrap(), value);
        }
        for value in [0i64, -1, 1, -64, 64, i64::MIN, i64::MAX] {
            bytes.write_stop_bit_signed(value);
            assert_eq!(bytes.read_stop_bit_signed().unwrap(), value);
        }
    }

    #[test]
    fn test_read_limit_bounds_reads() {
        let mut bytes = ElasticBytes::new();
        bytes.write_i32(7);
        bytes.write_i32(8);
        bytes.set_read_limit(4);

        assert_eq!(bytes.read_i32().unwrap(), 7);
        assert!(bytes.read_i32().is_err());

        bytes.clear_read_limit();
        assert_eq!(bytes.read_i32().unwrap(), 8);
    }

    #[test]
    fn test_header_patching() {
        let mut bytes = ElasticBytes::new();
        bytes.write_u32(0);
        bytes.append("payload");
        bytes.write_u32_at(0, 7 | 0x8000_0000);

        assert_eq!(bytes.read_u32().unwrap(), 7 | 0x8000_0000);
    }

    #[test]
    fn test_truncate_writes_retreats() {
        let mut bytes = ElasticBytes::new();
        bytes.append("keep");
        let mark = bytes.write_position();
        bytes.append("discard");
        bytes.truncate_writes(mark);

        assert_eq!(bytes.write_position(), 4);
        assert_eq!(bytes.read_utf8(4).unwrap(), "keep");
    }

    #[test]
    fn test_peek_is_absolute() {
        let mut bytes = ElasticBytes::new();
        bytes.append("ab");
        bytes.read_u8().unwrap();

        assert_eq!(bytes.peek_unsigned_byte(0), Some(b'a'));
        assert_eq!(bytes.peek_unsigned_byte(1), Some(b'b'));
        assert_eq!(bytes.peek_unsigned_byte(2), None);
    }

    #[test]
    fn test_pool_recycles_by_class() {
        let mut first = BytesPool::get(100);
        first.append("scratch");
        drop(first);

        let second = BytesPool::get(100);
        assert_eq!(second.read_remaining(), 0);
        assert_eq!(second.write_position(), 0);
    }

    #[test]
    fn test_pool_oversized_allocates() {
        let big = BytesPool::get(1024 * 1024);
        assert_eq!(big.write_position(), 0);
    }
}
