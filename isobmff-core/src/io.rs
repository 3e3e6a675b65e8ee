// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Composable byte-level I/O. Every reader/writer used by the box schema implements
//! [`ReadBytes`] or [`WriteBytes`], which provide big-endian integer accessors over an
//! arbitrary byte source or sink (ISO-BMFF is exclusively big-endian at the byte level; bit-
//! level packing within a field is handled separately by [`crate::bits`]).

use crate::errors::Result;
use std::io::Read;

/// Reads bytes and interprets them as big-endian unsigned or signed integers of standard
/// widths.
pub trait ReadBytes {
    /// Reads a single byte from the stream.
    fn read_byte(&mut self) -> Result<u8>;

    /// Reads up to the number of bytes required to fill `buf`.
    fn read_buf(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Reads exactly the number of bytes required to fill `buf`.
    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Returns the number of bytes read so far by this reader, if tracked.
    fn pos(&self) -> u64;

    #[inline(always)]
    fn read_u8(&mut self) -> Result<u8> {
        self.read_byte()
    }

    #[inline(always)]
    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_byte()? as i8)
    }

    #[inline(always)]
    fn read_be_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_buf_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    #[inline(always)]
    fn read_be_i16(&mut self) -> Result<i16> {
        Ok(self.read_be_u16()? as i16)
    }

    #[inline(always)]
    fn read_be_u24(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_buf_exact(&mut buf[1..])?;
        Ok(u32::from_be_bytes(buf))
    }

    #[inline(always)]
    fn read_be_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_buf_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    #[inline(always)]
    fn read_be_i32(&mut self) -> Result<i32> {
        Ok(self.read_be_u32()? as i32)
    }

    #[inline(always)]
    fn read_be_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_buf_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    #[inline(always)]
    fn read_be_i64(&mut self) -> Result<i64> {
        Ok(self.read_be_u64()? as i64)
    }

    /// Reads `len` bytes and returns them as a fresh `Vec<u8>`.
    fn read_boxed_slice(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_buf_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads bytes up to and including the next `0x00` terminator, returning the bytes before
    /// it (the terminator itself is consumed but not returned).
    fn read_c_string(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let b = self.read_byte()?;
            if b == 0 {
                break;
            }
            out.push(b);
        }
        Ok(out)
    }

    /// Skips `count` bytes by reading and discarding them.
    fn ignore_bytes(&mut self, count: u64) -> Result<()> {
        let mut remaining = count;
        let mut scratch = [0u8; 1024];
        while remaining > 0 {
            let n = remaining.min(scratch.len() as u64) as usize;
            self.read_buf_exact(&mut scratch[..n])?;
            remaining -= n as u64;
        }
        Ok(())
    }
}

/// A [`ReadBytes`] implementation over an in-memory byte slice, used throughout the box
/// schema since a full box's content is read into memory before its fields are parsed.
pub struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        SliceReader { data, pos: 0 }
    }

    /// Remaining unread bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes_left(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl ReadBytes for SliceReader<'_> {
    fn read_byte(&mut self) -> Result<u8> {
        if self.pos >= self.data.len() {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn read_buf(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.bytes_left());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() > self.bytes_left() {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        buf.copy_from_slice(&self.data[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    fn pos(&self) -> u64 {
        self.pos as u64
    }
}

/// Adapts any [`std::io::Read`] into a [`ReadBytes`], tracking the number of bytes consumed.
/// Used by the demuxer `Engine` over a caller-supplied data-provider.
pub struct StdReader<R: Read> {
    inner: R,
    pos: u64,
}

impl<R: Read> StdReader<R> {
    pub fn new(inner: R) -> Self {
        StdReader { inner, pos: 0 }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ReadBytes for StdReader<R> {
    fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.inner.read_exact(&mut buf)?;
        self.pos += 1;
        Ok(buf[0])
    }

    fn read_buf(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn read_buf_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn pos(&self) -> u64 {
        self.pos
    }
}

/// Writes big-endian integers into a growable byte sink. The box schema serializes each box's
/// content into a `Vec<u8>` before its header (which needs the total content length) is
/// emitted, so the only implementation needed is one over `Vec<u8>`.
pub trait WriteBytes {
    fn write_byte(&mut self, value: u8) -> Result<()>;
    fn write_buf(&mut self, buf: &[u8]) -> Result<()>;

    #[inline(always)]
    fn write_be_u16(&mut self, value: u16) -> Result<()> {
        self.write_buf(&value.to_be_bytes())
    }

    #[inline(always)]
    fn write_be_u24(&mut self, value: u32) -> Result<()> {
        self.write_buf(&value.to_be_bytes()[1..])
    }

    #[inline(always)]
    fn write_be_u32(&mut self, value: u32) -> Result<()> {
        self.write_buf(&value.to_be_bytes())
    }

    #[inline(always)]
    fn write_be_i32(&mut self, value: i32) -> Result<()> {
        self.write_be_u32(value as u32)
    }

    #[inline(always)]
    fn write_be_u64(&mut self, value: u64) -> Result<()> {
        self.write_buf(&value.to_be_bytes())
    }

    #[inline(always)]
    fn write_be_i64(&mut self, value: i64) -> Result<()> {
        self.write_be_u64(value as u64)
    }

    /// Writes `bytes`, then NUL-terminates.
    fn write_c_string(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_buf(bytes)?;
        self.write_byte(0)
    }
}

impl WriteBytes for Vec<u8> {
    fn write_byte(&mut self, value: u8) -> Result<()> {
        self.push(value);
        Ok(())
    }

    fn write_buf(&mut self, buf: &[u8]) -> Result<()> {
        self.extend_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_reader_reads_be_integers() {
        let data = [0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let mut r = SliceReader::new(&data);
        assert_eq!(r.read_be_u16().unwrap(), 0x0001);
        assert_eq!(r.read_be_u24().unwrap(), 0x020304);
        assert_eq!(r.read_be_u16().unwrap(), 0x0506);
        assert_eq!(r.read_byte().unwrap(), 0x07);
        assert!(r.read_byte().is_err());
    }

    #[test]
    fn slice_reader_reads_c_string() {
        let data = b"hello\0world";
        let mut r = SliceReader::new(data);
        assert_eq!(r.read_c_string().unwrap(), b"hello");
        assert_eq!(r.remaining(), b"world");
    }

    #[test]
    fn vec_writer_round_trips_be_u32() {
        let mut buf = Vec::new();
        buf.write_be_u32(0xdead_beef).unwrap();
        let mut r = SliceReader::new(&buf);
        assert_eq!(r.read_be_u32().unwrap(), 0xdead_beef);
    }
}
