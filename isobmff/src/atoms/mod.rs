// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The box schema: one module per supported box, plus the shared header/iterator/full-box
//! machinery every box builds on.

pub(crate) mod co64;
pub(crate) mod ctts;
pub(crate) mod dinf;
pub(crate) mod edts;
pub(crate) mod ftyp;
pub(crate) mod hdlr;
pub(crate) mod mdhd;
pub(crate) mod mdia;
pub(crate) mod mfhd;
pub(crate) mod minf;
pub(crate) mod moof;
pub(crate) mod moov;
pub(crate) mod mvex;
pub(crate) mod mvhd;
pub(crate) mod sidx;
pub(crate) mod smhd;
pub(crate) mod stbl;
pub(crate) mod stco;
pub(crate) mod stsc;
pub(crate) mod stsd;
pub(crate) mod stss;
pub(crate) mod stsz;
pub(crate) mod stts;
pub(crate) mod tfdt;
pub(crate) mod tfhd;
pub(crate) mod tkhd;
pub(crate) mod traf;
pub(crate) mod trak;
pub(crate) mod trex;
pub(crate) mod trun;
pub(crate) mod vmhd;

pub use ftyp::FtypAtom;
pub use mdia::MdiaAtom;
pub use minf::MinfAtom;
pub use moof::MoofAtom;
pub use moov::MoovAtom;
pub use sidx::SidxAtom;
pub use stbl::StblAtom;
pub use stsd::SampleEntry;
pub use trak::TrakAtom;

use isobmff_core::errors::{malformed_error, truncated_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};
use log::trace;

/// Box header size when `size` fits in 32 bits: 4-byte size + 4-byte name.
pub const HEADER_SIZE: u64 = 8;
/// Box header size when the 64-bit `largesize` extension follows: 4 (size==1 marker) +
/// 4 (name) + 8 (largesize).
pub const LARGE_HEADER_SIZE: u64 = 16;

#[derive(Debug, Clone, Copy)]
pub struct AtomHeader {
    pub name: [u8; 4],
    /// Total size of the box (header + content), as declared on the wire.
    pub size: u64,
    pub header_len: u64,
}

impl AtomHeader {
    /// Reads a box header from `r`. `r` must be positioned at the start of the box.
    pub fn read<R: ReadBytes>(r: &mut R) -> Result<AtomHeader> {
        let declared_size = r.read_be_u32()?;
        let mut name = [0u8; 4];
        r.read_buf_exact(&mut name)?;

        let (size, header_len) = if declared_size == 1 {
            let largesize = r.read_be_u64()?;
            (largesize, LARGE_HEADER_SIZE)
        } else {
            (u64::from(declared_size), HEADER_SIZE)
        };

        trace!("atom header: name={:?} size={}", String::from_utf8_lossy(&name), size);

        Ok(AtomHeader { name, size, header_len })
    }

    /// Length of the box's content, excluding its own header.
    pub fn content_len(&self) -> Result<u64> {
        if self.size < self.header_len {
            return malformed_error(
                BoxContext::new(display_name(&self.name)),
                "box size smaller than its own header",
            );
        }
        Ok(self.size - self.header_len)
    }
}

pub fn display_name(name: &[u8; 4]) -> String {
    name.iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect()
}

/// Writes a box header followed by `content`, computing the size field from `content.len()`.
/// This toolkit never emits the 64-bit `largesize` form (parsing it is required; emitting it
/// is explicitly out of scope).
pub fn write_box(out: &mut Vec<u8>, name: &[u8; 4], content: &[u8]) -> Result<()> {
    let total = HEADER_SIZE + content.len() as u64;
    if total > u32::MAX as u64 {
        return malformed_error(
            BoxContext::new(display_name(name)),
            "box content too large to emit without largesize, which this toolkit does not emit",
        );
    }
    out.write_be_u32(total as u32)?;
    out.write_buf(name)?;
    out.write_buf(content)?;
    Ok(())
}

/// The version+flags preamble shared by every "full box" (the version byte, followed by a
/// 24-bit flags field).
#[derive(Debug, Clone, Copy, Default)]
pub struct FullBoxHeader {
    pub version: u8,
    pub flags: u32,
}

impl FullBoxHeader {
    pub fn read<R: ReadBytes>(r: &mut R) -> Result<FullBoxHeader> {
        let version = r.read_u8()?;
        let flags = r.read_be_u24()?;
        Ok(FullBoxHeader { version, flags })
    }

    pub fn write<W: WriteBytes>(&self, w: &mut W) -> Result<()> {
        w.write_byte(self.version)?;
        w.write_be_u24(self.flags)
    }
}

/// Walks sibling boxes within a bounded content region, yielding each child's header and a
/// reader scoped to exactly its content.
pub struct AtomIterator<'a> {
    reader: SliceReader<'a>,
    box_path: String,
}

impl<'a> AtomIterator<'a> {
    pub fn new(data: &'a [u8], box_path: impl Into<String>) -> Self {
        AtomIterator { reader: SliceReader::new(data), box_path: box_path.into() }
    }

    /// Returns the next child's header and a reader over exactly its content, or `None` when
    /// the bounded region is exhausted.
    pub fn next_atom(&mut self) -> Result<Option<(AtomHeader, SliceReader<'a>)>> {
        if self.reader.is_empty() {
            return Ok(None);
        }

        if self.reader.bytes_left() < HEADER_SIZE as usize {
            return truncated_error(BoxContext::new(self.box_path.clone()));
        }

        let start_remaining = self.reader.remaining();
        let header = AtomHeader::read(&mut self.reader)?;
        let content_len = header.content_len()?;

        if content_len as usize > self.reader.bytes_left() {
            return truncated_error(
                BoxContext::new(format!("{}/{}", self.box_path, display_name(&header.name)))
                    .with_data(&start_remaining[..start_remaining.len().min(16)]),
            );
        }

        let content = SliceReader::new(&self.reader.remaining()[..content_len as usize]);
        self.reader.ignore_bytes(content_len)?;

        Ok(Some((header, content)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterates_two_sibling_boxes() {
        let mut data = Vec::new();
        write_box(&mut data, b"free", &[1, 2, 3]).unwrap();
        write_box(&mut data, b"skip", &[4, 5]).unwrap();

        let mut it = AtomIterator::new(&data, "/");
        let (h1, c1) = it.next_atom().unwrap().unwrap();
        assert_eq!(&h1.name, b"free");
        assert_eq!(c1.remaining(), &[1, 2, 3]);

        let (h2, c2) = it.next_atom().unwrap().unwrap();
        assert_eq!(&h2.name, b"skip");
        assert_eq!(c2.remaining(), &[4, 5]);

        assert!(it.next_atom().unwrap().is_none());
    }

    #[test]
    fn truncated_box_reports_path() {
        let mut data = Vec::new();
        write_box(&mut data, b"free", &[1, 2, 3]).unwrap();
        data.truncate(data.len() - 1);

        let mut it = AtomIterator::new(&data, "/");
        assert!(it.next_atom().is_err());
    }
}
