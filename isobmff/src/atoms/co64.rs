// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `co64` (64-bit Chunk Offset Box), used in place of [`stco`](super::stco) once a track's
//! chunk offsets would no longer fit in 32 bits.

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Co64Atom {
    pub chunk_offsets: Vec<u64>,
}

impl Co64Atom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let _full = FullBoxHeader::read(r)?;
        let entry_count = r.read_be_u32()?;

        if r.bytes_left() != entry_count as usize * 8 {
            return malformed_error(
                BoxContext::new("co64").with_field("entry_count"),
                "entry_count does not match remaining content length",
            );
        }

        let mut chunk_offsets = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            chunk_offsets.push(r.read_be_u64()?);
        }

        Ok(Co64Atom { chunk_offsets })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        FullBoxHeader::default().write(&mut content)?;
        content.write_be_u32(self.chunk_offsets.len() as u32)?;
        for &offset in &self.chunk_offsets {
            content.write_be_u64(offset)?;
        }
        write_box(out, b"co64", &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_large_offsets() {
        let co64 = Co64Atom { chunk_offsets: vec![1 << 33, (1 << 33) + 4096] };
        let mut out = Vec::new();
        co64.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(Co64Atom::read(&mut content).unwrap(), co64);
    }
}
