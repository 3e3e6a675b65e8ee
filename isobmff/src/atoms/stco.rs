// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `stco` (Chunk Offset Box): 32-bit absolute file offsets of every chunk. See [`co64`](super::co64)
//! for the 64-bit variant used once a track's offsets would overflow 32 bits.

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StcoAtom {
    pub chunk_offsets: Vec<u32>,
}

impl StcoAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let _full = FullBoxHeader::read(r)?;
        let entry_count = r.read_be_u32()?;

        if r.bytes_left() != entry_count as usize * 4 {
            return malformed_error(
                BoxContext::new("stco").with_field("entry_count"),
                "entry_count does not match remaining content length",
            );
        }

        let mut chunk_offsets = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            chunk_offsets.push(r.read_be_u32()?);
        }

        Ok(StcoAtom { chunk_offsets })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        FullBoxHeader::default().write(&mut content)?;
        content.write_be_u32(self.chunk_offsets.len() as u32)?;
        for &offset in &self.chunk_offsets {
            content.write_be_u32(offset)?;
        }
        write_box(out, b"stco", &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_offsets() {
        let stco = StcoAtom { chunk_offsets: vec![32, 10_432, 20_864] };
        let mut out = Vec::new();
        stco.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(StcoAtom::read(&mut content).unwrap(), stco);
    }
}
