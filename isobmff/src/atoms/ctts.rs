// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ctts` (Composition Time to Sample Box): runs of `{sample_count, sample_offset}` giving
//! `pts - dts` for samples where they differ. Version 1 offsets are signed; version 0 offsets
//! are unsigned, though this toolkit always emits version 1 since B-frame reordering requires
//! negative offsets in general.

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CttsEntry {
    pub sample_count: u32,
    pub sample_offset: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CttsAtom {
    pub entries: Vec<CttsEntry>,
}

impl CttsAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let _full = FullBoxHeader::read(r)?;
        let entry_count = r.read_be_u32()?;

        if r.bytes_left() != entry_count as usize * 8 {
            return malformed_error(
                BoxContext::new("ctts").with_field("entry_count"),
                "entry_count does not match remaining content length",
            );
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let sample_count = r.read_be_u32()?;
            let sample_offset = r.read_be_u32()? as i32;
            entries.push(CttsEntry { sample_count, sample_offset });
        }

        Ok(CttsAtom { entries })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        FullBoxHeader { version: 1, flags: 0 }.write(&mut content)?;
        content.write_be_u32(self.entries.len() as u32)?;
        for entry in &self.entries {
            content.write_be_u32(entry.sample_count)?;
            content.write_be_u32(entry.sample_offset as u32)?;
        }
        write_box(out, b"ctts", &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_negative_offsets() {
        let ctts = CttsAtom {
            entries: vec![
                CttsEntry { sample_count: 10, sample_offset: 2048 },
                CttsEntry { sample_count: 2, sample_offset: -1024 },
            ],
        };
        let mut out = Vec::new();
        ctts.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(CttsAtom::read(&mut content).unwrap(), ctts);
    }
}
