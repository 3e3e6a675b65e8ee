// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `stsc` (Sample To Chunk Box): runs of `{first_chunk, samples_per_chunk, sample_description_index}`
//! describing how samples are grouped into chunks. A run applies from `first_chunk` up to (but not
//! including) the next run's `first_chunk`, or the last chunk if it is the final run.

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StscEntry {
    /// 1-based index of the first chunk this run applies to.
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    /// 1-based index into the `stsd` sample entry table.
    pub sample_description_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StscAtom {
    pub entries: Vec<StscEntry>,
}

impl StscAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let _full = FullBoxHeader::read(r)?;
        let entry_count = r.read_be_u32()?;

        if r.bytes_left() != entry_count as usize * 12 {
            return malformed_error(
                BoxContext::new("stsc").with_field("entry_count"),
                "entry_count does not match remaining content length",
            );
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let first_chunk = r.read_be_u32()?;
            let samples_per_chunk = r.read_be_u32()?;
            let sample_description_index = r.read_be_u32()?;
            entries.push(StscEntry { first_chunk, samples_per_chunk, sample_description_index });
        }

        Ok(StscAtom { entries })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        FullBoxHeader::default().write(&mut content)?;
        content.write_be_u32(self.entries.len() as u32)?;
        for entry in &self.entries {
            content.write_be_u32(entry.first_chunk)?;
            content.write_be_u32(entry.samples_per_chunk)?;
            content.write_be_u32(entry.sample_description_index)?;
        }
        write_box(out, b"stsc", &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_runs() {
        let stsc = StscAtom {
            entries: vec![
                StscEntry { first_chunk: 1, samples_per_chunk: 12, sample_description_index: 1 },
                StscEntry { first_chunk: 9, samples_per_chunk: 6, sample_description_index: 1 },
            ],
        };
        let mut out = Vec::new();
        stsc.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(StscAtom::read(&mut content).unwrap(), stsc);
    }
}
