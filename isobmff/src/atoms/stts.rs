// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `stts` (Decoding Time to Sample Box): runs of `{sample_count, sample_delta}` covering every
//! sample's dts by prefix sum.

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SttsEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SttsAtom {
    pub entries: Vec<SttsEntry>,
}

impl SttsAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let _full = FullBoxHeader::read(r)?;
        let entry_count = r.read_be_u32()?;

        if r.bytes_left() != entry_count as usize * 8 {
            return malformed_error(
                BoxContext::new("stts").with_field("entry_count"),
                "entry_count does not match remaining content length",
            );
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let sample_count = r.read_be_u32()?;
            let sample_delta = r.read_be_u32()?;
            entries.push(SttsEntry { sample_count, sample_delta });
        }

        Ok(SttsAtom { entries })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        FullBoxHeader::default().write(&mut content)?;
        content.write_be_u32(self.entries.len() as u32)?;
        for entry in &self.entries {
            content.write_be_u32(entry.sample_count)?;
            content.write_be_u32(entry.sample_delta)?;
        }
        write_box(out, b"stts", &content)
    }

    /// Total number of samples covered by all runs.
    pub fn sample_count(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.sample_count)).sum()
    }

    /// Total duration in ticks covered by all runs.
    pub fn total_duration(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.sample_count) * u64::from(e.sample_delta)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_runs() {
        let stts = SttsAtom {
            entries: vec![
                SttsEntry { sample_count: 900, sample_delta: 1024 },
                SttsEntry { sample_count: 1, sample_delta: 512 },
            ],
        };
        let mut out = Vec::new();
        stts.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(SttsAtom::read(&mut content).unwrap(), stts);
        assert_eq!(stts.sample_count(), 901);
    }
}
