// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `stss` (Sync Sample Box): 1-based sample numbers of every key frame. Absence means every
//! sample in the track is a sync sample.

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StssAtom {
    /// 1-based sample numbers, in ascending order.
    pub sync_samples: Vec<u32>,
}

impl StssAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let _full = FullBoxHeader::read(r)?;
        let entry_count = r.read_be_u32()?;

        if r.bytes_left() != entry_count as usize * 4 {
            return malformed_error(
                BoxContext::new("stss").with_field("entry_count"),
                "entry_count does not match remaining content length",
            );
        }

        let mut sync_samples = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let sample_number = r.read_be_u32()?;
            if sample_number == 0 {
                return malformed_error(
                    BoxContext::new("stss").with_field("sample_number"),
                    "sync sample index must be 1-based",
                );
            }
            sync_samples.push(sample_number);
        }

        Ok(StssAtom { sync_samples })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        FullBoxHeader::default().write(&mut content)?;
        content.write_be_u32(self.sync_samples.len() as u32)?;
        for &sample_number in &self.sync_samples {
            content.write_be_u32(sample_number)?;
        }
        write_box(out, b"stss", &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_sync_samples() {
        let stss = StssAtom { sync_samples: vec![1, 31, 61] };
        let mut out = Vec::new();
        stss.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(StssAtom::read(&mut content).unwrap(), stss);
    }

    #[test]
    fn rejects_zero_index() {
        let mut content = Vec::new();
        FullBoxHeader::default().write(&mut content).unwrap();
        content.write_be_u32(1).unwrap();
        content.write_be_u32(0).unwrap();
        let mut out = Vec::new();
        write_box(&mut out, b"stss", &content).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut body) = it.next_atom().unwrap().unwrap();
        assert!(StssAtom::read(&mut body).is_err());
    }
}
