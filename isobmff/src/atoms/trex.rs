// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `trex` (Track Extends Box): per-track fragment defaults, read by the CMAF demuxer when a
//! `trun` entry omits a field.

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::Result;
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrexAtom {
    pub track_id: u32,
    pub default_sample_description_index: u32,
    pub default_sample_duration: u32,
    pub default_sample_size: u32,
    pub default_sample_flags: u32,
}

impl TrexAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let _full = FullBoxHeader::read(r)?;
        Ok(TrexAtom {
            track_id: r.read_be_u32()?,
            default_sample_description_index: r.read_be_u32()?,
            default_sample_duration: r.read_be_u32()?,
            default_sample_size: r.read_be_u32()?,
            default_sample_flags: r.read_be_u32()?,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        FullBoxHeader::default().write(&mut content)?;
        content.write_be_u32(self.track_id)?;
        content.write_be_u32(self.default_sample_description_index)?;
        content.write_be_u32(self.default_sample_duration)?;
        content.write_be_u32(self.default_sample_size)?;
        content.write_be_u32(self.default_sample_flags)?;
        write_box(out, b"trex", &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_defaults() {
        let trex = TrexAtom {
            track_id: 1,
            default_sample_description_index: 1,
            default_sample_duration: 1024,
            default_sample_size: 0,
            default_sample_flags: 0x0101_0000,
        };
        let mut out = Vec::new();
        trex.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(TrexAtom::read(&mut content).unwrap(), trex);
    }
}
