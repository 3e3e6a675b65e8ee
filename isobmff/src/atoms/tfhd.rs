// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `tfhd` (Track Fragment Header Box): per-fragment defaults for one track, selectively
//! overriding the `trex` defaults declared in the init header's `mvex`.

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::Result;
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

const BASE_DATA_OFFSET_PRESENT: u32 = 0x00_0001;
const SAMPLE_DESCRIPTION_INDEX_PRESENT: u32 = 0x00_0002;
const DEFAULT_SAMPLE_DURATION_PRESENT: u32 = 0x00_0008;
const DEFAULT_SAMPLE_SIZE_PRESENT: u32 = 0x00_0010;
const DEFAULT_SAMPLE_FLAGS_PRESENT: u32 = 0x00_0020;
const DURATION_IS_EMPTY: u32 = 0x01_0000;
const DEFAULT_BASE_IS_MOOF: u32 = 0x02_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TfhdAtom {
    pub track_id: u32,
    pub base_data_offset: Option<u64>,
    pub sample_description_index: Option<u32>,
    pub default_sample_duration: Option<u32>,
    pub default_sample_size: Option<u32>,
    pub default_sample_flags: Option<u32>,
    pub duration_is_empty: bool,
    pub default_base_is_moof: bool,
}

impl TfhdAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let full = FullBoxHeader::read(r)?;
        let track_id = r.read_be_u32()?;

        let base_data_offset =
            if full.flags & BASE_DATA_OFFSET_PRESENT != 0 { Some(r.read_be_u64()?) } else { None };
        let sample_description_index = if full.flags & SAMPLE_DESCRIPTION_INDEX_PRESENT != 0 {
            Some(r.read_be_u32()?)
        } else {
            None
        };
        let default_sample_duration = if full.flags & DEFAULT_SAMPLE_DURATION_PRESENT != 0 {
            Some(r.read_be_u32()?)
        } else {
            None
        };
        let default_sample_size =
            if full.flags & DEFAULT_SAMPLE_SIZE_PRESENT != 0 { Some(r.read_be_u32()?) } else { None };
        let default_sample_flags = if full.flags & DEFAULT_SAMPLE_FLAGS_PRESENT != 0 {
            Some(r.read_be_u32()?)
        } else {
            None
        };

        Ok(TfhdAtom {
            track_id,
            base_data_offset,
            sample_description_index,
            default_sample_duration,
            default_sample_size,
            default_sample_flags,
            duration_is_empty: full.flags & DURATION_IS_EMPTY != 0,
            default_base_is_moof: full.flags & DEFAULT_BASE_IS_MOOF != 0,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut flags = 0u32;
        if self.base_data_offset.is_some() {
            flags |= BASE_DATA_OFFSET_PRESENT;
        }
        if self.sample_description_index.is_some() {
            flags |= SAMPLE_DESCRIPTION_INDEX_PRESENT;
        }
        if self.default_sample_duration.is_some() {
            flags |= DEFAULT_SAMPLE_DURATION_PRESENT;
        }
        if self.default_sample_size.is_some() {
            flags |= DEFAULT_SAMPLE_SIZE_PRESENT;
        }
        if self.default_sample_flags.is_some() {
            flags |= DEFAULT_SAMPLE_FLAGS_PRESENT;
        }
        if self.duration_is_empty {
            flags |= DURATION_IS_EMPTY;
        }
        if self.default_base_is_moof {
            flags |= DEFAULT_BASE_IS_MOOF;
        }

        let mut content = Vec::new();
        FullBoxHeader { version: 0, flags }.write(&mut content)?;
        content.write_be_u32(self.track_id)?;
        if let Some(v) = self.base_data_offset {
            content.write_be_u64(v)?;
        }
        if let Some(v) = self.sample_description_index {
            content.write_be_u32(v)?;
        }
        if let Some(v) = self.default_sample_duration {
            content.write_be_u32(v)?;
        }
        if let Some(v) = self.default_sample_size {
            content.write_be_u32(v)?;
        }
        if let Some(v) = self.default_sample_flags {
            content.write_be_u32(v)?;
        }

        write_box(out, b"tfhd", &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_defaults_present() {
        let tfhd = TfhdAtom {
            track_id: 1,
            base_data_offset: None,
            sample_description_index: None,
            default_sample_duration: Some(1024),
            default_sample_size: None,
            default_sample_flags: Some(0x0101_0000),
            duration_is_empty: false,
            default_base_is_moof: true,
        };
        let mut out = Vec::new();
        tfhd.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(TfhdAtom::read(&mut content).unwrap(), tfhd);
    }
}
