// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `mvhd` (Movie Header Box).

use super::{write_box, FullBoxHeader};
use crate::fp::{Fixed1616, Fixed88, TransformMatrix};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MvhdAtom {
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    /// Next track id to be assigned; this toolkit always emits one past the highest track id.
    pub next_track_id: u32,
}

impl MvhdAtom {
    pub fn new(timescale: u32, duration: u64, next_track_id: u32) -> Self {
        MvhdAtom { creation_time: 0, modification_time: 0, timescale, duration, next_track_id }
    }

    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let full = FullBoxHeader::read(r)?;

        let (creation_time, modification_time, timescale, duration) = match full.version {
            0 => {
                let creation_time = u64::from(r.read_be_u32()?);
                let modification_time = u64::from(r.read_be_u32()?);
                let timescale = r.read_be_u32()?;
                let duration = match r.read_be_u32()? {
                    u32::MAX => u64::MAX,
                    d => u64::from(d),
                };
                (creation_time, modification_time, timescale, duration)
            }
            1 => {
                let creation_time = r.read_be_u64()?;
                let modification_time = r.read_be_u64()?;
                let timescale = r.read_be_u32()?;
                let duration = r.read_be_u64()?;
                (creation_time, modification_time, timescale, duration)
            }
            v => {
                return malformed_error(
                    BoxContext::new("mvhd").with_field("version"),
                    format!("unsupported mvhd version {}", v),
                )
            }
        };

        let _rate = Fixed1616::read(r)?;
        let _volume = Fixed88::read(r)?;
        r.ignore_bytes(2)?; // reserved
        r.ignore_bytes(8)?; // reserved[2]
        let _matrix = TransformMatrix::read(r)?;
        r.ignore_bytes(24)?; // pre_defined[6]
        let next_track_id = r.read_be_u32()?;

        Ok(MvhdAtom { creation_time, modification_time, timescale, duration, next_track_id })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let use_v1 = self.creation_time > u32::MAX as u64
            || self.modification_time > u32::MAX as u64
            || (self.duration > u32::MAX as u64 && self.duration != u64::MAX);

        let mut content = Vec::new();
        FullBoxHeader { version: if use_v1 { 1 } else { 0 }, flags: 0 }.write(&mut content)?;

        if use_v1 {
            content.write_be_u64(self.creation_time)?;
            content.write_be_u64(self.modification_time)?;
            content.write_be_u32(self.timescale)?;
            content.write_be_u64(self.duration)?;
        } else {
            content.write_be_u32(self.creation_time as u32)?;
            content.write_be_u32(self.modification_time as u32)?;
            content.write_be_u32(self.timescale)?;
            content.write_be_u32(if self.duration == u64::MAX { u32::MAX } else { self.duration as u32 })?;
        }

        Fixed1616::ONE.write(&mut content)?; // rate
        Fixed88::ONE.write(&mut content)?; // volume
        content.write_be_u16(0)?; // reserved
        content.write_be_u64(0)?; // reserved[2]
        TransformMatrix::IDENTITY.write(&mut content)?;
        for _ in 0..6 {
            content.write_be_u32(0)?; // pre_defined
        }
        content.write_be_u32(self.next_track_id)?;

        write_box(out, b"mvhd", &content)
    }
}
