// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `tkhd` (Track Header Box).

use super::{write_box, FullBoxHeader};
use crate::fp::{Fixed88, TransformMatrix};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

const FLAG_TRACK_ENABLED: u32 = 0x0000_01;
const FLAG_TRACK_IN_MOVIE: u32 = 0x0000_02;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TkhdAtom {
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    pub duration: u64,
    pub is_audio: bool,
    pub width: u32,
    pub height: u32,
}

impl TkhdAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let full = FullBoxHeader::read(r)?;

        let (creation_time, modification_time, track_id, duration) = match full.version {
            0 => {
                let creation_time = u64::from(r.read_be_u32()?);
                let modification_time = u64::from(r.read_be_u32()?);
                let track_id = r.read_be_u32()?;
                r.ignore_bytes(4)?; // reserved
                let duration = match r.read_be_u32()? {
                    u32::MAX => u64::MAX,
                    d => u64::from(d),
                };
                (creation_time, modification_time, track_id, duration)
            }
            1 => {
                let creation_time = r.read_be_u64()?;
                let modification_time = r.read_be_u64()?;
                let track_id = r.read_be_u32()?;
                r.ignore_bytes(4)?; // reserved
                let duration = r.read_be_u64()?;
                (creation_time, modification_time, track_id, duration)
            }
            v => {
                return malformed_error(
                    BoxContext::new("tkhd").with_field("version"),
                    format!("unsupported tkhd version {}", v),
                )
            }
        };

        r.ignore_bytes(8)?; // reserved[2]
        let _layer = r.read_be_i16()?;
        let _alternate_group = r.read_be_i16()?;
        let volume = Fixed88::read(r)?;
        r.ignore_bytes(2)?; // reserved
        let _matrix = TransformMatrix::read(r)?;
        let width = r.read_be_u32()? >> 16;
        let height = r.read_be_u32()? >> 16;

        Ok(TkhdAtom {
            creation_time,
            modification_time,
            track_id,
            duration,
            is_audio: volume != Fixed88::ZERO,
            width,
            height,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let use_v1 = self.creation_time > u32::MAX as u64
            || self.modification_time > u32::MAX as u64
            || (self.duration > u32::MAX as u64 && self.duration != u64::MAX);

        let mut content = Vec::new();
        let flags = FLAG_TRACK_ENABLED | FLAG_TRACK_IN_MOVIE;
        FullBoxHeader { version: if use_v1 { 1 } else { 0 }, flags }.write(&mut content)?;

        if use_v1 {
            content.write_be_u64(self.creation_time)?;
            content.write_be_u64(self.modification_time)?;
            content.write_be_u32(self.track_id)?;
            content.write_be_u32(0)?; // reserved
            content.write_be_u64(self.duration)?;
        } else {
            content.write_be_u32(self.creation_time as u32)?;
            content.write_be_u32(self.modification_time as u32)?;
            content.write_be_u32(self.track_id)?;
            content.write_be_u32(0)?; // reserved
            content.write_be_u32(if self.duration == u64::MAX { u32::MAX } else { self.duration as u32 })?;
        }

        content.write_be_u64(0)?; // reserved[2]
        content.write_be_i16(0)?; // layer
        content.write_be_i16(0)?; // alternate_group
        let volume = if self.is_audio { Fixed88::ONE } else { Fixed88::ZERO };
        volume.write(&mut content)?;
        content.write_be_u16(0)?; // reserved
        TransformMatrix::IDENTITY.write(&mut content)?;
        content.write_be_u32(self.width << 16)?;
        content.write_be_u32(self.height << 16)?;

        write_box(out, b"tkhd", &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_video_track() {
        let tkhd = TkhdAtom {
            creation_time: 0,
            modification_time: 0,
            track_id: 1,
            duration: 48_000,
            is_audio: false,
            width: 1920,
            height: 1080,
        };
        let mut out = Vec::new();
        tkhd.write(&mut out).unwrap();

        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(TkhdAtom::read(&mut content).unwrap(), tkhd);
    }

    #[test]
    fn round_trips_audio_track_zero_dims() {
        let tkhd = TkhdAtom {
            creation_time: 0,
            modification_time: 0,
            track_id: 2,
            duration: 48_000,
            is_audio: true,
            width: 0,
            height: 0,
        };
        let mut out = Vec::new();
        tkhd.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        let parsed = TkhdAtom::read(&mut content).unwrap();
        assert_eq!(parsed, tkhd);
        assert_eq!(parsed.width, 0);
    }
}
