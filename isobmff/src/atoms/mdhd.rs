// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `mdhd` (Media Header Box). The 15-bit packed language code follows ISO 639-2: each of the
//! three letters is stored as `letter - 0x60` in a 5-bit field; this toolkit defaults to
//! 21956 ("und") and accepts any packed value on parse.

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

pub const DEFAULT_LANGUAGE: u16 = 21956;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdhdAtom {
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub language: u16,
}

impl MdhdAtom {
    pub fn new(timescale: u32, duration: u64) -> Self {
        MdhdAtom {
            creation_time: 0,
            modification_time: 0,
            timescale,
            duration,
            language: DEFAULT_LANGUAGE,
        }
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
                    BoxContext::new("mdhd").with_field("version"),
                    format!("unsupported mdhd version {}", v),
                )
            }
        };

        // bit(1) pad=0 | unsigned int(5)[3] language
        let language = r.read_be_u16()? & 0x7fff;
        r.ignore_bytes(2)?; // pre_defined

        Ok(MdhdAtom { creation_time, modification_time, timescale, duration, language })
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

        content.write_be_u16(self.language & 0x7fff)?;
        content.write_be_u16(0)?; // pre_defined

        write_box(out, b"mdhd", &content)
    }
}

/// Packs three lower-case ASCII letters into the 15-bit ISO 639-2 field `mdhd` uses.
pub fn pack_language(code: [u8; 3]) -> u16 {
    let mut packed: u16 = 0;
    for &c in &code {
        packed = (packed << 5) | u16::from(c - 0x60);
    }
    packed
}
