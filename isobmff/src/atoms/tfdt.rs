// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `tfdt` (Track Fragment Decode Time Box): the cumulative decode-time ticks emitted on this
//! track so far, in the track's own timescale. Version 1 widens the field to 64 bits; this
//! toolkit emits version 1 whenever the value would not fit in 32 bits.

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TfdtAtom {
    pub base_media_decode_time: u64,
}

impl TfdtAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let full = FullBoxHeader::read(r)?;
        let base_media_decode_time = match full.version {
            0 => u64::from(r.read_be_u32()?),
            1 => r.read_be_u64()?,
            v => {
                return malformed_error(
                    BoxContext::new("tfdt").with_field("version"),
                    format!("unsupported tfdt version {}", v),
                )
            }
        };
        Ok(TfdtAtom { base_media_decode_time })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let use_v1 = self.base_media_decode_time > u32::MAX as u64;

        let mut content = Vec::new();
        FullBoxHeader { version: if use_v1 { 1 } else { 0 }, flags: 0 }.write(&mut content)?;
        if use_v1 {
            content.write_be_u64(self.base_media_decode_time)?;
        } else {
            content.write_be_u32(self.base_media_decode_time as u32)?;
        }
        write_box(out, b"tfdt", &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_v0() {
        let tfdt = TfdtAtom { base_media_decode_time: 96_000 };
        let mut out = Vec::new();
        tfdt.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(TfdtAtom::read(&mut content).unwrap(), tfdt);
    }

    #[test]
    fn uses_v1_for_large_values() {
        let tfdt = TfdtAtom { base_media_decode_time: 1u64 << 40 };
        let mut out = Vec::new();
        tfdt.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(TfdtAtom::read(&mut content).unwrap(), tfdt);
    }
}
