// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `minf` (Media Information Box): the kind-specific media header (`vmhd` or `smhd`), `dinf`,
//! and `stbl`.

use super::dinf::DinfAtom;
use super::smhd::SmhdAtom;
use super::stbl::StblAtom;
use super::vmhd::VmhdAtom;
use super::{write_box, AtomIterator};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::SliceReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaHeader {
    Video(VmhdAtom),
    Audio(SmhdAtom),
}

impl MediaHeader {
    pub fn is_video(&self) -> bool {
        matches!(self, MediaHeader::Video(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinfAtom {
    pub media_header: MediaHeader,
    pub stbl: StblAtom,
}

impl MinfAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let mut media_header = None;
        let mut stbl = None;
        let mut saw_dinf = false;

        let mut it = AtomIterator::new(r.remaining(), "minf");
        while let Some((header, mut content)) = it.next_atom()? {
            match &header.name {
                b"vmhd" => media_header = Some(MediaHeader::Video(VmhdAtom::read(&mut content)?)),
                b"smhd" => media_header = Some(MediaHeader::Audio(SmhdAtom::read(&mut content)?)),
                b"dinf" => {
                    DinfAtom::read(&mut content)?;
                    saw_dinf = true;
                }
                b"stbl" => stbl = Some(StblAtom::read(&mut content)?),
                _ => {}
            }
        }

        if !saw_dinf {
            return malformed_error(BoxContext::new("minf"), "missing dinf");
        }

        let media_header = media_header
            .ok_or(())
            .or_else(|_| malformed_error(BoxContext::new("minf"), "missing vmhd/smhd"))?;
        let stbl =
            stbl.ok_or(()).or_else(|_| malformed_error(BoxContext::new("minf"), "missing stbl"))?;

        Ok(MinfAtom { media_header, stbl })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        match &self.media_header {
            MediaHeader::Video(vmhd) => vmhd.write(&mut content)?,
            MediaHeader::Audio(smhd) => smhd.write(&mut content)?,
        }
        DinfAtom.write(&mut content)?;
        self.stbl.write(&mut content)?;
        write_box(out, b"minf", &content)
    }
}

#[cfg(test)]
mod tests {
    use super::super::stsd::{SampleEntry, StsdAtom};
    use super::super::stsc::{StscAtom, StscEntry};
    use super::super::stsz::StszAtom;
    use super::super::stts::{SttsAtom, SttsEntry};
    use super::*;
    use isobmff_common::OpusIdHeader;

    #[test]
    fn round_trips_audio_minf() {
        let minf = MinfAtom {
            media_header: MediaHeader::Audio(SmhdAtom),
            stbl: StblAtom {
                stsd: StsdAtom {
                    entries: vec![SampleEntry::Opus {
                        channel_count: 2,
                        sample_rate: 48_000,
                        header: OpusIdHeader { output_channel_count: 2 },
                    }],
                },
                stts: SttsAtom { entries: vec![SttsEntry { sample_count: 1, sample_delta: 960 }] },
                ctts: None,
                stss: None,
                stsc: StscAtom {
                    entries: vec![StscEntry {
                        first_chunk: 1,
                        samples_per_chunk: 1,
                        sample_description_index: 1,
                    }],
                },
                stsz: StszAtom::Uniform { size: 128, sample_count: 1 },
                chunk_offsets: vec![64],
            },
        };
        let mut out = Vec::new();
        minf.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        let parsed = MinfAtom::read(&mut content).unwrap();
        assert_eq!(parsed, minf);
        assert!(!parsed.media_header.is_video());
    }
}
