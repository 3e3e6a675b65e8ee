// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `stsd` (Sample Description Box): one entry per distinct codec configuration a track uses.
//! This toolkit supports exactly four sample entry kinds: `avc1`/`avc3` (H.264), `hvc1`/`hev1`
//! (H.265, config carried opaquely), `mp4a` (AAC), and `Opus`.

use super::{write_box, AtomHeader, AtomIterator, FullBoxHeader};
use isobmff_common::{AvcDecoderConfigurationRecord, EsDescriptor, HevcDecoderConfigurationRecord, OpusIdHeader};
use isobmff_core::errors::{unsupported_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

const AVC1: [u8; 4] = *b"avc1";
const HVC1: [u8; 4] = *b"hvc1";
const MP4A: [u8; 4] = *b"mp4a";
const OPUS: [u8; 4] = *b"Opus";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleEntry {
    Avc { width: u16, height: u16, config: AvcDecoderConfigurationRecord },
    Hevc { width: u16, height: u16, config: HevcDecoderConfigurationRecord },
    Aac { channel_count: u16, sample_rate: u32, descriptor: EsDescriptor },
    Opus { channel_count: u16, sample_rate: u32, header: OpusIdHeader },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StsdAtom {
    pub entries: Vec<SampleEntry>,
}

impl StsdAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let _full = FullBoxHeader::read(r)?;
        let entry_count = r.read_be_u32()?;

        let mut entries = Vec::with_capacity(entry_count as usize);
        let mut it = AtomIterator::new(r.remaining(), "stsd");
        for _ in 0..entry_count {
            let (header, mut content) = it
                .next_atom()?
                .ok_or_else(|| ())
                .or_else(|_| unsupported_error("stsd entry_count exceeds available entries"))?;
            entries.push(read_sample_entry(&header, &mut content)?);
        }

        Ok(StsdAtom { entries })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        FullBoxHeader::default().write(&mut content)?;
        content.write_be_u32(self.entries.len() as u32)?;
        for entry in &self.entries {
            write_sample_entry(&mut content, entry)?;
        }
        write_box(out, b"stsd", &content)
    }
}

fn read_visual_common(r: &mut SliceReader<'_>) -> Result<(u16, u16)> {
    r.ignore_bytes(6)?; // reserved
    r.read_be_u16()?; // data_reference_index
    r.ignore_bytes(2)?; // pre_defined
    r.ignore_bytes(2)?; // reserved
    r.ignore_bytes(12)?; // pre_defined[3]
    let width = r.read_be_u16()?;
    let height = r.read_be_u16()?;
    r.ignore_bytes(4)?; // horizresolution
    r.ignore_bytes(4)?; // vertresolution
    r.ignore_bytes(4)?; // reserved
    r.ignore_bytes(2)?; // frame_count
    r.ignore_bytes(32)?; // compressorname
    r.ignore_bytes(2)?; // depth
    r.ignore_bytes(2)?; // pre_defined = -1
    Ok((width, height))
}

fn write_visual_common(out: &mut Vec<u8>, width: u16, height: u16) -> Result<()> {
    out.write_buf(&[0u8; 6])?; // reserved
    out.write_be_u16(1)?; // data_reference_index
    out.write_be_u16(0)?; // pre_defined
    out.write_be_u16(0)?; // reserved
    out.write_buf(&[0u8; 12])?; // pre_defined[3]
    out.write_be_u16(width)?;
    out.write_be_u16(height)?;
    out.write_be_u32(0x0048_0000)?; // horizresolution, 72 dpi
    out.write_be_u32(0x0048_0000)?; // vertresolution, 72 dpi
    out.write_be_u32(0)?; // reserved
    out.write_be_u16(1)?; // frame_count
    out.write_buf(&[0u8; 32])?; // compressorname
    out.write_be_u16(0x0018)?; // depth
    out.write_be_u16(0xffff)?; // pre_defined = -1
    Ok(())
}

fn read_audio_common(r: &mut SliceReader<'_>) -> Result<(u16, u32)> {
    r.ignore_bytes(6)?; // reserved
    r.read_be_u16()?; // data_reference_index
    r.ignore_bytes(8)?; // reserved[2]
    let channel_count = r.read_be_u16()?;
    r.ignore_bytes(2)?; // samplesize, always 16
    r.ignore_bytes(2)?; // pre_defined
    r.ignore_bytes(2)?; // reserved
    let sample_rate = r.read_be_u32()? >> 16;
    Ok((channel_count, sample_rate))
}

fn write_audio_common(out: &mut Vec<u8>, channel_count: u16, sample_rate: u32) -> Result<()> {
    out.write_buf(&[0u8; 6])?; // reserved
    out.write_be_u16(1)?; // data_reference_index
    out.write_buf(&[0u8; 8])?; // reserved[2]
    out.write_be_u16(channel_count)?;
    out.write_be_u16(16)?; // samplesize
    out.write_be_u16(0)?; // pre_defined
    out.write_be_u16(0)?; // reserved
    out.write_be_u32(sample_rate << 16)?;
    Ok(())
}

fn read_sample_entry(header: &AtomHeader, content: &mut SliceReader<'_>) -> Result<SampleEntry> {
    match &header.name {
        name if *name == AVC1 || *name == *b"avc3" => {
            let (width, height) = read_visual_common(content)?;
            let mut it = AtomIterator::new(content.remaining(), "stsd/avc1");
            let (child_header, child_content) = it
                .next_atom()?
                .ok_or_else(|| ())
                .or_else(|_| unsupported_error("avc1 missing avcC child box"))?;
            if child_header.name != *b"avcC" {
                return unsupported_error("avc1 first child box must be avcC");
            }
            let config = AvcDecoderConfigurationRecord::read(child_content.remaining())?;
            Ok(SampleEntry::Avc { width, height, config })
        }
        name if *name == HVC1 || *name == *b"hev1" => {
            let (width, height) = read_visual_common(content)?;
            let mut it = AtomIterator::new(content.remaining(), "stsd/hvc1");
            let (child_header, child_content) = it
                .next_atom()?
                .ok_or_else(|| ())
                .or_else(|_| unsupported_error("hvc1 missing hvcC child box"))?;
            if child_header.name != *b"hvcC" {
                return unsupported_error("hvc1 first child box must be hvcC");
            }
            let config = HevcDecoderConfigurationRecord::read(child_content.remaining());
            Ok(SampleEntry::Hevc { width, height, config })
        }
        name if *name == MP4A => {
            let (channel_count, sample_rate) = read_audio_common(content)?;
            let mut it = AtomIterator::new(content.remaining(), "stsd/mp4a");
            let (child_header, mut child_content) = it
                .next_atom()?
                .ok_or_else(|| ())
                .or_else(|_| unsupported_error("mp4a missing esds child box"))?;
            if child_header.name != *b"esds" {
                return unsupported_error("mp4a first child box must be esds");
            }
            let _full = FullBoxHeader::read(&mut child_content)?;
            let descriptor = EsDescriptor::read(child_content.remaining())?;
            Ok(SampleEntry::Aac { channel_count, sample_rate, descriptor })
        }
        name if *name == OPUS => {
            let (channel_count, sample_rate) = read_audio_common(content)?;
            let mut it = AtomIterator::new(content.remaining(), "stsd/Opus");
            let (child_header, child_content) = it
                .next_atom()?
                .ok_or_else(|| ())
                .or_else(|_| unsupported_error("Opus missing dOps child box"))?;
            if child_header.name != *b"dOps" {
                return unsupported_error("Opus first child box must be dOps");
            }
            let header = OpusIdHeader::read(child_content.remaining())?;
            Ok(SampleEntry::Opus { channel_count, sample_rate, header })
        }
        _ => unsupported_error(format!(
            "unsupported sample entry {}",
            super::display_name(&header.name)
        )),
    }
}

fn write_sample_entry(out: &mut Vec<u8>, entry: &SampleEntry) -> Result<()> {
    match entry {
        SampleEntry::Avc { width, height, config } => {
            let mut content = Vec::new();
            write_visual_common(&mut content, *width, *height)?;
            write_box(&mut content, b"avcC", &config.write())?;
            write_box(out, &AVC1, &content)
        }
        SampleEntry::Hevc { width, height, config } => {
            let mut content = Vec::new();
            write_visual_common(&mut content, *width, *height)?;
            write_box(&mut content, b"hvcC", config.write())?;
            write_box(out, &HVC1, &content)
        }
        SampleEntry::Aac { channel_count, sample_rate, descriptor } => {
            let mut content = Vec::new();
            write_audio_common(&mut content, *channel_count, *sample_rate)?;
            let mut esds_content = Vec::new();
            FullBoxHeader::default().write(&mut esds_content)?;
            esds_content.write_buf(&descriptor.write())?;
            write_box(&mut content, b"esds", &esds_content)?;
            write_box(out, &MP4A, &content)
        }
        SampleEntry::Opus { channel_count, sample_rate, header } => {
            let mut content = Vec::new();
            write_audio_common(&mut content, *channel_count, *sample_rate)?;
            write_box(&mut content, b"dOps", &header.write())?;
            write_box(out, &OPUS, &content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isobmff_common::AvcDecoderConfigurationRecord;

    #[test]
    fn round_trips_avc_entry() {
        let stsd = StsdAtom {
            entries: vec![SampleEntry::Avc {
                width: 1920,
                height: 1080,
                config: AvcDecoderConfigurationRecord {
                    profile_indication: 0x64,
                    profile_compatibility: 0,
                    level_indication: 0x1f,
                    sequence_parameter_sets: vec![vec![0x67, 0x64, 0x00, 0x1f]],
                    picture_parameter_sets: vec![vec![0x68, 0xeb, 0xec, 0xb2]],
                },
            }],
        };
        let mut out = Vec::new();
        stsd.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(StsdAtom::read(&mut content).unwrap(), stsd);
    }

    #[test]
    fn round_trips_opus_entry() {
        let stsd = StsdAtom {
            entries: vec![SampleEntry::Opus {
                channel_count: 2,
                sample_rate: 48_000,
                header: OpusIdHeader { output_channel_count: 2 },
            }],
        };
        let mut out = Vec::new();
        stsd.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(StsdAtom::read(&mut content).unwrap(), stsd);
    }
}
