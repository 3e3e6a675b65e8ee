// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `trun` (Track Fragment Run Box): per-sample size/duration/flags/composition-offset for one
//! run of samples in a fragment. Composition offsets are retained (not discarded) since CMAF
//! demux needs them to recover `pts`.

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::Result;
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

const DATA_OFFSET_PRESENT: u32 = 0x00_0001;
const FIRST_SAMPLE_FLAGS_PRESENT: u32 = 0x00_0004;
const SAMPLE_DURATION_PRESENT: u32 = 0x00_0100;
const SAMPLE_SIZE_PRESENT: u32 = 0x00_0200;
const SAMPLE_FLAGS_PRESENT: u32 = 0x00_0400;
const SAMPLE_COMPOSITION_TIME_OFFSETS_PRESENT: u32 = 0x00_0800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrunSample {
    pub duration: Option<u32>,
    pub size: Option<u32>,
    pub flags: Option<u32>,
    pub composition_time_offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrunAtom {
    pub data_offset: Option<i32>,
    pub first_sample_flags: Option<u32>,
    pub samples: Vec<TrunSample>,
}

impl TrunAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let full = FullBoxHeader::read(r)?;
        let sample_count = r.read_be_u32()?;

        let data_offset =
            if full.flags & DATA_OFFSET_PRESENT != 0 { Some(r.read_be_i32()?) } else { None };
        let first_sample_flags = if full.flags & FIRST_SAMPLE_FLAGS_PRESENT != 0 {
            Some(r.read_be_u32()?)
        } else {
            None
        };

        let has_duration = full.flags & SAMPLE_DURATION_PRESENT != 0;
        let has_size = full.flags & SAMPLE_SIZE_PRESENT != 0;
        let has_flags = full.flags & SAMPLE_FLAGS_PRESENT != 0;
        let has_composition_offset = full.flags & SAMPLE_COMPOSITION_TIME_OFFSETS_PRESENT != 0;

        let mut samples = Vec::with_capacity(sample_count as usize);
        for _ in 0..sample_count {
            let duration = if has_duration { Some(r.read_be_u32()?) } else { None };
            let size = if has_size { Some(r.read_be_u32()?) } else { None };
            let flags = if has_flags { Some(r.read_be_u32()?) } else { None };
            let composition_time_offset = if has_composition_offset {
                Some(if full.version == 0 {
                    i64::from(r.read_be_u32()?)
                } else {
                    i64::from(r.read_be_i32()?)
                })
            } else {
                None
            };
            samples.push(TrunSample { duration, size, flags, composition_time_offset });
        }

        Ok(TrunAtom { data_offset, first_sample_flags, samples })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let has_duration = self.samples.iter().any(|s| s.duration.is_some());
        let has_size = self.samples.iter().any(|s| s.size.is_some());
        let has_flags = self.samples.iter().any(|s| s.flags.is_some());
        let has_composition_offset =
            self.samples.iter().any(|s| s.composition_time_offset.is_some());
        let needs_signed_offset = self
            .samples
            .iter()
            .filter_map(|s| s.composition_time_offset)
            .any(|v| v < 0);

        let mut flags = 0u32;
        if self.data_offset.is_some() {
            flags |= DATA_OFFSET_PRESENT;
        }
        if self.first_sample_flags.is_some() {
            flags |= FIRST_SAMPLE_FLAGS_PRESENT;
        }
        if has_duration {
            flags |= SAMPLE_DURATION_PRESENT;
        }
        if has_size {
            flags |= SAMPLE_SIZE_PRESENT;
        }
        if has_flags {
            flags |= SAMPLE_FLAGS_PRESENT;
        }
        if has_composition_offset {
            flags |= SAMPLE_COMPOSITION_TIME_OFFSETS_PRESENT;
        }

        let version = if needs_signed_offset { 1 } else { 0 };

        let mut content = Vec::new();
        FullBoxHeader { version, flags }.write(&mut content)?;
        content.write_be_u32(self.samples.len() as u32)?;
        if let Some(v) = self.data_offset {
            content.write_be_i32(v)?;
        }
        if let Some(v) = self.first_sample_flags {
            content.write_be_u32(v)?;
        }

        for sample in &self.samples {
            if let Some(v) = sample.duration {
                content.write_be_u32(v)?;
            }
            if let Some(v) = sample.size {
                content.write_be_u32(v)?;
            }
            if let Some(v) = sample.flags {
                content.write_be_u32(v)?;
            }
            if let Some(v) = sample.composition_time_offset {
                if version == 0 {
                    content.write_be_u32(v as u32)?;
                } else {
                    content.write_be_i32(v as i32)?;
                }
            }
        }

        write_box(out, b"trun", &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_negative_composition_offsets() {
        let trun = TrunAtom {
            data_offset: Some(400),
            first_sample_flags: Some(0x0200_0000),
            samples: vec![
                TrunSample {
                    duration: Some(1024),
                    size: Some(512),
                    flags: None,
                    composition_time_offset: Some(2048),
                },
                TrunSample {
                    duration: Some(1024),
                    size: Some(480),
                    flags: None,
                    composition_time_offset: Some(-1024),
                },
            ],
        };
        let mut out = Vec::new();
        trun.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(TrunAtom::read(&mut content).unwrap(), trun);
    }

    #[test]
    fn round_trips_without_composition_offsets() {
        let trun = TrunAtom {
            data_offset: None,
            first_sample_flags: None,
            samples: vec![TrunSample {
                duration: Some(960),
                size: Some(128),
                flags: None,
                composition_time_offset: None,
            }],
        };
        let mut out = Vec::new();
        trun.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(TrunAtom::read(&mut content).unwrap(), trun);
    }
}
