// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `stsz` (Sample Size Box): per-sample byte sizes, or a single uniform size for every sample.

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StszAtom {
    /// Every sample in the track is exactly `size` bytes.
    Uniform { size: u32, sample_count: u32 },
    /// Per-sample sizes, one entry per sample in decoding order.
    PerSample { sizes: Vec<u32> },
}

impl StszAtom {
    pub fn sample_count(&self) -> u32 {
        match self {
            StszAtom::Uniform { sample_count, .. } => *sample_count,
            StszAtom::PerSample { sizes } => sizes.len() as u32,
        }
    }

    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let _full = FullBoxHeader::read(r)?;
        let sample_size = r.read_be_u32()?;
        let sample_count = r.read_be_u32()?;

        if sample_size != 0 {
            if !r.is_empty() {
                return malformed_error(
                    BoxContext::new("stsz").with_field("sample_size"),
                    "uniform sample_size must not be followed by a per-sample size table",
                );
            }
            return Ok(StszAtom::Uniform { size: sample_size, sample_count });
        }

        if r.bytes_left() != sample_count as usize * 4 {
            return malformed_error(
                BoxContext::new("stsz").with_field("sample_count"),
                "sample_count does not match remaining content length",
            );
        }

        let mut sizes = Vec::with_capacity(sample_count as usize);
        for _ in 0..sample_count {
            sizes.push(r.read_be_u32()?);
        }

        Ok(StszAtom::PerSample { sizes })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        FullBoxHeader::default().write(&mut content)?;
        match self {
            StszAtom::Uniform { size, sample_count } => {
                content.write_be_u32(*size)?;
                content.write_be_u32(*sample_count)?;
            }
            StszAtom::PerSample { sizes } => {
                content.write_be_u32(0)?;
                content.write_be_u32(sizes.len() as u32)?;
                for &size in sizes {
                    content.write_be_u32(size)?;
                }
            }
        }
        write_box(out, b"stsz", &content)
    }
}
