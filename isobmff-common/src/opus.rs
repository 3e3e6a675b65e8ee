// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `dOps` (Opus Specific Box), carrying the OpusHead-derived fields CMAF/ISO-BMFF wraps the
//! codec's own header in. Per spec, emitted values are fixed: version 0, pre-skip 413,
//! input sample rate 0, output gain 0, channel mapping family 0 — only the channel count
//! varies per stream.

use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

pub const PRE_SKIP: u16 = 413;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpusIdHeader {
    pub output_channel_count: u8,
}

impl OpusIdHeader {
    pub fn read(buf: &[u8]) -> Result<Self> {
        let ctx = BoxContext::new("dOps");
        let mut r = SliceReader::new(buf);

        let version = r.read_u8()?;
        if version != 0 {
            return malformed_error(ctx.with_field("Version"), "unexpected dOps version");
        }

        let output_channel_count = r.read_u8()?;
        let _pre_skip = r.read_be_u16()?;
        let _input_sample_rate = r.read_be_u32()?;
        let _output_gain = r.read_be_i16()?;
        let _channel_mapping_family = r.read_u8()?;

        Ok(OpusIdHeader { output_channel_count })
    }

    pub fn write(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_byte(0).unwrap(); // Version
        out.write_byte(self.output_channel_count).unwrap();
        out.write_be_u16(PRE_SKIP).unwrap();
        out.write_be_u32(0).unwrap(); // InputSampleRate
        out.write_buf(&0i16.to_be_bytes()).unwrap(); // OutputGain
        out.write_byte(0).unwrap(); // ChannelMappingFamily
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_stereo_header() {
        let header = OpusIdHeader { output_channel_count: 2 };
        let bytes = header.write();
        assert_eq!(bytes.len(), 11);
        assert_eq!(OpusIdHeader::read(&bytes).unwrap(), header);
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = OpusIdHeader { output_channel_count: 2 }.write();
        bytes[0] = 1;
        assert!(OpusIdHeader::read(&bytes).is_err());
    }
}
