// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `AVCDecoderConfigurationRecord` (`avcC`), ISO/IEC 14496-15 section 5.3.3.1.

use isobmff_core::bits::BitReaderMsb;
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::WriteBytes;

/// NAL unit length size this toolkit always emits and requires on parse; the spec fixes it
/// at 4 bytes.
pub const NALU_LENGTH_SIZE: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcDecoderConfigurationRecord {
    pub profile_indication: u8,
    pub profile_compatibility: u8,
    pub level_indication: u8,
    pub sequence_parameter_sets: Vec<Vec<u8>>,
    pub picture_parameter_sets: Vec<Vec<u8>>,
}

impl AvcDecoderConfigurationRecord {
    /// Parses the full record: `1, profile, compatibility, level,
    /// 0b111111|nalu_length_size-1(2b), 0b111|num_sps(5b), [u16 size, bytes]*, num_pps(u8),
    /// [u16 size, bytes]*`.
    pub fn read(buf: &[u8]) -> Result<Self> {
        let ctx = || BoxContext::new("avcC");

        if buf.len() < 6 {
            return malformed_error(ctx(), "avcC record too short");
        }

        let configuration_version = buf[0];
        if configuration_version != 1 {
            return malformed_error(
                ctx().with_field("configurationVersion"),
                "unexpected avcC configuration version",
            );
        }

        let profile_indication = buf[1];
        let profile_compatibility = buf[2];
        let level_indication = buf[3];

        let mut br = BitReaderMsb::new(&buf[4..]);

        // reserved(6) | lengthSizeMinusOne(2)
        let _reserved = br.read_bits(6)?;
        let length_size_minus_one = br.read_bits(2)? as u8;
        if length_size_minus_one + 1 != NALU_LENGTH_SIZE {
            return malformed_error(
                ctx().with_field("lengthSizeMinusOne"),
                "unsupported NAL unit length size",
            );
        }

        // reserved(3) | numOfSequenceParameterSets(5)
        let _reserved = br.read_bits(3)?;
        let num_sps = br.read_bits(5)? as usize;

        let mut cursor = 4 + 1; // past the byte holding reserved|lengthSizeMinusOne
        let mut sps_list = Vec::with_capacity(num_sps);
        for _ in 0..num_sps {
            if cursor + 2 > buf.len() {
                return malformed_error(ctx().with_field("sps"), "truncated sps list");
            }
            let size = u16::from_be_bytes([buf[cursor], buf[cursor + 1]]) as usize;
            cursor += 2;
            if cursor + size > buf.len() {
                return malformed_error(ctx().with_field("sps"), "truncated sps entry");
            }
            sps_list.push(buf[cursor..cursor + size].to_vec());
            cursor += size;
        }

        if cursor >= buf.len() {
            return malformed_error(ctx().with_field("numOfPictureParameterSets"), "truncated avcC");
        }
        let num_pps = buf[cursor] as usize;
        cursor += 1;

        let mut pps_list = Vec::with_capacity(num_pps);
        for _ in 0..num_pps {
            if cursor + 2 > buf.len() {
                return malformed_error(ctx().with_field("pps"), "truncated pps list");
            }
            let size = u16::from_be_bytes([buf[cursor], buf[cursor + 1]]) as usize;
            cursor += 2;
            if cursor + size > buf.len() {
                return malformed_error(ctx().with_field("pps"), "truncated pps entry");
            }
            pps_list.push(buf[cursor..cursor + size].to_vec());
            cursor += size;
        }

        Ok(AvcDecoderConfigurationRecord {
            profile_indication,
            profile_compatibility,
            level_indication,
            sequence_parameter_sets: sps_list,
            picture_parameter_sets: pps_list,
        })
    }

    pub fn write(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_byte(1).unwrap();
        out.write_byte(self.profile_indication).unwrap();
        out.write_byte(self.profile_compatibility).unwrap();
        out.write_byte(self.level_indication).unwrap();
        out.write_byte(0b1111_1100 | (NALU_LENGTH_SIZE - 1)).unwrap();
        out.write_byte(0b1110_0000 | self.sequence_parameter_sets.len() as u8).unwrap();
        for sps in &self.sequence_parameter_sets {
            out.write_be_u16(sps.len() as u16).unwrap();
            out.write_buf(sps).unwrap();
        }
        out.write_byte(self.picture_parameter_sets.len() as u8).unwrap();
        for pps in &self.picture_parameter_sets {
            out.write_be_u16(pps.len() as u16).unwrap();
            out.write_buf(pps).unwrap();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> AvcDecoderConfigurationRecord {
        AvcDecoderConfigurationRecord {
            profile_indication: 0x64,
            profile_compatibility: 0x00,
            level_indication: 0x1f,
            sequence_parameter_sets: vec![vec![0x67, 0x64, 0x00, 0x1f]],
            picture_parameter_sets: vec![vec![0x68, 0xeb, 0xec, 0xb2]],
        }
    }

    #[test]
    fn round_trips_sps_and_pps() {
        let record = sample_record();
        let bytes = record.write();
        let parsed = AvcDecoderConfigurationRecord::read(&bytes).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn rejects_wrong_configuration_version() {
        let mut bytes = sample_record().write();
        bytes[0] = 2;
        assert!(AvcDecoderConfigurationRecord::read(&bytes).is_err());
    }
}
