// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `sidx` (Segment Index Box). Multi-segment index trees (a reference pointing at another
//! `sidx` rather than media) are out of scope; this toolkit's CMAF muxer always builds a
//! single-reference segment index, though parsing tolerates a general reference count.

use super::{write_box, FullBoxHeader};
use isobmff_core::bits::{BitReaderMsb, BitWriterMsb};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidxReference {
    /// `false` for a reference to media (`mdat`); `true` for a reference to another `sidx`.
    pub reference_to_sidx: bool,
    pub referenced_size: u32,
    pub subsegment_duration: u32,
    pub starts_with_sap: bool,
    pub sap_type: u8,
    pub sap_delta_time: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidxAtom {
    pub reference_id: u32,
    pub timescale: u32,
    pub earliest_presentation_time: u64,
    pub first_offset: u64,
    pub references: Vec<SidxReference>,
}

impl SidxAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let full = FullBoxHeader::read(r)?;
        let reference_id = r.read_be_u32()?;
        let timescale = r.read_be_u32()?;

        let (earliest_presentation_time, first_offset) = match full.version {
            0 => (u64::from(r.read_be_u32()?), u64::from(r.read_be_u32()?)),
            1 => (r.read_be_u64()?, r.read_be_u64()?),
            v => {
                return malformed_error(
                    BoxContext::new("sidx").with_field("version"),
                    format!("unsupported sidx version {}", v),
                )
            }
        };

        r.ignore_bytes(2)?; // reserved
        let reference_count = r.read_be_u16()?;

        let mut references = Vec::with_capacity(reference_count as usize);
        for _ in 0..reference_count {
            let mut packed = [0u8; 4];
            r.read_buf_exact(&mut packed)?;
            let mut br = BitReaderMsb::new(&packed);
            let reference_to_sidx = br.read_bool()?;
            let referenced_size = br.read_bits(31)? as u32;

            let subsegment_duration = r.read_be_u32()?;

            let mut sap = [0u8; 4];
            r.read_buf_exact(&mut sap)?;
            let mut sap_br = BitReaderMsb::new(&sap);
            let starts_with_sap = sap_br.read_bool()?;
            let sap_type = sap_br.read_bits(3)? as u8;
            let sap_delta_time = sap_br.read_bits(28)? as u32;

            references.push(SidxReference {
                reference_to_sidx,
                referenced_size,
                subsegment_duration,
                starts_with_sap,
                sap_type,
                sap_delta_time,
            });
        }

        Ok(SidxAtom { reference_id, timescale, earliest_presentation_time, first_offset, references })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let use_v1 = self.earliest_presentation_time > u32::MAX as u64
            || self.first_offset > u32::MAX as u64;

        let mut content = Vec::new();
        FullBoxHeader { version: if use_v1 { 1 } else { 0 }, flags: 0 }.write(&mut content)?;
        content.write_be_u32(self.reference_id)?;
        content.write_be_u32(self.timescale)?;

        if use_v1 {
            content.write_be_u64(self.earliest_presentation_time)?;
            content.write_be_u64(self.first_offset)?;
        } else {
            content.write_be_u32(self.earliest_presentation_time as u32)?;
            content.write_be_u32(self.first_offset as u32)?;
        }

        content.write_be_u16(0)?; // reserved
        content.write_be_u16(self.references.len() as u16)?;

        for reference in &self.references {
            let mut packed = Vec::with_capacity(4);
            {
                let mut bw = BitWriterMsb::new(&mut packed);
                bw.write_bool(reference.reference_to_sidx);
                bw.write_bits(u64::from(reference.referenced_size), 31);
                bw.finish();
            }
            content.write_buf(&packed)?;
            content.write_be_u32(reference.subsegment_duration)?;

            let mut sap = Vec::with_capacity(4);
            {
                let mut bw = BitWriterMsb::new(&mut sap);
                bw.write_bool(reference.starts_with_sap);
                bw.write_bits(u64::from(reference.sap_type), 3);
                bw.write_bits(u64::from(reference.sap_delta_time), 28);
                bw.finish();
            }
            content.write_buf(&sap)?;
        }

        write_box(out, b"sidx", &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_single_reference() {
        let sidx = SidxAtom {
            reference_id: 1,
            timescale: 30 * 1024,
            earliest_presentation_time: 0,
            first_offset: 0,
            references: vec![SidxReference {
                reference_to_sidx: false,
                referenced_size: 65_536,
                subsegment_duration: 4 * 30 * 1024,
                starts_with_sap: true,
                sap_type: 1,
                sap_delta_time: 0,
            }],
        };
        let mut out = Vec::new();
        sidx.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(SidxAtom::read(&mut content).unwrap(), sidx);
    }
}
