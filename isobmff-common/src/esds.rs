// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ISO/IEC 14496-1 object descriptors, nested under `esds` for AAC tracks: an `ES_Descriptor`
//! (tag 3) wrapping a `DecoderConfigDescriptor` (tag 4), which in turn wraps the
//! `DecoderSpecificInfo` (tag 5, the raw `AudioSpecificConfig`) and is followed by a minimal
//! `SLConfigDescriptor` (tag 6).

use isobmff_core::errors::{malformed_error, unsupported_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

/// Object type indication for MPEG-4 Audio (AAC), ISO/IEC 14496-3.
pub const OBJECT_TYPE_AUDIO_MPEG4: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassTag {
    EsDescriptor,
    DecoderConfigDescriptor,
    DecoderSpecificInfo,
    SlConfigDescriptor,
    Other(u8),
}

impl ClassTag {
    fn from_byte(b: u8) -> ClassTag {
        match b {
            0x03 => ClassTag::EsDescriptor,
            0x04 => ClassTag::DecoderConfigDescriptor,
            0x05 => ClassTag::DecoderSpecificInfo,
            0x06 => ClassTag::SlConfigDescriptor,
            other => ClassTag::Other(other),
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            ClassTag::EsDescriptor => 0x03,
            ClassTag::DecoderConfigDescriptor => 0x04,
            ClassTag::DecoderSpecificInfo => 0x05,
            ClassTag::SlConfigDescriptor => 0x06,
            ClassTag::Other(b) => b,
        }
    }
}

/// Reads a descriptor tag and its variable-length size. The size is encoded as up to four
/// 7-bit big-endian groups, each but the last with its continuation bit (0x80) set; real-world
/// encoders sometimes pad this out with leading `0x80` groups carrying zero value (the "three
/// byte extension" the box schema must tolerate), which this decode loop accepts transparently
/// since it simply keeps folding in 7-bit groups until the continuation bit clears.
fn read_descriptor_header(r: &mut SliceReader<'_>) -> Result<(ClassTag, u64)> {
    let tag = ClassTag::from_byte(r.read_u8()?);

    let mut size: u64 = 0;
    for _ in 0..4 {
        let b = r.read_u8()?;
        size = (size << 7) | u64::from(b & 0x7f);
        if b & 0x80 == 0 {
            break;
        }
    }

    Ok((tag, size))
}

/// Writes a descriptor tag and size using the minimal-length encoding (no padding groups).
fn write_descriptor_header(out: &mut Vec<u8>, tag: ClassTag, size: u32) {
    out.write_byte(tag.to_byte()).unwrap();
    let mut groups = [(size & 0x7f) as u8, 0, 0, 0];
    let mut n = 1;
    let mut rem = size >> 7;
    while rem > 0 {
        groups[n] = (rem & 0x7f) as u8;
        rem >>= 7;
        n += 1;
    }
    for i in (0..n).rev() {
        let continuation = if i == 0 { 0x00 } else { 0x80 };
        out.write_byte(groups[i] | continuation).unwrap();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsDescriptor {
    pub es_id: u16,
    pub object_type_indication: u8,
    /// The raw `AudioSpecificConfig` bytes (the `DecoderSpecificInfo` payload).
    pub decoder_specific_info: Vec<u8>,
}

impl EsDescriptor {
    pub fn read(buf: &[u8]) -> Result<Self> {
        let ctx = || BoxContext::new("esds/ES_Descriptor");
        let mut r = SliceReader::new(buf);

        let (tag, _len) = read_descriptor_header(&mut r)?;
        if tag != ClassTag::EsDescriptor {
            return malformed_error(ctx(), "expected ES_Descriptor tag");
        }

        let es_id = r.read_be_u16()?;
        let flags = r.read_u8()?;

        if flags & 0x80 != 0 {
            r.read_be_u16()?; // depends_on_es_id
        }
        if flags & 0x40 != 0 {
            let url_len = r.read_u8()?;
            r.ignore_bytes(u64::from(url_len))?;
        }
        if flags & 0x20 != 0 {
            r.read_be_u16()?; // ocr_es_id
        }

        let mut object_type_indication = None;
        let mut decoder_specific_info = None;

        while r.bytes_left() > 0 {
            let (tag, len) = read_descriptor_header(&mut r)?;
            match tag {
                ClassTag::DecoderConfigDescriptor => {
                    let body = r.read_boxed_slice(len as usize)?;
                    let (oti, dsi) = read_decoder_config_descriptor(&body)?;
                    object_type_indication = Some(oti);
                    decoder_specific_info = dsi;
                }
                ClassTag::SlConfigDescriptor => {
                    r.ignore_bytes(len)?;
                }
                _ => {
                    r.ignore_bytes(len)?;
                }
            }
        }

        let object_type_indication = object_type_indication
            .ok_or(())
            .or_else(|_| malformed_error(ctx(), "missing decoder config descriptor"))?;
        let decoder_specific_info = decoder_specific_info.unwrap_or_default();

        Ok(EsDescriptor { es_id, object_type_indication, decoder_specific_info })
    }

    pub fn write(&self) -> Vec<u8> {
        let mut dec_specific = Vec::new();
        write_descriptor_header(&mut dec_specific, ClassTag::DecoderSpecificInfo, self.decoder_specific_info.len() as u32);
        dec_specific.write_buf(&self.decoder_specific_info).unwrap();

        let mut dec_config = Vec::new();
        dec_config.write_byte(self.object_type_indication).unwrap();
        dec_config.write_byte((0x05 << 2) | 0x01).unwrap(); // stream_type=audio(5), upstream=0, reserved=1
        dec_config.write_be_u24(0).unwrap(); // buffer_size_db
        dec_config.write_be_u32(0).unwrap(); // max_bitrate
        dec_config.write_be_u32(0).unwrap(); // avg_bitrate
        dec_config.write_buf(&dec_specific).unwrap();

        let mut sl_config = Vec::new();
        sl_config.write_byte(0x02).unwrap(); // predefined = MP4 (per spec's SLConfig=2)

        let mut body = Vec::new();
        body.write_be_u16(self.es_id).unwrap();
        body.write_byte(0).unwrap(); // flags: no dependsOn, no URL, no OCR

        let mut dec_config_descriptor = Vec::new();
        write_descriptor_header(&mut dec_config_descriptor, ClassTag::DecoderConfigDescriptor, dec_config.len() as u32);
        dec_config_descriptor.write_buf(&dec_config).unwrap();
        body.write_buf(&dec_config_descriptor).unwrap();

        let mut sl_config_descriptor = Vec::new();
        write_descriptor_header(&mut sl_config_descriptor, ClassTag::SlConfigDescriptor, sl_config.len() as u32);
        sl_config_descriptor.write_buf(&sl_config).unwrap();
        body.write_buf(&sl_config_descriptor).unwrap();

        let mut out = Vec::new();
        write_descriptor_header(&mut out, ClassTag::EsDescriptor, body.len() as u32);
        out.write_buf(&body).unwrap();
        out
    }
}

fn read_decoder_config_descriptor(buf: &[u8]) -> Result<(u8, Option<Vec<u8>>)> {
    let ctx = || BoxContext::new("esds/DecoderConfigDescriptor");
    let mut r = SliceReader::new(buf);

    if buf.len() < 13 {
        return malformed_error(ctx(), "decoder config descriptor too short");
    }

    let object_type_indication = r.read_u8()?;
    r.read_u8()?; // stream_type(6) | upstream(1) | reserved(1)
    r.read_be_u24()?; // buffer_size_db
    r.read_be_u32()?; // max_bitrate
    r.read_be_u32()?; // avg_bitrate

    let mut decoder_specific_info = None;
    while r.bytes_left() > 0 {
        let (tag, len) = read_descriptor_header(&mut r)?;
        if tag == ClassTag::DecoderSpecificInfo {
            decoder_specific_info = Some(r.read_boxed_slice(len as usize)?);
        } else {
            r.ignore_bytes(len)?;
        }
    }

    if object_type_indication != OBJECT_TYPE_AUDIO_MPEG4 {
        return unsupported_error(format!(
            "esds object type indication {:#x}",
            object_type_indication
        ));
    }

    Ok((object_type_indication, decoder_specific_info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_aac_descriptor() {
        let descriptor = EsDescriptor {
            es_id: 1,
            object_type_indication: OBJECT_TYPE_AUDIO_MPEG4,
            decoder_specific_info: vec![0x11, 0x90],
        };
        let bytes = descriptor.write();
        let parsed = EsDescriptor::read(&bytes).unwrap();
        assert_eq!(parsed, descriptor);
    }

    #[test]
    fn tolerates_padded_length_encoding() {
        // A descriptor header with a three-group 0x80-padded length prefix before the final
        // terminating group, as produced by some encoders.
        let descriptor = EsDescriptor {
            es_id: 7,
            object_type_indication: OBJECT_TYPE_AUDIO_MPEG4,
            decoder_specific_info: vec![0x12, 0x08],
        };
        let mut bytes = descriptor.write();
        // Re-encode the outer tag's length with padded continuation groups: tag byte stays,
        // followed by 0x80 0x80 0x80 <final_byte>.
        let tag = bytes[0];
        let rest = bytes.split_off(2); // drop the original single-byte length
        let mut padded = vec![tag, 0x80, 0x80, 0x80, rest.len() as u8];
        padded.extend_from_slice(&rest);
        let parsed = EsDescriptor::read(&padded).unwrap();
        assert_eq!(parsed, descriptor);
    }

    #[test]
    fn rejects_unsupported_object_type() {
        let bad = EsDescriptor {
            es_id: 1,
            object_type_indication: 0x69, // MP3, not AAC
            decoder_specific_info: vec![],
        };
        let bytes = bad.write();
        assert!(EsDescriptor::read(&bytes).is_err());
    }
}
