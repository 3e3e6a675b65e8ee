// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `ftyp` (File Type Box) and `styp` (Segment Type Box); identical layout, different name and
//! defaults. `major_brand` is always a 4-byte ASCII string; a type mismatch on serialize (e.g.
//! a numeric value assigned where a string is expected) is a schema error.

use super::write_box;
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

pub const ISOM_MAJOR_BRAND: [u8; 4] = *b"iso5";
pub const ISOM_MINOR_VERSION: u32 = 512;
pub const ISOM_COMPATIBLE_BRANDS: [[u8; 4]; 2] = [*b"iso6", *b"mp41"];

pub const CMAF_MAJOR_BRAND: [u8; 4] = *b"msdh";
pub const CMAF_MINOR_VERSION: u32 = 0;
pub const CMAF_COMPATIBLE_BRANDS: [[u8; 4]; 2] = [*b"msdh", *b"msix"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtypAtom {
    pub major_brand: [u8; 4],
    pub minor_version: u32,
    pub compatible_brands: Vec<[u8; 4]>,
}

impl FtypAtom {
    pub fn isom_default() -> Self {
        FtypAtom {
            major_brand: ISOM_MAJOR_BRAND,
            minor_version: ISOM_MINOR_VERSION,
            compatible_brands: ISOM_COMPATIBLE_BRANDS.to_vec(),
        }
    }

    pub fn cmaf_default() -> Self {
        FtypAtom {
            major_brand: CMAF_MAJOR_BRAND,
            minor_version: CMAF_MINOR_VERSION,
            compatible_brands: CMAF_COMPATIBLE_BRANDS.to_vec(),
        }
    }

    pub fn read(name: &[u8; 4], r: &mut SliceReader<'_>) -> Result<Self> {
        let ctx = || BoxContext::new(super::display_name(name));

        let mut major_brand = [0u8; 4];
        r.read_buf_exact(&mut major_brand)
            .map_err(|_| ())
            .or_else(|_| malformed_error(ctx().with_field("major_brand"), "truncated major_brand"))?;

        let minor_version = r.read_be_u32()?;

        if r.bytes_left() % 4 != 0 {
            return malformed_error(
                ctx().with_field("compatible_brands"),
                "compatible_brands is not a whole number of 4-byte entries",
            );
        }

        let mut compatible_brands = Vec::with_capacity(r.bytes_left() / 4);
        while r.bytes_left() > 0 {
            let mut brand = [0u8; 4];
            r.read_buf_exact(&mut brand)?;
            compatible_brands.push(brand);
        }

        Ok(FtypAtom { major_brand, minor_version, compatible_brands })
    }

    pub fn write(&self, out: &mut Vec<u8>, name: &[u8; 4]) -> Result<()> {
        if !self.major_brand.iter().all(|&b| b.is_ascii_graphic() || b == b' ') {
            return malformed_error(
                BoxContext::new(format!(":{}", super::display_name(name)))
                    .with_field("major_brand"),
                "major_brand is not a 4-byte ASCII string",
            );
        }

        let mut content = Vec::new();
        content.write_buf(&self.major_brand)?;
        content.write_be_u32(self.minor_version)?;
        for brand in &self.compatible_brands {
            content.write_buf(brand)?;
        }
        write_box(out, name, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_isom_ftyp_24_bytes() {
        let ftyp = FtypAtom::isom_default();
        let mut out = Vec::new();
        ftyp.write(&mut out, b"ftyp").unwrap();
        assert_eq!(out.len(), 24);

        let mut it = super::super::AtomIterator::new(&out, "/");
        let (header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(&header.name, b"ftyp");
        let parsed = FtypAtom::read(&header.name, &mut content).unwrap();
        assert_eq!(parsed, ftyp);
    }

    #[test]
    fn non_ascii_major_brand_reports_exact_error_string() {
        let ftyp = FtypAtom {
            major_brand: [0xff, 0x00, 0x01, 0x02],
            minor_version: 0,
            compatible_brands: vec![],
        };
        let mut out = Vec::new();
        let err = ftyp.write(&mut out, b"ftyp").unwrap_err();
        assert_eq!(err.to_string(), "malformed stream: major_brand is not a 4-byte ASCII string (box=:ftyp, field=major_brand)");
    }
}
