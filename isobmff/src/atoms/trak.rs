// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `trak` (Track Box): `tkhd`, an optional `edts`, and `mdia`. This toolkit's muxers never
//! emit `edts` (arbitrary edit-list composition is out of scope), but a demuxed `edts` is
//! preserved on round-trip.

use super::edts::EdtsAtom;
use super::mdia::MdiaAtom;
use super::tkhd::TkhdAtom;
use super::{write_box, AtomIterator};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::SliceReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrakAtom {
    pub tkhd: TkhdAtom,
    pub edts: Option<EdtsAtom>,
    pub mdia: MdiaAtom,
}

impl TrakAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let mut tkhd = None;
        let mut edts = None;
        let mut mdia = None;

        let mut it = AtomIterator::new(r.remaining(), "trak");
        while let Some((header, mut content)) = it.next_atom()? {
            match &header.name {
                b"tkhd" => tkhd = Some(TkhdAtom::read(&mut content)?),
                b"edts" => edts = Some(EdtsAtom::read(&mut content)?),
                b"mdia" => mdia = Some(MdiaAtom::read(&mut content)?),
                _ => {}
            }
        }

        let tkhd =
            tkhd.ok_or(()).or_else(|_| malformed_error(BoxContext::new("trak"), "missing tkhd"))?;
        let mdia =
            mdia.ok_or(()).or_else(|_| malformed_error(BoxContext::new("trak"), "missing mdia"))?;

        Ok(TrakAtom { tkhd, edts, mdia })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        self.tkhd.write(&mut content)?;
        if let Some(edts) = &self.edts {
            edts.write(&mut content)?;
        }
        self.mdia.write(&mut content)?;
        write_box(out, b"trak", &content)
    }
}
