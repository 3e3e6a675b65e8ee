// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `mdia` (Media Box): `mdhd`, `hdlr`, `minf`.

use super::hdlr::HdlrAtom;
use super::mdhd::MdhdAtom;
use super::minf::MinfAtom;
use super::{write_box, AtomIterator};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::SliceReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdiaAtom {
    pub mdhd: MdhdAtom,
    pub hdlr: HdlrAtom,
    pub minf: MinfAtom,
}

impl MdiaAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let mut mdhd = None;
        let mut hdlr = None;
        let mut minf = None;

        let mut it = AtomIterator::new(r.remaining(), "mdia");
        while let Some((header, mut content)) = it.next_atom()? {
            match &header.name {
                b"mdhd" => mdhd = Some(MdhdAtom::read(&mut content)?),
                b"hdlr" => hdlr = Some(HdlrAtom::read(&mut content)?),
                b"minf" => minf = Some(MinfAtom::read(&mut content)?),
                _ => {}
            }
        }

        let mdhd =
            mdhd.ok_or(()).or_else(|_| malformed_error(BoxContext::new("mdia"), "missing mdhd"))?;
        let hdlr =
            hdlr.ok_or(()).or_else(|_| malformed_error(BoxContext::new("mdia"), "missing hdlr"))?;
        let minf =
            minf.ok_or(()).or_else(|_| malformed_error(BoxContext::new("mdia"), "missing minf"))?;

        Ok(MdiaAtom { mdhd, hdlr, minf })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        self.mdhd.write(&mut content)?;
        self.hdlr.write(&mut content)?;
        self.minf.write(&mut content)?;
        write_box(out, b"mdia", &content)
    }
}
