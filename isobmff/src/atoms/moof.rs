// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `moof` (Movie Fragment Box): `mfhd` and one `traf` per track carrying samples in this
//! fragment.

use super::mfhd::MfhdAtom;
use super::traf::TrafAtom;
use super::{write_box, AtomIterator};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::SliceReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoofAtom {
    pub mfhd: MfhdAtom,
    pub traf: Vec<TrafAtom>,
}

impl MoofAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let mut mfhd = None;
        let mut traf = Vec::new();

        let mut it = AtomIterator::new(r.remaining(), "moof");
        while let Some((header, mut content)) = it.next_atom()? {
            match &header.name {
                b"mfhd" => mfhd = Some(MfhdAtom::read(&mut content)?),
                b"traf" => traf.push(TrafAtom::read(&mut content)?),
                _ => {}
            }
        }

        let mfhd =
            mfhd.ok_or(()).or_else(|_| malformed_error(BoxContext::new("moof"), "missing mfhd"))?;

        if traf.is_empty() {
            return malformed_error(BoxContext::new("moof"), "missing at least one traf");
        }

        Ok(MoofAtom { mfhd, traf })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        self.mfhd.write(&mut content)?;
        for traf in &self.traf {
            traf.write(&mut content)?;
        }
        write_box(out, b"moof", &content)
    }
}
