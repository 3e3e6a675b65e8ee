// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `traf` (Track Fragment Box): `tfhd`, `tfdt`, and one or more `trun` runs for one track
//! within a fragment.

use super::tfdt::TfdtAtom;
use super::tfhd::TfhdAtom;
use super::trun::TrunAtom;
use super::{write_box, AtomIterator};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::SliceReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafAtom {
    pub tfhd: TfhdAtom,
    pub tfdt: TfdtAtom,
    pub trun: Vec<TrunAtom>,
}

impl TrafAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let mut tfhd = None;
        let mut tfdt = None;
        let mut trun = Vec::new();

        let mut it = AtomIterator::new(r.remaining(), "traf");
        while let Some((header, mut content)) = it.next_atom()? {
            match &header.name {
                b"tfhd" => tfhd = Some(TfhdAtom::read(&mut content)?),
                b"tfdt" => tfdt = Some(TfdtAtom::read(&mut content)?),
                b"trun" => trun.push(TrunAtom::read(&mut content)?),
                _ => {}
            }
        }

        let tfhd =
            tfhd.ok_or(()).or_else(|_| malformed_error(BoxContext::new("traf"), "missing tfhd"))?;
        let tfdt =
            tfdt.ok_or(()).or_else(|_| malformed_error(BoxContext::new("traf"), "missing tfdt"))?;

        Ok(TrafAtom { tfhd, tfdt, trun })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        self.tfhd.write(&mut content)?;
        self.tfdt.write(&mut content)?;
        for trun in &self.trun {
            trun.write(&mut content)?;
        }
        write_box(out, b"traf", &content)
    }
}
