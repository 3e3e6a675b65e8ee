// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `moov` (Movie Box): `mvhd`, one `trak` per track, and (CMAF init headers only) `mvex`.

use super::mvex::MvexAtom;
use super::mvhd::MvhdAtom;
use super::trak::TrakAtom;
use super::{write_box, AtomIterator};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::SliceReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoovAtom {
    pub mvhd: MvhdAtom,
    pub trak: Vec<TrakAtom>,
    pub mvex: Option<MvexAtom>,
}

impl MoovAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let mut mvhd = None;
        let mut trak = Vec::new();
        let mut mvex = None;

        let mut it = AtomIterator::new(r.remaining(), "moov");
        while let Some((header, mut content)) = it.next_atom()? {
            match &header.name {
                b"mvhd" => mvhd = Some(MvhdAtom::read(&mut content)?),
                b"trak" => trak.push(TrakAtom::read(&mut content)?),
                b"mvex" => mvex = Some(MvexAtom::read(&mut content)?),
                _ => {}
            }
        }

        let mvhd =
            mvhd.ok_or(()).or_else(|_| malformed_error(BoxContext::new("moov"), "missing mvhd"))?;

        if trak.is_empty() {
            return malformed_error(BoxContext::new("moov"), "missing at least one trak");
        }

        Ok(MoovAtom { mvhd, trak, mvex })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        self.mvhd.write(&mut content)?;
        for trak in &self.trak {
            trak.write(&mut content)?;
        }
        if let Some(mvex) = &self.mvex {
            mvex.write(&mut content)?;
        }
        write_box(out, b"moov", &content)
    }
}
