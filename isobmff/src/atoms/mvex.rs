// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `mvex` (Movie Extends Box): one `trex` per track, present only in a CMAF initialization
//! header to signal that fragments follow.

use super::trex::TrexAtom;
use super::{write_box, AtomIterator};
use isobmff_core::errors::Result;
use isobmff_core::io::SliceReader;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MvexAtom {
    pub trex: Vec<TrexAtom>,
}

impl MvexAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let mut trex = Vec::new();
        let mut it = AtomIterator::new(r.remaining(), "mvex");
        while let Some((header, mut content)) = it.next_atom()? {
            if &header.name == b"trex" {
                trex.push(TrexAtom::read(&mut content)?);
            }
        }
        Ok(MvexAtom { trex })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        for trex in &self.trex {
            trex.write(&mut content)?;
        }
        write_box(out, b"mvex", &content)
    }
}
