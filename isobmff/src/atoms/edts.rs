// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `edts` (Edit Box), carrying `elst` edit lists. Arbitrary edit-list composition is out of
//! scope for this toolkit's muxers (which never emit `edts`), but a demuxed file's `edts`
//! content is preserved verbatim on round-trip rather than dropped.

use super::write_box;
use isobmff_core::errors::Result;
use isobmff_core::io::{SliceReader, WriteBytes};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EdtsAtom {
    /// Raw bytes of the `edts` box's children (typically a single `elst`), preserved verbatim.
    pub raw_children: Vec<u8>,
}

impl EdtsAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        Ok(EdtsAtom { raw_children: r.remaining().to_vec() })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        write_box(out, b"edts", &self.raw_children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_opaque_children() {
        let edts = EdtsAtom { raw_children: vec![0xde, 0xad, 0xbe, 0xef] };
        let mut out = Vec::new();
        edts.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(EdtsAtom::read(&mut content).unwrap(), edts);
    }
}
