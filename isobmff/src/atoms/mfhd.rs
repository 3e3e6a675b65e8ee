// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `mfhd` (Movie Fragment Header Box): a monotonically incrementing fragment sequence number,
//! starting at 1.

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::Result;
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MfhdAtom {
    pub sequence_number: u32,
}

impl MfhdAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let _full = FullBoxHeader::read(r)?;
        Ok(MfhdAtom { sequence_number: r.read_be_u32()? })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        FullBoxHeader::default().write(&mut content)?;
        content.write_be_u32(self.sequence_number)?;
        write_box(out, b"mfhd", &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_sequence_number() {
        let mfhd = MfhdAtom { sequence_number: 7 };
        let mut out = Vec::new();
        mfhd.write(&mut out).unwrap();
        let mut it = super::super::AtomIterator::new(&out, "/");
        let (_header, mut content) = it.next_atom().unwrap().unwrap();
        assert_eq!(MfhdAtom::read(&mut content).unwrap(), mfhd);
    }
}
