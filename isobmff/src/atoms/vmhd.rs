// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `vmhd` (Video Media Header), present in `minf` for video tracks.

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::Result;
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

#[derive(Debug, Clone, Copy, Default)]
pub struct VmhdAtom;

impl VmhdAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let _full = FullBoxHeader::read(r)?;
        let _graphics_mode = r.read_be_u16()?;
        for _ in 0..3 {
            let _opcolor = r.read_be_u16()?;
        }
        Ok(VmhdAtom)
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        FullBoxHeader { version: 0, flags: 1 }.write(&mut content)?;
        content.write_be_u16(0)?;
        for _ in 0..3 {
            content.write_be_u16(0)?;
        }
        write_box(out, b"vmhd", &content)
    }
}
