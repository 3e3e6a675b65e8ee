// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `smhd` (Sound Media Header), present in `minf` for audio tracks.

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::Result;
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

#[derive(Debug, Clone, Copy, Default)]
pub struct SmhdAtom;

impl SmhdAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let _full = FullBoxHeader::read(r)?;
        let _balance = r.read_be_u16()?;
        let _reserved = r.read_be_u16()?;
        Ok(SmhdAtom)
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        FullBoxHeader::default().write(&mut content)?;
        content.write_be_u16(0)?;
        content.write_be_u16(0)?;
        write_box(out, b"smhd", &content)
    }
}
