// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `hdlr` (Handler Reference Box), identifying a media handler type (`vide`/`soun`).

use super::{write_box, FullBoxHeader};
use isobmff_core::errors::Result;
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

pub const HANDLER_VIDEO: [u8; 4] = *b"vide";
pub const HANDLER_AUDIO: [u8; 4] = *b"soun";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdlrAtom {
    pub handler_type: [u8; 4],
    pub name: String,
}

impl HdlrAtom {
    pub fn video() -> Self {
        HdlrAtom { handler_type: HANDLER_VIDEO, name: "VideoHandler".to_string() }
    }

    pub fn audio() -> Self {
        HdlrAtom { handler_type: HANDLER_AUDIO, name: "SoundHandler".to_string() }
    }

    pub fn is_video(&self) -> bool {
        self.handler_type == HANDLER_VIDEO
    }

    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let _full = FullBoxHeader::read(r)?;
        r.ignore_bytes(4)?; // pre_defined
        let mut handler_type = [0u8; 4];
        r.read_buf_exact(&mut handler_type)?;
        r.ignore_bytes(12)?; // reserved[3]

        let name_bytes = r.remaining();
        let name = String::from_utf8_lossy(
            name_bytes.split(|&b| b == 0).next().unwrap_or(&[]),
        )
        .into_owned();

        Ok(HdlrAtom { handler_type, name })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        FullBoxHeader::default().write(&mut content)?;
        content.write_be_u32(0)?; // pre_defined
        content.write_buf(&self.handler_type)?;
        for _ in 0..3 {
            content.write_be_u32(0)?; // reserved
        }
        content.write_c_string(self.name.as_bytes())?;
        write_box(out, b"hdlr", &content)
    }
}
