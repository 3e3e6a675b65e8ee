// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `dinf` (Data Information Box) { `dref` { `url ` } }. This toolkit only ever produces and
//! expects the self-contained case: a single `url ` entry with the "media data is in this
//! file" flag set and no location string.

use super::{display_name, write_box, AtomIterator, FullBoxHeader};
use isobmff_core::errors::{malformed_error, BoxContext, Result};
use isobmff_core::io::{ReadBytes, SliceReader, WriteBytes};

const SELF_CONTAINED_FLAG: u32 = 0x0000_01;

#[derive(Debug, Clone, Copy, Default)]
pub struct DinfAtom;

impl DinfAtom {
    pub fn read(r: &mut SliceReader<'_>) -> Result<Self> {
        let mut it = AtomIterator::new(r.remaining(), "dinf");

        let mut saw_dref = false;
        while let Some((header, mut content)) = it.next_atom()? {
            if &header.name == b"dref" {
                read_dref(&mut content)?;
                saw_dref = true;
            }
        }

        if !saw_dref {
            return malformed_error(BoxContext::new("dinf"), "missing dref box");
        }

        Ok(DinfAtom)
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut dref_content = Vec::new();
        FullBoxHeader::default().write(&mut dref_content)?;
        dref_content.write_be_u32(1)?; // entry_count
        let mut entry = Vec::new();
        FullBoxHeader { version: 0, flags: SELF_CONTAINED_FLAG }.write(&mut entry)?;
        write_box(&mut dref_content, b"url ", &entry)?;

        let mut dinf_content = Vec::new();
        write_box(&mut dinf_content, b"dref", &dref_content)?;
        write_box(out, b"dinf", &dinf_content)
    }
}

fn read_dref(r: &mut SliceReader<'_>) -> Result<()> {
    let _full = FullBoxHeader::read(r)?;
    let entry_count = r.read_be_u32()?;

    let mut it = AtomIterator::new(r.remaining(), "dinf/dref");
    for _ in 0..entry_count {
        match it.next_atom()? {
            Some((header, _content)) if &header.name == b"url " || &header.name == b"urn " => {}
            Some((header, _)) => {
                return malformed_error(
                    BoxContext::new(format!("dinf/dref/{}", display_name(&header.name))),
                    "unexpected data entry type",
                )
            }
            None => return malformed_error(BoxContext::new("dinf/dref"), "missing data entry"),
        }
    }

    Ok(())
}
