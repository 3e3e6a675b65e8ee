// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `stbl` (Sample Table Box): the container for a track's random-access sample metadata.
//! Unlike some ISO-BMFF readers that only need sizes/offsets for playback, this toolkit
//! retains `ctts` (composition offsets) and `stss` (sync samples) in full, since both the
//! mux and demux paths need them to recover `pts` and keyframe positions.

use super::co64::Co64Atom;
use super::ctts::CttsAtom;
use super::stco::StcoAtom;
use super::stsc::StscAtom;
use super::stsd::StsdAtom;
use super::stss::StssAtom;
use super::stsz::StszAtom;
use super::stts::SttsAtom;
use super::{write_box, AtomIterator};
use isobmff_core::errors::{malformed_error, BoxContext, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StblAtom {
    pub stsd: StsdAtom,
    pub stts: SttsAtom,
    pub ctts: Option<CttsAtom>,
    pub stss: Option<StssAtom>,
    pub stsc: StscAtom,
    pub stsz: StszAtom,
    /// Absolute chunk offsets, unified regardless of whether the source used `stco` or `co64`.
    pub chunk_offsets: Vec<u64>,
}

impl StblAtom {
    pub fn read(r: &mut isobmff_core::io::SliceReader<'_>) -> Result<Self> {
        let mut stsd = None;
        let mut stts = None;
        let mut ctts = None;
        let mut stss = None;
        let mut stsc = None;
        let mut stsz = None;
        let mut stco = None;
        let mut co64 = None;

        let mut it = AtomIterator::new(r.remaining(), "stbl");
        while let Some((header, mut content)) = it.next_atom()? {
            match &header.name {
                b"stsd" => stsd = Some(StsdAtom::read(&mut content)?),
                b"stts" => stts = Some(SttsAtom::read(&mut content)?),
                b"ctts" => ctts = Some(CttsAtom::read(&mut content)?),
                b"stss" => stss = Some(StssAtom::read(&mut content)?),
                b"stsc" => stsc = Some(StscAtom::read(&mut content)?),
                b"stsz" => stsz = Some(StszAtom::read(&mut content)?),
                b"stco" => stco = Some(StcoAtom::read(&mut content)?),
                b"co64" => co64 = Some(Co64Atom::read(&mut content)?),
                _ => {}
            }
        }

        let stsd = stsd.ok_or(()).or_else(|_| malformed_error(BoxContext::new("stbl"), "missing stsd"))?;
        let stts = stts.ok_or(()).or_else(|_| malformed_error(BoxContext::new("stbl"), "missing stts"))?;
        let stsc = stsc.ok_or(()).or_else(|_| malformed_error(BoxContext::new("stbl"), "missing stsc"))?;
        let stsz = stsz.ok_or(()).or_else(|_| malformed_error(BoxContext::new("stbl"), "missing stsz"))?;

        let chunk_offsets = match (stco, co64) {
            (_, Some(co64)) => co64.chunk_offsets,
            (Some(stco), None) => stco.chunk_offsets.into_iter().map(u64::from).collect(),
            (None, None) => {
                return malformed_error(BoxContext::new("stbl"), "missing stco/co64")
            }
        };

        Ok(StblAtom { stsd, stts, ctts, stss, stsc, stsz, chunk_offsets })
    }

    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut content = Vec::new();
        self.stsd.write(&mut content)?;
        self.stts.write(&mut content)?;
        if let Some(ctts) = &self.ctts {
            ctts.write(&mut content)?;
        }
        if let Some(stss) = &self.stss {
            stss.write(&mut content)?;
        }
        self.stsc.write(&mut content)?;
        self.stsz.write(&mut content)?;

        if self.chunk_offsets.iter().all(|&o| o <= u32::MAX as u64) {
            StcoAtom { chunk_offsets: self.chunk_offsets.iter().map(|&o| o as u32).collect() }
                .write(&mut content)?;
        } else {
            Co64Atom { chunk_offsets: self.chunk_offsets.clone() }.write(&mut content)?;
        }

        write_box(out, b"stbl", &content)
    }
}
