// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Muxing: assembling the box tree for classic ISOM output ([`isom`]) and fragmented CMAF
//! output ([`cmaf`]), both built around the same [`Track`](crate::track::Track) accumulator.

pub mod cmaf;
pub mod isom;

use crate::atoms::hdlr::HdlrAtom;
use crate::atoms::mdhd::MdhdAtom;
use crate::atoms::mdia::MdiaAtom;
use crate::atoms::minf::{MediaHeader, MinfAtom};
use crate::atoms::smhd::SmhdAtom;
use crate::atoms::stbl::StblAtom;
use crate::atoms::tkhd::TkhdAtom;
use crate::atoms::trak::TrakAtom;
use crate::atoms::vmhd::VmhdAtom;
use crate::track::Track;

/// Assembly progress shared by both muxers: inputs declare their stream format before any
/// sample can flow, and finalizing/draining is a one-way trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MuxerState {
    WaitingStreamFormats,
    Accumulating,
    Finalizing,
    Finalized,
}

/// Assembles a `trak` around a sealed sample table, sharing the tkhd/mdhd/hdlr/minf layout both
/// the classic and CMAF muxers need. `stbl` is the track's sample table: a fully populated
/// table for classic ISOM, or an empty placeholder for a CMAF initialization header.
pub(crate) fn build_trak(track: &Track, stbl: StblAtom, movie_timescale: u32) -> TrakAtom {
    let (width, height) = track.dimensions();
    let is_audio = !track.format.is_video();

    let tkhd = TkhdAtom {
        creation_time: 0,
        modification_time: 0,
        track_id: track.id,
        duration: track.duration_in_movie_ticks(movie_timescale),
        is_audio,
        width: u32::from(width),
        height: u32::from(height),
    };

    let hdlr = if is_audio { HdlrAtom::audio() } else { HdlrAtom::video() };
    let media_header =
        if is_audio { MediaHeader::Audio(SmhdAtom) } else { MediaHeader::Video(VmhdAtom) };
    let mdhd = MdhdAtom::new(track.timescale, track.duration_in_track_ticks());
    let minf = MinfAtom { media_header, stbl };
    let mdia = MdiaAtom { mdhd, hdlr, minf };

    TrakAtom { tkhd, edts: None, mdia }
}
