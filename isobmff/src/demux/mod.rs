// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Demuxing: the classic ISOM [`engine`] (random-access, callback-driven) and the streaming
//! CMAF [`cmaf`] reader (sequential `moof`/`mdat` parse).

pub mod cmaf;
pub mod engine;

use crate::atoms::SampleEntry;

/// What a track's `stsd` resolved to: `None` when the entry names a codec this toolkit does
/// not parse (the demuxer tolerates this rather than failing the whole file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleDescription {
    pub sample_entry: Option<SampleEntry>,
}

impl SampleDescription {
    pub fn is_video(&self) -> bool {
        matches!(self.sample_entry, Some(SampleEntry::Avc { .. }) | Some(SampleEntry::Hevc { .. }))
    }
}

/// One decoded sample handed back across the demux boundary, with timing already converted to
/// milliseconds.
#[derive(Debug, Clone)]
pub struct Sample {
    pub track_id: u32,
    pub data: Vec<u8>,
    pub dts_ms: u64,
    pub pts_ms: i64,
    pub is_sync: bool,
}
