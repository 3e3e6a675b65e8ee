// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pure Rust ISO Base Media File Format / CMAF container codec, sample table engine, and
//! muxer/demuxer toolkit.
//!
//! This crate has three layers:
//!
//! - [`atoms`]: the box schema, one module per supported box.
//! - [`sample_table`] and [`track`]: the sample table accumulator/reconstruction engine and the
//!   per-stream track model both muxers and demuxers build around.
//! - [`mux`] and [`demux`]: classic ISOM (non-fragmented) and CMAF (fragmented) assembly and
//!   parsing, built on the two layers above.

mod atoms;
pub mod codec;
pub mod demux;
mod fourcc;
mod fp;
pub mod mux;
mod sample_table;
pub mod track;

pub use atoms::SampleEntry;
pub use codec::{Framerate, StreamFormat};
pub use demux::cmaf::{CmafDemuxer, CmafEvent};
pub use demux::engine::{DataProvider, Engine};
pub use demux::{Sample, SampleDescription};
pub use mux::cmaf::{CmafMuxer, CmafMuxerOptions};
pub use mux::isom::{IsomMuxer, IsomMuxerOptions};
pub use sample_table::ReconstructedSample;
pub use track::{Track, TrackKind, DEFAULT_MOVIE_TIMESCALE};

pub use isobmff_core::errors::{Error, Result};
