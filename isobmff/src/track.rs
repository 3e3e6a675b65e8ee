// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The track model: the unit of per-stream state the mux and demux elements build around one
//! codec stream, sitting between a raw sample stream and the `trak`/`tkhd`/`stbl` boxes that
//! eventually represent it on the wire.

use crate::codec::StreamFormat;
use crate::sample_table::{SampleTableBuilder, SealedSampleTable};
use isobmff_core::timescale::convert_truncating;

/// The default movie timescale (`mvhd`/`mfhd` common reference), used to rescale every track's
/// own timescale into a shared one unless a caller configures another.
pub const DEFAULT_MOVIE_TIMESCALE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// A track under construction while muxing: owns its accumulator and the stream format it was
/// created with. Track ids are assigned by the muxer in input arrival order and never reused.
#[derive(Debug)]
pub struct Track {
    pub id: u32,
    pub format: StreamFormat,
    pub timescale: u32,
    builder: SampleTableBuilder,
    sealed: Option<SealedSampleTable>,
}

impl Track {
    /// Creates a track for a newly observed stream format. `timescale` is normally
    /// `format.timescale()`; callers may override it (e.g. a caller-specified AAC sample rate
    /// mismatch should already have been caught upstream, so this simply trusts its input).
    pub fn new(id: u32, format: StreamFormat) -> Self {
        let timescale = format.timescale();
        Track { id, format, timescale, builder: SampleTableBuilder::new(), sealed: None }
    }

    pub fn kind(&self) -> TrackKind {
        if self.format.is_video() {
            TrackKind::Video
        } else {
            TrackKind::Audio
        }
    }

    pub fn dimensions(&self) -> (u16, u16) {
        self.format.dimensions()
    }

    /// Appends one sample's metadata to this track's accumulator. `dts`/`composition_offset`
    /// are in this track's own timescale.
    pub fn append_sample(
        &mut self,
        size: u32,
        dts: u64,
        is_sync: bool,
        composition_offset: i64,
    ) -> isobmff_core::errors::Result<()> {
        self.builder.append_sample(size, dts, is_sync, composition_offset)
    }

    pub fn flush_chunk(&mut self, chunk_offset: u64) {
        self.builder.flush_chunk(chunk_offset);
    }

    pub fn sample_count(&self) -> u32 {
        self.builder.sample_count()
    }

    /// Seals the accumulator, fixing this track's sample table and duration. Idempotent:
    /// calling it more than once keeps the first result.
    pub fn seal(&mut self) {
        if self.sealed.is_none() {
            let builder = std::mem::take(&mut self.builder);
            self.sealed = Some(builder.seal());
        }
    }

    pub fn sealed_table(&self) -> Option<&SealedSampleTable> {
        self.sealed.as_ref()
    }

    /// Track duration in this track's own timescale. Only meaningful after [`Track::seal`].
    pub fn duration_in_track_ticks(&self) -> u64 {
        self.sealed.as_ref().map_or(0, SealedSampleTable::duration_ticks)
    }

    /// Track duration rescaled to the movie's common timescale, per the truncating conversion
    /// every box-to-box timescale crossing in this toolkit uses.
    pub fn duration_in_movie_ticks(&self, movie_timescale: u32) -> u64 {
        convert_truncating(self.duration_in_track_ticks(), self.timescale, movie_timescale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SampleEntry;
    use isobmff_common::OpusIdHeader;

    fn opus_format() -> StreamFormat {
        StreamFormat {
            sample_entry: SampleEntry::Opus {
                channel_count: 2,
                sample_rate: 48_000,
                header: OpusIdHeader { output_channel_count: 2 },
            },
            framerate: None,
        }
    }

    #[test]
    fn new_track_adopts_format_timescale() {
        let track = Track::new(1, opus_format());
        assert_eq!(track.timescale, 48_000);
        assert_eq!(track.kind(), TrackKind::Audio);
        assert_eq!(track.dimensions(), (0, 0));
    }

    #[test]
    fn seal_computes_duration_and_rescales_to_movie_timescale() {
        let mut track = Track::new(1, opus_format());
        for i in 0..48u64 {
            track.append_sample(120, i * 1000, true, 0).unwrap();
        }
        track.seal();
        // 48 samples * 1000 ticks @ 48kHz == 1 second.
        assert_eq!(track.duration_in_track_ticks(), 48_000);
        assert_eq!(track.duration_in_movie_ticks(DEFAULT_MOVIE_TIMESCALE), 1000);
    }

    #[test]
    fn seal_is_idempotent() {
        let mut track = Track::new(1, opus_format());
        track.append_sample(10, 0, true, 0).unwrap();
        track.seal();
        let first = track.duration_in_track_ticks();
        track.seal();
        assert_eq!(track.duration_in_track_ticks(), first);
    }
}
