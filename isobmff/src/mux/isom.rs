// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The classic (non-fragmented) ISOM muxer: assembles `ftyp || mdat || moov`, or with
//! `fast_start` enabled, `ftyp || moov || mdat`.

use super::{build_trak, MuxerState};
use crate::atoms::ftyp::FtypAtom;
use crate::atoms::moov::MoovAtom;
use crate::atoms::mvhd::MvhdAtom;
use crate::atoms::stbl::StblAtom;
use crate::atoms::write_box;
use crate::codec::StreamFormat;
use crate::track::{Track, DEFAULT_MOVIE_TIMESCALE};
use isobmff_core::errors::{protocol_error, Result};
use log::{debug, trace, warn};
use std::collections::HashMap;

/// A fast_start rewrite that hasn't converged after this many passes indicates a bug in the
/// box layout (fixed-width `stco`/`co64` entries should never change `moov`'s size between
/// passes), not a slow-converging fixed point worth waiting out further.
const MAX_FAST_START_PASSES: u32 = 8;

#[derive(Debug, Clone, Copy)]
pub struct IsomMuxerOptions {
    pub chunk_duration_secs: f64,
    pub fast_start: bool,
}

impl Default for IsomMuxerOptions {
    fn default() -> Self {
        IsomMuxerOptions { chunk_duration_secs: 1.0, fast_start: false }
    }
}

/// Muxes one or more input streams into a single classic ISO-BMFF (`.mp4`) byte stream.
///
/// Inputs are identified by a caller-chosen `usize` id, stable for the lifetime of the muxer.
/// Each input declares its stream format once via [`IsomMuxer::set_stream_format`] before
/// samples can flow through [`IsomMuxer::push_sample`]; [`IsomMuxer::end_stream`] seals a
/// track, and [`IsomMuxer::finalize`] emits the assembled file once every input has ended.
pub struct IsomMuxer {
    options: IsomMuxerOptions,
    expected_tracks: usize,
    tracks: Vec<Track>,
    input_track: HashMap<usize, usize>,
    chunk_buffers: Vec<Vec<u8>>,
    chunk_start_dts: Vec<Option<u64>>,
    sealed: Vec<bool>,
    mdat: Vec<u8>,
    state: MuxerState,
    next_track_id: u32,
    ftyp_bytes: Vec<u8>,
}

impl IsomMuxer {
    pub fn new(expected_tracks: usize, options: IsomMuxerOptions) -> Result<Self> {
        let mut ftyp_bytes = Vec::new();
        FtypAtom::isom_default().write(&mut ftyp_bytes, b"ftyp")?;

        Ok(IsomMuxer {
            options,
            expected_tracks,
            tracks: Vec::with_capacity(expected_tracks),
            input_track: HashMap::with_capacity(expected_tracks),
            chunk_buffers: Vec::with_capacity(expected_tracks),
            chunk_start_dts: Vec::with_capacity(expected_tracks),
            sealed: Vec::with_capacity(expected_tracks),
            mdat: Vec::new(),
            state: MuxerState::WaitingStreamFormats,
            next_track_id: 1,
            ftyp_bytes,
        })
    }

    /// Declares (or redeclares) an input's stream format, allocating a track on first
    /// declaration. Returns the track id. A redeclaration with a different format is only
    /// permitted before that input's first sample; once samples have started, an incompatible
    /// change is a protocol error (classic ISOM does not support variable codec parameters).
    pub fn set_stream_format(&mut self, input: usize, format: StreamFormat) -> Result<u32> {
        if let Some(&idx) = self.input_track.get(&input) {
            if self.tracks[idx].format == format {
                return Ok(self.tracks[idx].id);
            }
            if self.tracks[idx].sample_count() > 0 {
                return protocol_error(format!(
                    "input {} changed stream format after samples were already accumulated",
                    input
                ));
            }
            let id = self.tracks[idx].id;
            self.tracks[idx] = Track::new(id, format);
            return Ok(id);
        }

        if self.tracks.len() >= self.expected_tracks {
            return protocol_error(format!(
                "input {} declared a stream format but only {} tracks were expected",
                input, self.expected_tracks
            ));
        }

        let id = self.next_track_id;
        self.next_track_id += 1;

        let idx = self.tracks.len();
        self.tracks.push(Track::new(id, format));
        self.chunk_buffers.push(Vec::new());
        self.chunk_start_dts.push(None);
        self.sealed.push(false);
        self.input_track.insert(input, idx);

        debug!("isom mux: allocated track {} for input {}", id, input);

        if self.tracks.len() == self.expected_tracks {
            self.state = MuxerState::Accumulating;
            debug!("isom mux: all stream formats known, accumulating");
        }

        Ok(id)
    }

    /// Appends one sample to `input`'s track. Flushes the track's chunk buffer once its
    /// accumulated duration since the chunk's first sample reaches `chunk_duration_secs`.
    pub fn push_sample(
        &mut self,
        input: usize,
        payload: &[u8],
        dts: u64,
        is_sync: bool,
        composition_offset: i64,
    ) -> Result<()> {
        if self.state != MuxerState::Accumulating {
            return protocol_error(
                "sample received before every input declared a stream format",
            );
        }

        let idx = *self
            .input_track
            .get(&input)
            .ok_or_else(|| ())
            .or_else(|_| protocol_error(format!("sample for undeclared input {}", input)))?;

        if self.sealed[idx] {
            return protocol_error(format!("sample for input {} after its end of stream", input));
        }

        self.tracks[idx].append_sample(payload.len() as u32, dts, is_sync, composition_offset)?;
        self.chunk_buffers[idx].extend_from_slice(payload);
        let start = *self.chunk_start_dts[idx].get_or_insert(dts);

        let timescale = self.tracks[idx].timescale;
        let threshold = (self.options.chunk_duration_secs * f64::from(timescale)).round() as u64;
        if dts.saturating_sub(start) >= threshold {
            self.flush_chunk(idx);
        }

        Ok(())
    }

    /// Flushes `input`'s final chunk and seals its track. Once every input has ended,
    /// transitions to `Finalizing`.
    pub fn end_stream(&mut self, input: usize) -> Result<()> {
        let idx = *self
            .input_track
            .get(&input)
            .ok_or_else(|| ())
            .or_else(|_| protocol_error(format!("end_stream for undeclared input {}", input)))?;

        self.flush_chunk(idx);
        self.tracks[idx].seal();
        self.sealed[idx] = true;

        if self.state == MuxerState::Accumulating
            && self.sealed.len() == self.expected_tracks
            && self.sealed.iter().all(|&s| s)
        {
            self.state = MuxerState::Finalizing;
            debug!("isom mux: every track sealed, finalizing");
        }

        Ok(())
    }

    fn flush_chunk(&mut self, idx: usize) {
        if self.chunk_buffers[idx].is_empty() {
            return;
        }

        let offset = self.ftyp_bytes.len() as u64 + 8 + self.mdat.len() as u64;
        trace!("isom mux: flushing chunk for track {} at offset {}", self.tracks[idx].id, offset);

        self.mdat.extend_from_slice(&self.chunk_buffers[idx]);
        self.chunk_buffers[idx].clear();
        self.tracks[idx].flush_chunk(offset);
        self.chunk_start_dts[idx] = None;
    }

    /// Assembles and returns the final byte stream. Consumes the muxer: there is nothing left
    /// to do with it afterwards.
    pub fn finalize(mut self) -> Result<Vec<u8>> {
        if self.state != MuxerState::Finalizing {
            return protocol_error(
                "finalize called before every input reached end of stream",
            );
        }

        let mut mdat_bytes = Vec::new();
        write_box(&mut mdat_bytes, b"mdat", &self.mdat)?;

        let stbls: Vec<StblAtom> = self
            .tracks
            .iter()
            .map(|track| {
                let sealed = track
                    .sealed_table()
                    .expect("end_stream seals every track before finalize is reachable");
                sealed.to_stbl(vec![track.format.sample_entry.clone()])
            })
            .collect();

        let mut out = Vec::with_capacity(
            self.ftyp_bytes.len() + mdat_bytes.len() + 4096 * self.tracks.len().max(1),
        );
        out.extend_from_slice(&self.ftyp_bytes);

        if self.options.fast_start {
            let moov_bytes = self.rewrite_fast_start(&stbls)?;
            out.extend_from_slice(&moov_bytes);
            out.extend_from_slice(&mdat_bytes);
        } else {
            out.extend_from_slice(&mdat_bytes);
            let moov_bytes = self.build_moov(&stbls)?;
            out.extend_from_slice(&moov_bytes);
        }

        self.state = MuxerState::Finalized;
        Ok(out)
    }

    /// `moov` depends on its own size through the chunk offsets it carries once `fast_start`
    /// moves it ahead of `mdat`: build once to learn the size, shift every chunk offset
    /// forward by it, rebuild, and repeat until the rebuilt size stops moving.
    fn rewrite_fast_start(&self, stbls: &[StblAtom]) -> Result<Vec<u8>> {
        let mut shift = self.build_moov(stbls)?.len() as u64;

        for pass in 0..MAX_FAST_START_PASSES {
            let shifted: Vec<StblAtom> = stbls
                .iter()
                .map(|stbl| {
                    let mut stbl = stbl.clone();
                    for offset in &mut stbl.chunk_offsets {
                        *offset += shift;
                    }
                    stbl
                })
                .collect();

            let candidate = self.build_moov(&shifted)?;
            if candidate.len() as u64 == shift {
                return Ok(candidate);
            }

            trace!(
                "isom mux: fast_start pass {} moov size moved {} -> {}",
                pass,
                shift,
                candidate.len()
            );
            shift = candidate.len() as u64;
        }

        warn!("isom mux: fast_start offsets did not converge after {} passes", MAX_FAST_START_PASSES);
        protocol_error("fast_start moov rewrite did not converge")
    }

    fn build_moov(&self, stbls: &[StblAtom]) -> Result<Vec<u8>> {
        let duration = self
            .tracks
            .iter()
            .map(|track| track.duration_in_movie_ticks(DEFAULT_MOVIE_TIMESCALE))
            .max()
            .unwrap_or(0);

        let mvhd = MvhdAtom::new(DEFAULT_MOVIE_TIMESCALE, duration, self.next_track_id);
        let trak = self
            .tracks
            .iter()
            .zip(stbls.iter())
            .map(|(track, stbl)| build_trak(track, stbl.clone(), DEFAULT_MOVIE_TIMESCALE))
            .collect();

        let moov = MoovAtom { mvhd, trak, mvex: None };
        let mut out = Vec::new();
        moov.write(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::SampleEntry;
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
    fn single_track_round_trip_emits_ftyp_mdat_moov() {
        let mut mux =
            IsomMuxer::new(1, IsomMuxerOptions { chunk_duration_secs: 1.0, fast_start: false })
                .unwrap();
        let id = mux.set_stream_format(0, opus_format()).unwrap();
        assert_eq!(id, 1);

        for i in 0..10u64 {
            mux.push_sample(0, &[0xAA; 20], i * 960, true, 0).unwrap();
        }
        mux.end_stream(0).unwrap();

        let out = mux.finalize().unwrap();

        let mut it = crate::atoms::AtomIterator::new(&out, "/");
        let (h1, _) = it.next_atom().unwrap().unwrap();
        assert_eq!(&h1.name, b"ftyp");
        let (h2, _) = it.next_atom().unwrap().unwrap();
        assert_eq!(&h2.name, b"mdat");
        let (h3, _) = it.next_atom().unwrap().unwrap();
        assert_eq!(&h3.name, b"moov");
        assert!(it.next_atom().unwrap().is_none());
    }

    #[test]
    fn fast_start_emits_moov_before_mdat() {
        let mut mux =
            IsomMuxer::new(1, IsomMuxerOptions { chunk_duration_secs: 1.0, fast_start: true })
                .unwrap();
        mux.set_stream_format(0, opus_format()).unwrap();
        for i in 0..10u64 {
            mux.push_sample(0, &[0xAA; 20], i * 960, true, 0).unwrap();
        }
        mux.end_stream(0).unwrap();

        let out = mux.finalize().unwrap();

        let mut it = crate::atoms::AtomIterator::new(&out, "/");
        let (h1, _) = it.next_atom().unwrap().unwrap();
        assert_eq!(&h1.name, b"ftyp");
        let (h2, _) = it.next_atom().unwrap().unwrap();
        assert_eq!(&h2.name, b"moov");
        let (h3, _) = it.next_atom().unwrap().unwrap();
        assert_eq!(&h3.name, b"mdat");
    }

    #[test]
    fn rejects_incompatible_format_change_after_samples_started() {
        let mut mux =
            IsomMuxer::new(1, IsomMuxerOptions { chunk_duration_secs: 1.0, fast_start: false })
                .unwrap();
        mux.set_stream_format(0, opus_format()).unwrap();
        mux.push_sample(0, &[0; 10], 0, true, 0).unwrap();

        let other = StreamFormat {
            sample_entry: SampleEntry::Opus {
                channel_count: 1,
                sample_rate: 44_100,
                header: OpusIdHeader { output_channel_count: 1 },
            },
            framerate: None,
        };
        assert!(mux.set_stream_format(0, other).is_err());
    }

    #[test]
    fn rejects_sample_before_all_formats_declared() {
        let mut mux =
            IsomMuxer::new(2, IsomMuxerOptions { chunk_duration_secs: 1.0, fast_start: false })
                .unwrap();
        mux.set_stream_format(0, opus_format()).unwrap();
        assert!(mux.push_sample(0, &[0; 10], 0, true, 0).is_err());
    }
}
