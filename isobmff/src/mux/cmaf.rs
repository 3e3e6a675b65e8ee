// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The CMAF (fragmented MP4) muxer: an initialization header (`ftyp || moov`, `moov` carrying
//! `mvex`/empty sample tables) followed by a stream of segments, each `styp || sidx || moof ||
//! mdat`.
//!
//! Segment boundaries are decided by a designated leader track (the first video track, or
//! track 0 if there is none): once the leader's next sample crosses the target duration at a
//! key frame (or crosses the end-of-window bound regardless), every track's currently
//! accumulated target group is committed as one segment and whatever each track had already
//! collected past its own threshold carries over as the next segment's seed. This assumes
//! a caller interleaves samples across tracks in roughly increasing dts order, which is how
//! every realistic encoder pipeline feeds a muxer; true per-track independent scheduling
//! would need buffering well beyond a single segment and isn't implemented here.

use super::{build_trak, MuxerState};
use crate::atoms::ftyp::FtypAtom;
use crate::atoms::mfhd::MfhdAtom;
use crate::atoms::moof::MoofAtom;
use crate::atoms::moov::MoovAtom;
use crate::atoms::mvex::MvexAtom;
use crate::atoms::mvhd::MvhdAtom;
use crate::atoms::sidx::{SidxAtom, SidxReference};
use crate::atoms::tfdt::TfdtAtom;
use crate::atoms::tfhd::TfhdAtom;
use crate::atoms::traf::TrafAtom;
use crate::atoms::trex::TrexAtom;
use crate::atoms::trun::{TrunAtom, TrunSample};
use crate::atoms::write_box;
use crate::codec::StreamFormat;
use crate::track::{Track, TrackKind, DEFAULT_MOVIE_TIMESCALE};
use isobmff_core::errors::{protocol_error, Result};
use log::{debug, trace};
use std::collections::HashMap;

/// `sample_depends_on = 2` (does not depend on others), `sample_is_non_sync_sample = 0`.
const SYNC_SAMPLE_FLAGS: u32 = 0x0200_0000;
/// `sample_depends_on = 1`, `sample_is_non_sync_sample = 1`.
const NON_SYNC_SAMPLE_FLAGS: u32 = 0x0101_0000;

#[derive(Debug, Clone, Copy)]
pub struct CmafMuxerOptions {
    pub segment_min_duration_secs: f64,
    pub target_segment_duration_secs: f64,
}

impl Default for CmafMuxerOptions {
    fn default() -> Self {
        CmafMuxerOptions { segment_min_duration_secs: 2.0, target_segment_duration_secs: 6.0 }
    }
}

#[derive(Debug, Clone)]
struct PendingSample {
    payload: Vec<u8>,
    dts: u64,
    is_sync: bool,
    composition_offset: i64,
}

#[derive(Debug, Default)]
struct TrackSegmenter {
    segment_start_dts: Option<u64>,
    target: Vec<PendingSample>,
    excess: Vec<PendingSample>,
}

pub struct CmafMuxer {
    options: CmafMuxerOptions,
    expected_tracks: usize,
    tracks: Vec<Track>,
    input_track: HashMap<usize, usize>,
    segments: Vec<TrackSegmenter>,
    cumulative_ticks: Vec<u64>,
    sealed: Vec<bool>,
    sequence_number: u32,
    next_track_id: u32,
    state: MuxerState,
}

impl CmafMuxer {
    pub fn new(expected_tracks: usize, options: CmafMuxerOptions) -> Self {
        CmafMuxer {
            options,
            expected_tracks,
            tracks: Vec::with_capacity(expected_tracks),
            input_track: HashMap::with_capacity(expected_tracks),
            segments: Vec::with_capacity(expected_tracks),
            cumulative_ticks: Vec::with_capacity(expected_tracks),
            sealed: Vec::with_capacity(expected_tracks),
            sequence_number: 0,
            next_track_id: 1,
            state: MuxerState::WaitingStreamFormats,
        }
    }

    pub fn set_stream_format(&mut self, input: usize, format: StreamFormat) -> Result<u32> {
        if let Some(&idx) = self.input_track.get(&input) {
            if self.tracks[idx].format == format {
                return Ok(self.tracks[idx].id);
            }
            return protocol_error(format!(
                "input {} redeclared its stream format after segmenting began",
                input
            ));
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
        self.segments.push(TrackSegmenter::default());
        self.cumulative_ticks.push(0);
        self.sealed.push(false);
        self.input_track.insert(input, idx);

        debug!("cmaf mux: allocated track {} for input {}", id, input);

        if self.tracks.len() == self.expected_tracks {
            self.state = MuxerState::Accumulating;
            debug!("cmaf mux: all stream formats known, accumulating");
        }

        Ok(id)
    }

    fn leader_idx(&self) -> usize {
        self.tracks.iter().position(|t| t.kind() == TrackKind::Video).unwrap_or(0)
    }

    /// Builds the `ftyp || moov` initialization header. `moov` carries `mvex`/`trex` and an
    /// empty sample table per track; only valid once every input has declared its format.
    pub fn init_segment(&self) -> Result<Vec<u8>> {
        if self.state == MuxerState::WaitingStreamFormats {
            return protocol_error("init_segment requested before every input declared a format");
        }

        let mut ftyp_bytes = Vec::new();
        FtypAtom::cmaf_default().write(&mut ftyp_bytes, b"ftyp")?;

        let mvhd = MvhdAtom::new(DEFAULT_MOVIE_TIMESCALE, 0, self.next_track_id);
        let trak = self
            .tracks
            .iter()
            .map(|track| {
                let empty_stbl =
                    track.sealed_table().cloned().unwrap_or_else(|| {
                        crate::sample_table::SampleTableBuilder::new().seal()
                    });
                build_trak(
                    track,
                    empty_stbl.to_stbl(vec![track.format.sample_entry.clone()]),
                    DEFAULT_MOVIE_TIMESCALE,
                )
            })
            .collect();

        let trex = self
            .tracks
            .iter()
            .map(|track| TrexAtom {
                track_id: track.id,
                default_sample_description_index: 1,
                default_sample_duration: 0,
                default_sample_size: 0,
                default_sample_flags: NON_SYNC_SAMPLE_FLAGS,
            })
            .collect();

        let moov = MoovAtom { mvhd, trak, mvex: Some(MvexAtom { trex }) };
        let mut moov_bytes = Vec::new();
        moov.write(&mut moov_bytes)?;

        let mut out = Vec::with_capacity(ftyp_bytes.len() + moov_bytes.len());
        out.extend_from_slice(&ftyp_bytes);
        out.extend_from_slice(&moov_bytes);
        Ok(out)
    }

    /// Appends one sample to `input`'s track. Returns a complete segment (`styp || sidx ||
    /// moof || mdat`) once the leader track's sample crosses this segmenter's collection
    /// threshold.
    pub fn push_sample(
        &mut self,
        input: usize,
        payload: &[u8],
        dts: u64,
        is_sync: bool,
        composition_offset: i64,
    ) -> Result<Option<Vec<u8>>> {
        if self.state != MuxerState::Accumulating {
            return protocol_error("sample received before every input declared a stream format");
        }

        let idx = *self
            .input_track
            .get(&input)
            .ok_or_else(|| ())
            .or_else(|_| protocol_error(format!("sample for undeclared input {}", input)))?;

        if self.sealed[idx] {
            return protocol_error(format!("sample for input {} after its end of stream", input));
        }

        let kind = self.tracks[idx].kind();
        let timescale = self.tracks[idx].timescale;
        let min_ticks = (self.options.segment_min_duration_secs * f64::from(timescale)) as u64;
        let mid_ticks = (self.options.target_segment_duration_secs * f64::from(timescale)) as u64;
        let end_ticks = mid_ticks + min_ticks;

        let seg = &mut self.segments[idx];
        let start = *seg.segment_start_dts.get_or_insert(dts);
        let elapsed = dts.saturating_sub(start);

        let eligible = match kind {
            TrackKind::Video => (elapsed >= mid_ticks && is_sync) || elapsed >= end_ticks,
            TrackKind::Audio => elapsed >= mid_ticks,
        };

        let sample = PendingSample { payload: payload.to_vec(), dts, is_sync, composition_offset };
        if eligible {
            seg.excess.push(sample);
        } else {
            seg.target.push(sample);
        }

        if eligible && idx == self.leader_idx() {
            return self.collect_segment().map(Some);
        }

        Ok(None)
    }

    /// Forces an early collection of whatever every track has accumulated so far, regardless
    /// of threshold state. Used for an explicit "finalize current segment" request.
    pub fn force_boundary(&mut self) -> Result<Vec<u8>> {
        if self.state != MuxerState::Accumulating {
            return protocol_error("force_boundary requested outside the accumulating state");
        }
        self.collect_segment()
    }

    /// Marks `input` ended. Once every input has ended, the caller must call [`Self::finish`]
    /// to drain the final segment.
    pub fn end_stream(&mut self, input: usize) -> Result<()> {
        let idx = *self
            .input_track
            .get(&input)
            .ok_or_else(|| ())
            .or_else(|_| protocol_error(format!("end_stream for undeclared input {}", input)))?;
        self.sealed[idx] = true;

        if self.state == MuxerState::Accumulating && self.sealed.iter().all(|&s| s) {
            self.state = MuxerState::Finalizing;
            debug!("cmaf mux: every track ended, ready to drain final segment");
        }
        Ok(())
    }

    /// Drains the final segment, folding each track's remaining target and excess samples
    /// together. Returns `None` if nothing was left to emit.
    pub fn finish(mut self) -> Result<Option<Vec<u8>>> {
        if self.state != MuxerState::Finalizing {
            return protocol_error("finish called before every input reached end of stream");
        }

        for seg in &mut self.segments {
            seg.target.append(&mut seg.excess);
        }

        let any_samples = self.segments.iter().any(|s| !s.target.is_empty());
        let result = if any_samples { Some(self.collect_segment()?) } else { None };
        self.state = MuxerState::Finalized;
        Ok(result)
    }

    fn collect_segment(&mut self) -> Result<Vec<u8>> {
        self.sequence_number += 1;

        let mut per_track_samples: Vec<Vec<TrunSample>> = Vec::with_capacity(self.tracks.len());
        let mut per_track_payloads: Vec<Vec<u8>> = Vec::with_capacity(self.tracks.len());
        let mut per_track_duration_ticks: Vec<u64> = Vec::with_capacity(self.tracks.len());
        let mut base_media_decode_times: Vec<u64> = Vec::with_capacity(self.tracks.len());

        for idx in 0..self.tracks.len() {
            let committed = std::mem::take(&mut self.segments[idx].target);
            let next_dts_hint = self.segments[idx].excess.first().map(|s| s.dts);
            let include_offsets = self.tracks[idx].kind() == TrackKind::Video;

            let mut payload = Vec::new();
            let mut samples = Vec::with_capacity(committed.len());
            for (i, sample) in committed.iter().enumerate() {
                let next_dts = committed.get(i + 1).map(|n| n.dts).or(next_dts_hint);
                let duration = match next_dts {
                    Some(next) => (next - sample.dts) as u32,
                    None if i > 0 => (sample.dts - committed[i - 1].dts) as u32,
                    None => 0,
                };
                let flags = if sample.is_sync { SYNC_SAMPLE_FLAGS } else { NON_SYNC_SAMPLE_FLAGS };

                samples.push(TrunSample {
                    duration: Some(duration),
                    size: Some(sample.payload.len() as u32),
                    flags: Some(flags),
                    composition_time_offset: if include_offsets {
                        Some(sample.composition_offset)
                    } else {
                        None
                    },
                });
                payload.extend_from_slice(&sample.payload);
            }

            let duration_ticks: u64 =
                samples.iter().map(|s| u64::from(s.duration.unwrap_or(0))).sum();

            base_media_decode_times.push(self.cumulative_ticks[idx]);
            self.cumulative_ticks[idx] += duration_ticks;
            per_track_duration_ticks.push(duration_ticks);
            per_track_samples.push(samples);
            per_track_payloads.push(payload);

            self.segments[idx].target = std::mem::take(&mut self.segments[idx].excess);
            self.segments[idx].segment_start_dts =
                self.segments[idx].target.first().map(|s| s.dts);
        }

        let mdat_offsets: Vec<u64> = {
            let mut cumulative = 0u64;
            per_track_payloads
                .iter()
                .map(|p| {
                    let offset = cumulative;
                    cumulative += p.len() as u64;
                    offset
                })
                .collect()
        };

        let zero_offsets = vec![0i32; self.tracks.len()];
        let mut moof_bytes = Vec::new();
        assemble_moof(
            self.sequence_number,
            &self.tracks,
            &base_media_decode_times,
            &per_track_samples,
            &zero_offsets,
        )
        .write(&mut moof_bytes)?;
        let moof_len = moof_bytes.len() as u64;

        let data_offsets: Vec<i32> =
            mdat_offsets.iter().map(|&o| (moof_len + 8 + o) as i32).collect();
        let mut moof_bytes = Vec::new();
        assemble_moof(
            self.sequence_number,
            &self.tracks,
            &base_media_decode_times,
            &per_track_samples,
            &data_offsets,
        )
        .write(&mut moof_bytes)?;

        let mut mdat_content = Vec::new();
        for payload in &per_track_payloads {
            mdat_content.extend_from_slice(payload);
        }
        let mut mdat_bytes = Vec::new();
        write_box(&mut mdat_bytes, b"mdat", &mdat_content)?;

        let leader = self.leader_idx();

        let mut styp_bytes = Vec::new();
        FtypAtom::cmaf_default().write(&mut styp_bytes, b"styp")?;

        let sidx = SidxAtom {
            reference_id: self.tracks[leader].id,
            timescale: self.tracks[leader].timescale,
            earliest_presentation_time: base_media_decode_times[leader],
            first_offset: 0,
            references: vec![SidxReference {
                reference_to_sidx: false,
                referenced_size: (moof_bytes.len() + mdat_bytes.len()) as u32,
                subsegment_duration: per_track_duration_ticks[leader] as u32,
                starts_with_sap: true,
                sap_type: 1,
                sap_delta_time: 0,
            }],
        };
        let mut sidx_bytes = Vec::new();
        sidx.write(&mut sidx_bytes)?;

        trace!(
            "cmaf mux: segment {} ({} bytes) leader duration {} ticks",
            self.sequence_number,
            styp_bytes.len() + sidx_bytes.len() + moof_bytes.len() + mdat_bytes.len(),
            per_track_duration_ticks[leader]
        );

        let mut out = Vec::with_capacity(
            styp_bytes.len() + sidx_bytes.len() + moof_bytes.len() + mdat_bytes.len(),
        );
        out.extend_from_slice(&styp_bytes);
        out.extend_from_slice(&sidx_bytes);
        out.extend_from_slice(&moof_bytes);
        out.extend_from_slice(&mdat_bytes);
        Ok(out)
    }
}

fn assemble_moof(
    sequence_number: u32,
    tracks: &[Track],
    base_media_decode_times: &[u64],
    samples: &[Vec<TrunSample>],
    data_offsets: &[i32],
) -> MoofAtom {
    let traf = tracks
        .iter()
        .enumerate()
        .map(|(idx, track)| TrafAtom {
            tfhd: TfhdAtom { track_id: track.id, default_base_is_moof: true, ..TfhdAtom::default() },
            tfdt: TfdtAtom { base_media_decode_time: base_media_decode_times[idx] },
            trun: vec![TrunAtom {
                data_offset: Some(data_offsets[idx]),
                first_sample_flags: None,
                samples: samples[idx].clone(),
            }],
        })
        .collect();
    MoofAtom { mfhd: MfhdAtom { sequence_number }, traf }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::SampleEntry;
    use isobmff_common::{AvcDecoderConfigurationRecord, OpusIdHeader};

    fn avc_format() -> StreamFormat {
        StreamFormat {
            sample_entry: SampleEntry::Avc {
                width: 1280,
                height: 720,
                config: AvcDecoderConfigurationRecord {
                    profile_indication: 0x64,
                    profile_compatibility: 0,
                    level_indication: 0x1f,
                    sequence_parameter_sets: vec![],
                    picture_parameter_sets: vec![],
                },
            },
            framerate: Some(crate::codec::Framerate { num: 30, den: 1 }),
        }
    }

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
    fn init_segment_emits_ftyp_then_moov_with_mvex() {
        let mut mux = CmafMuxer::new(1, CmafMuxerOptions::default());
        mux.set_stream_format(0, opus_format()).unwrap();

        let out = mux.init_segment().unwrap();
        let mut it = crate::atoms::AtomIterator::new(&out, "/");
        let (h1, _) = it.next_atom().unwrap().unwrap();
        assert_eq!(&h1.name, b"ftyp");
        let (h2, mut moov_content) = it.next_atom().unwrap().unwrap();
        assert_eq!(&h2.name, b"moov");

        let moov = MoovAtom::read(&mut moov_content).unwrap();
        assert!(moov.mvex.is_some());
        assert_eq!(moov.trak.len(), 1);
    }

    #[test]
    fn single_video_segment_emits_styp_sidx_moof_mdat_in_order() {
        let mut mux = CmafMuxer::new(
            1,
            CmafMuxerOptions { segment_min_duration_secs: 0.5, target_segment_duration_secs: 1.0 },
        );
        mux.set_stream_format(0, avc_format()).unwrap();

        let ticks_per_frame = 30 * 1024 / 30;
        let mut segment = None;
        for i in 0..60u64 {
            let is_sync = i == 0;
            let result = mux
                .push_sample(0, &[0xAA; 16], i * ticks_per_frame, is_sync, 0)
                .unwrap();
            if result.is_some() {
                segment = result;
                break;
            }
        }

        let segment = segment.expect("segment should have been collected");
        let mut it = crate::atoms::AtomIterator::new(&segment, "/");
        let (h1, _) = it.next_atom().unwrap().unwrap();
        assert_eq!(&h1.name, b"styp");
        let (h2, _) = it.next_atom().unwrap().unwrap();
        assert_eq!(&h2.name, b"sidx");
        let (h3, _) = it.next_atom().unwrap().unwrap();
        assert_eq!(&h3.name, b"moof");
        let (h4, _) = it.next_atom().unwrap().unwrap();
        assert_eq!(&h4.name, b"mdat");
    }

    #[test]
    fn end_stream_then_finish_drains_remaining_samples() {
        let mut mux = CmafMuxer::new(1, CmafMuxerOptions::default());
        mux.set_stream_format(0, opus_format()).unwrap();
        for i in 0..5u64 {
            assert!(mux.push_sample(0, &[0; 4], i * 960, true, 0).unwrap().is_none());
        }
        mux.end_stream(0).unwrap();
        let out = mux.finish().unwrap();
        assert!(out.is_some());
    }

    #[test]
    fn rejects_additional_input_beyond_expected_track_count() {
        let mut mux = CmafMuxer::new(1, CmafMuxerOptions::default());
        mux.set_stream_format(0, opus_format()).unwrap();
        assert!(mux.set_stream_format(1, avc_format()).is_err());
    }
}
