// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The sample table engine: an append-only accumulator used while muxing, and a reconstruction
//! walk used while demuxing, both operating over the same run-compressed shape `stbl` stores on
//! the wire (`stts`/`ctts`/`stsc`/`stsz`/`stco`/`co64`/`stss`).
//!
//! Run-compressed lists are accumulated in forward order rather than reversed-then-flipped: a
//! `Vec::push` is already O(1) amortized, so the reverse-on-seal step the box layout's own
//! accumulation strategy describes is unnecessary here and would just be extra bookkeeping.

use crate::atoms::ctts::{CttsAtom, CttsEntry};
use crate::atoms::stbl::StblAtom;
use crate::atoms::stsc::{StscAtom, StscEntry};
use crate::atoms::stsd::StsdAtom;
use crate::atoms::stss::StssAtom;
use crate::atoms::stsz::StszAtom;
use crate::atoms::stts::{SttsAtom, SttsEntry};
use crate::atoms::SampleEntry;
use isobmff_core::errors::{protocol_error, Result};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DeltaRun {
    sample_count: u32,
    sample_delta: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OffsetRun {
    sample_count: u32,
    sample_offset: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChunkRun {
    first_chunk: u32,
    samples_per_chunk: u32,
}

/// One sample as reconstructed from a parsed `stbl`, or as handed to the accumulator while
/// muxing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconstructedSample {
    /// 1-based sample index within the track.
    pub index: u32,
    pub offset: u64,
    pub size: u32,
    pub dts: u64,
    pub composition_offset: i64,
    pub is_sync: bool,
}

/// Accumulates samples for one track while muxing. The mux element owns one of these per
/// track; it is never shared across tracks.
#[derive(Debug, Default)]
pub struct SampleTableBuilder {
    sizes: Vec<u32>,
    decoding_deltas: Vec<DeltaRun>,
    composition_offsets: Vec<OffsetRun>,
    sync_samples: Vec<u32>,
    samples_per_chunk: Vec<ChunkRun>,
    chunk_offsets: Vec<u64>,
    current_chunk_samples: u32,
    last_dts: Option<u64>,
    sample_count: u32,
}

impl SampleTableBuilder {
    pub fn new() -> Self {
        SampleTableBuilder::default()
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Records one sample's metadata. `composition_offset` is `pts - dts`; pass 0 for tracks
    /// that never reorder (audio, or video without B-frames).
    pub fn append_sample(
        &mut self,
        size: u32,
        dts: u64,
        is_sync: bool,
        composition_offset: i64,
    ) -> Result<()> {
        if let Some(last) = self.last_dts {
            if dts < last {
                return protocol_error(format!(
                    "sample dts {} precedes previous dts {} on the same track",
                    dts, last
                ));
            }
        }

        self.sizes.push(size);
        self.sample_count += 1;

        if let Some(last) = self.last_dts {
            let delta = (dts - last) as u32;
            if self.decoding_deltas.is_empty() {
                // The first sample has no delta of its own; retroactively give it the second
                // sample's delta so the run never opens on zero.
                self.decoding_deltas.push(DeltaRun { sample_count: 2, sample_delta: delta });
            } else if self.decoding_deltas.last().unwrap().sample_delta == delta {
                self.decoding_deltas.last_mut().unwrap().sample_count += 1;
            } else {
                self.decoding_deltas.push(DeltaRun { sample_count: 1, sample_delta: delta });
            }
        }
        self.last_dts = Some(dts);

        let offset = composition_offset as i32;
        match self.composition_offsets.last_mut() {
            Some(run) if run.sample_offset == offset => run.sample_count += 1,
            _ => self.composition_offsets.push(OffsetRun { sample_count: 1, sample_offset: offset }),
        }

        if is_sync {
            self.sync_samples.push(self.sample_count);
        }

        self.current_chunk_samples += 1;

        Ok(())
    }

    /// Called by the mux element once it has written a chunk's bytes to the media-data stream.
    /// `chunk_offset` is the absolute byte offset (within the eventual output file) of the
    /// chunk's first sample, as computed by the caller. A no-op if no samples have accumulated
    /// into the current chunk since the last flush.
    pub fn flush_chunk(&mut self, chunk_offset: u64) {
        if self.current_chunk_samples == 0 {
            return;
        }

        match self.samples_per_chunk.last() {
            Some(run) if run.samples_per_chunk == self.current_chunk_samples => {}
            _ => {
                let first_chunk = self.chunk_offsets.len() as u32 + 1;
                self.samples_per_chunk
                    .push(ChunkRun { first_chunk, samples_per_chunk: self.current_chunk_samples });
            }
        }

        self.chunk_offsets.push(chunk_offset);
        self.current_chunk_samples = 0;
    }

    /// Finalizes the table: omits `ctts` if every sample had a zero composition offset, and
    /// omits `stss` if every sample was a sync sample, matching the on-wire absence
    /// conventions those boxes use.
    pub fn seal(self) -> SealedSampleTable {
        let all_sync = self.sync_samples.len() as u32 == self.sample_count;
        let sync_samples = if all_sync { None } else { Some(self.sync_samples) };

        let all_zero_offset = self.composition_offsets.iter().all(|r| r.sample_offset == 0);
        let composition_offsets = if all_zero_offset { None } else { Some(self.composition_offsets) };

        SealedSampleTable {
            sizes: self.sizes,
            decoding_deltas: self.decoding_deltas,
            composition_offsets,
            sync_samples,
            samples_per_chunk: self.samples_per_chunk,
            chunk_offsets: self.chunk_offsets,
            sample_count: self.sample_count,
        }
    }
}

/// A complete, immutable sample table ready to be written out as an `stbl`, or inspected for
/// track-duration finalization.
#[derive(Debug, Clone)]
pub struct SealedSampleTable {
    sizes: Vec<u32>,
    decoding_deltas: Vec<DeltaRun>,
    composition_offsets: Option<Vec<OffsetRun>>,
    sync_samples: Option<Vec<u32>>,
    samples_per_chunk: Vec<ChunkRun>,
    chunk_offsets: Vec<u64>,
    sample_count: u32,
}

impl SealedSampleTable {
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Track duration in the track's own timescale: `sum(sample_count * sample_delta)` across
    /// `decoding_deltas`.
    pub fn duration_ticks(&self) -> u64 {
        self.decoding_deltas
            .iter()
            .map(|r| u64::from(r.sample_count) * u64::from(r.sample_delta))
            .sum()
    }

    pub fn to_stbl(&self, sample_entries: Vec<SampleEntry>) -> StblAtom {
        let stsd = StsdAtom { entries: sample_entries };

        let stts = SttsAtom {
            entries: self
                .decoding_deltas
                .iter()
                .map(|r| SttsEntry { sample_count: r.sample_count, sample_delta: r.sample_delta })
                .collect(),
        };

        let ctts = self.composition_offsets.as_ref().map(|runs| CttsAtom {
            entries: runs
                .iter()
                .map(|r| CttsEntry { sample_count: r.sample_count, sample_offset: r.sample_offset })
                .collect(),
        });

        let stss = self.sync_samples.as_ref().map(|s| StssAtom { sync_samples: s.clone() });

        let stsc = StscAtom {
            entries: self
                .samples_per_chunk
                .iter()
                .map(|r| StscEntry {
                    first_chunk: r.first_chunk,
                    samples_per_chunk: r.samples_per_chunk,
                    sample_description_index: 1,
                })
                .collect(),
        };

        let stsz = if !self.sizes.is_empty() && self.sizes.iter().all(|&s| s == self.sizes[0]) {
            StszAtom::Uniform { size: self.sizes[0], sample_count: self.sizes.len() as u32 }
        } else {
            StszAtom::PerSample { sizes: self.sizes.clone() }
        };

        StblAtom { stsd, stts, ctts, stss, stsc, stsz, chunk_offsets: self.chunk_offsets.clone() }
    }
}

fn expand_decoding_deltas(entries: &[SttsEntry], total: usize) -> Vec<u64> {
    let mut dts = Vec::with_capacity(total);
    let mut current = 0u64;
    for entry in entries {
        for _ in 0..entry.sample_count {
            dts.push(current);
            current += u64::from(entry.sample_delta);
        }
    }
    dts
}

fn expand_composition_offsets(entries: &[CttsEntry], total: usize) -> Vec<i64> {
    let mut offsets = Vec::with_capacity(total);
    for entry in entries {
        for _ in 0..entry.sample_count {
            offsets.push(i64::from(entry.sample_offset));
        }
    }
    offsets
}

fn expand_samples_per_chunk(entries: &[StscEntry], chunk_count: usize) -> Vec<u32> {
    let mut result = Vec::with_capacity(chunk_count);
    for (i, entry) in entries.iter().enumerate() {
        let end_chunk =
            if i + 1 < entries.len() { entries[i + 1].first_chunk } else { chunk_count as u32 + 1 };
        for _ in entry.first_chunk..end_chunk {
            result.push(entry.samples_per_chunk);
        }
    }
    result
}

/// Reconstructs the per-sample view (absolute offset, size, dts, composition offset, sync
/// flag) of a parsed `stbl`, as the demux path needs to read each sample's bytes and recover
/// its timing.
pub fn reconstruct(stbl: &StblAtom) -> Result<Vec<ReconstructedSample>> {
    let total_samples = stbl.stsz.sample_count() as usize;

    let sizes: Vec<u32> = match &stbl.stsz {
        StszAtom::Uniform { size, sample_count } => vec![*size; *sample_count as usize],
        StszAtom::PerSample { sizes } => sizes.clone(),
    };

    let dts = expand_decoding_deltas(&stbl.stts.entries, total_samples);
    if dts.len() != sizes.len() {
        return protocol_error(format!(
            "stts covers {} samples but stsz covers {}",
            dts.len(),
            sizes.len()
        ));
    }

    let composition_offsets = match &stbl.ctts {
        Some(ctts) => expand_composition_offsets(&ctts.entries, total_samples),
        None => vec![0i64; total_samples],
    };

    let sync_set: Option<HashSet<u32>> =
        stbl.stss.as_ref().map(|s| s.sync_samples.iter().copied().collect());

    let samples_per_chunk = expand_samples_per_chunk(&stbl.stsc.entries, stbl.chunk_offsets.len());
    let covered: usize = samples_per_chunk.iter().map(|&n| n as usize).sum();
    if covered != total_samples {
        return protocol_error(format!(
            "stsc covers {} samples but stsz covers {}",
            covered, total_samples
        ));
    }

    let mut samples = Vec::with_capacity(total_samples);
    let mut sample_index = 0usize;
    for (chunk_index, &chunk_sample_count) in samples_per_chunk.iter().enumerate() {
        let mut offset = stbl.chunk_offsets[chunk_index];
        for _ in 0..chunk_sample_count {
            let size = sizes[sample_index];
            let one_based = sample_index as u32 + 1;
            let is_sync = sync_set.as_ref().map_or(true, |set| set.contains(&one_based));

            samples.push(ReconstructedSample {
                index: one_based,
                offset,
                size,
                dts: dts[sample_index],
                composition_offset: composition_offsets[sample_index],
                is_sync,
            });

            offset += u64::from(size);
            sample_index += 1;
        }
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use isobmff_common::OpusIdHeader;

    fn opus_entry() -> SampleEntry {
        SampleEntry::Opus {
            channel_count: 2,
            sample_rate: 48_000,
            header: OpusIdHeader { output_channel_count: 2 },
        }
    }

    #[test]
    fn retroactive_first_delta_matches_second_sample() {
        let mut builder = SampleTableBuilder::new();
        builder.append_sample(100, 0, true, 0).unwrap();
        builder.append_sample(110, 960, true, 0).unwrap();
        builder.append_sample(90, 1920, true, 0).unwrap();
        let sealed = builder.seal();
        assert_eq!(sealed.duration_ticks(), 960 * 3);

        let stbl = sealed.to_stbl(vec![opus_entry()]);
        assert_eq!(stbl.stts.entries, vec![SttsEntry { sample_count: 3, sample_delta: 960 }]);
    }

    #[test]
    fn omits_stss_when_all_sync_and_ctts_when_all_zero() {
        let mut builder = SampleTableBuilder::new();
        for i in 0..5u64 {
            builder.append_sample(50, i * 1024, true, 0).unwrap();
        }
        let sealed = builder.seal();
        let stbl = sealed.to_stbl(vec![opus_entry()]);
        assert!(stbl.stss.is_none());
        assert!(stbl.ctts.is_none());
    }

    #[test]
    fn rejects_non_monotonic_dts() {
        let mut builder = SampleTableBuilder::new();
        builder.append_sample(100, 10, true, 0).unwrap();
        assert!(builder.append_sample(100, 5, true, 0).is_err());
    }

    #[test]
    fn flush_chunk_extends_matching_run() {
        let mut builder = SampleTableBuilder::new();
        for i in 0..4u64 {
            builder.append_sample(10, i * 100, true, 0).unwrap();
            if i == 1 {
                builder.flush_chunk(8);
            }
        }
        builder.flush_chunk(28);
        let sealed = builder.seal();
        let stbl = sealed.to_stbl(vec![opus_entry()]);
        assert_eq!(
            stbl.stsc.entries,
            vec![StscEntry { first_chunk: 1, samples_per_chunk: 2, sample_description_index: 1 }]
        );
        assert_eq!(stbl.chunk_offsets, vec![8, 28]);
    }

    #[test]
    fn accumulate_then_reconstruct_round_trips() {
        let mut builder = SampleTableBuilder::new();
        let keyframe_every = 3;
        for i in 0..9u64 {
            let is_sync = i % keyframe_every == 0;
            builder.append_sample(1000 + i as u32, i * 1024, is_sync, (i as i64 % 2) * 512).unwrap();
            if (i + 1) % keyframe_every == 0 {
                builder.flush_chunk(64 + i * 4096);
            }
        }
        let sealed = builder.seal();
        let total = sealed.sample_count();
        let stbl = sealed.to_stbl(vec![opus_entry()]);

        let samples = reconstruct(&stbl).unwrap();
        assert_eq!(samples.len(), total as usize);
        assert_eq!(samples[0].dts, 0);
        assert_eq!(samples[1].dts, 1024);
        assert!(samples[0].is_sync);
        assert!(!samples[1].is_sync);
        assert_eq!(samples[1].composition_offset, 512);
    }
}
