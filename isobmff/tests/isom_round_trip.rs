// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end classic ISOM mux/demux round trips across two interleaved inputs, and
//! `fast_start` output equivalence.

use isobmff::{Engine, Framerate, IsomMuxer, IsomMuxerOptions, SampleEntry, StreamFormat};
use isobmff_common::{AvcDecoderConfigurationRecord, OpusIdHeader};

fn video_format() -> StreamFormat {
    StreamFormat {
        sample_entry: SampleEntry::Avc {
            width: 1280,
            height: 720,
            config: AvcDecoderConfigurationRecord {
                profile_indication: 0x64,
                profile_compatibility: 0,
                level_indication: 0x1f,
                sequence_parameter_sets: vec![vec![0x67, 0x64, 0x00, 0x1f]],
                picture_parameter_sets: vec![vec![0x68, 0xeb]],
            },
        },
        framerate: Some(Framerate { num: 30, den: 1 }),
    }
}

fn audio_format() -> StreamFormat {
    StreamFormat {
        sample_entry: SampleEntry::Opus {
            channel_count: 2,
            sample_rate: 48_000,
            header: OpusIdHeader { output_channel_count: 2 },
        },
        framerate: None,
    }
}

fn provider_over(bytes: Vec<u8>) -> impl FnMut(u64, usize) -> isobmff::Result<Vec<u8>> {
    move |offset: u64, len: usize| {
        let offset = offset as usize;
        if offset >= bytes.len() {
            return Ok(Vec::new());
        }
        let end = (offset + len).min(bytes.len());
        Ok(bytes[offset..end].to_vec())
    }
}

/// Interleaves 30 fps video (one sample every 1024 ticks at a 30*1024 timescale) with 48 kHz
/// Opus audio (960 ticks/frame), 60 video frames and 100 audio frames, a keyframe every 30
/// frames, and returns the finalized byte stream.
fn mux_two_tracks(fast_start: bool) -> Vec<u8> {
    let mut mux = IsomMuxer::new(
        2,
        IsomMuxerOptions { chunk_duration_secs: 1.0, fast_start },
    )
    .unwrap();

    mux.set_stream_format(0, video_format()).unwrap();
    mux.set_stream_format(1, audio_format()).unwrap();

    for i in 0..60u64 {
        let is_sync = i % 30 == 0;
        mux.push_sample(0, &vec![0xAA; 200], i * 1024, is_sync, 0).unwrap();
    }
    for i in 0..100u64 {
        mux.push_sample(1, &vec![0xBB; 40], i * 960, true, 0).unwrap();
    }

    mux.end_stream(0).unwrap();
    mux.end_stream(1).unwrap();
    mux.finalize().unwrap()
}

#[test]
fn two_interleaved_inputs_round_trip_through_the_engine() {
    let bytes = mux_two_tracks(false);
    let mut engine = Engine::open(provider_over(bytes)).unwrap();

    let tracks = engine.tracks();
    assert_eq!(tracks.len(), 2);

    let video_id = tracks.iter().find(|(_, d)| d.is_video()).unwrap().0;
    let audio_id = tracks.iter().find(|(_, d)| !d.is_video()).unwrap().0;
    let (video_id, audio_id) = (*video_id, *audio_id);

    let mut video_samples = Vec::new();
    while let Some(sample) = engine.read_sample(video_id).unwrap() {
        video_samples.push(sample);
    }
    assert_eq!(video_samples.len(), 60);
    assert!(video_samples.iter().all(|s| s.data == vec![0xAA; 200]));
    assert_eq!(video_samples.iter().filter(|s| s.is_sync).count(), 2);
    for w in video_samples.windows(2) {
        assert!(w[0].dts_ms <= w[1].dts_ms);
    }

    let mut audio_samples = Vec::new();
    while let Some(sample) = engine.read_sample(audio_id).unwrap() {
        audio_samples.push(sample);
    }
    assert_eq!(audio_samples.len(), 100);
    assert!(audio_samples.iter().all(|s| s.is_sync));
}

#[test]
fn fast_start_and_default_layout_demux_to_identical_samples() {
    let normal = mux_two_tracks(false);
    let fast = mux_two_tracks(true);
    // Same moov content either way (stco entries are a fixed 4 bytes regardless of value), just
    // reordered relative to mdat.
    assert_eq!(fast.len(), normal.len());

    let mut engine_a = Engine::open(provider_over(normal)).unwrap();
    let mut engine_b = Engine::open(provider_over(fast)).unwrap();

    let ids_a: Vec<u32> = {
        let mut v: Vec<u32> = engine_a.tracks().keys().copied().collect();
        v.sort();
        v
    };
    let ids_b: Vec<u32> = {
        let mut v: Vec<u32> = engine_b.tracks().keys().copied().collect();
        v.sort();
        v
    };
    assert_eq!(ids_a, ids_b);

    for id in ids_a {
        loop {
            let a = engine_a.read_sample(id).unwrap();
            let b = engine_b.read_sample(id).unwrap();
            match (a, b) {
                (Some(a), Some(b)) => {
                    assert_eq!(a.data, b.data);
                    assert_eq!(a.dts_ms, b.dts_ms);
                    assert_eq!(a.pts_ms, b.pts_ms);
                    assert_eq!(a.is_sync, b.is_sync);
                }
                (None, None) => break,
                _ => panic!("track {} produced a different sample count between layouts", id),
            }
        }
    }
}

#[test]
fn seek_lands_on_or_after_the_requested_time() {
    let bytes = mux_two_tracks(false);
    let mut engine = Engine::open(provider_over(bytes)).unwrap();
    let video_id = *engine.tracks().iter().find(|(_, d)| d.is_video()).unwrap().0;

    // 30 fps, 1024 ticks/frame at a 30*1024 timescale: frame i lands at i/30 seconds.
    engine.seek(video_id, 500).unwrap();
    let sample = engine.read_sample(video_id).unwrap().unwrap();
    assert!(sample.dts_ms >= 500);
}
