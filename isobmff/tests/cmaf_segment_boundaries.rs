// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CMAF segment boundary behavior: `segment_min_duration_secs`/`target_segment_duration_secs`
//! with a keyframe every 60 frames, and a streaming round trip through [`CmafDemuxer`].

use isobmff::{CmafEvent, CmafMuxer, CmafMuxerOptions, Framerate, SampleEntry, StreamFormat};
use isobmff_common::AvcDecoderConfigurationRecord;

fn video_format() -> StreamFormat {
    StreamFormat {
        sample_entry: SampleEntry::Avc {
            width: 960,
            height: 540,
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

/// 30 fps H.264, a keyframe every 60 frames (every 2 seconds), 8 keyframe intervals (16
/// seconds) worth of frames.
#[test]
fn keyframe_every_60_frames_respects_min_and_target_duration() {
    let options =
        CmafMuxerOptions { segment_min_duration_secs: 4.0, target_segment_duration_secs: 12.0 };
    let mut mux = CmafMuxer::new(1, options);
    mux.set_stream_format(0, video_format()).unwrap();

    let ticks_per_frame = 30 * 1024 / 30; // StreamFormat::timescale() for 30fps AVC is 30*1024
    let total_frames = 60 * 8;

    let mut segments: Vec<Vec<u8>> = Vec::new();
    for i in 0..total_frames as u64 {
        let is_sync = i % 60 == 0;
        if let Some(segment) =
            mux.push_sample(0, &vec![0xCC; 100], i * ticks_per_frame, is_sync, 0).unwrap()
        {
            segments.push(segment);
        }
    }
    if let Some(tail) = mux.finish().unwrap() {
        segments.push(tail);
    }

    assert!(!segments.is_empty());

    // Every segment must begin on a keyframe and stay within the target duration.
    for segment in &segments {
        let mut r = std::io::Cursor::new(segment.clone());
        let mut demux = isobmff::CmafDemuxer::new(&mut r);

        loop {
            match demux.next_event() {
                Ok(Some(CmafEvent::Fragment(samples))) => {
                    assert!(!samples.is_empty());
                    assert!(samples[0].is_sync, "segment must start on a sync sample");
                    let span_ticks =
                        samples.last().unwrap().dts_ms as i64 - samples[0].dts_ms as i64;
                    let span_secs = span_ticks as f64 / 1000.0;
                    assert!(
                        span_secs <= 12.5,
                        "segment spans {} seconds, past the 12s target",
                        span_secs
                    );
                }
                Ok(Some(CmafEvent::Init(_))) => continue,
                Ok(None) => break,
                Err(e) => panic!("demux error: {}", e),
            }
        }
    }
}

#[test]
fn init_segment_then_fragments_stream_through_the_demuxer() {
    let options =
        CmafMuxerOptions { segment_min_duration_secs: 1.0, target_segment_duration_secs: 2.0 };
    let mut mux = CmafMuxer::new(1, options);
    mux.set_stream_format(0, video_format()).unwrap();

    let mut stream = mux.init_segment().unwrap();
    let ticks_per_frame = 30 * 1024 / 30;
    for i in 0..90u64 {
        let is_sync = i % 30 == 0;
        if let Some(segment) =
            mux.push_sample(0, &vec![0xDD; 64], i * ticks_per_frame, is_sync, 0).unwrap()
        {
            stream.extend_from_slice(&segment);
        }
    }
    if let Some(tail) = mux.finish().unwrap() {
        stream.extend_from_slice(&tail);
    }

    let mut demux = isobmff::CmafDemuxer::new(std::io::Cursor::new(stream));

    let init = demux.next_event().unwrap().unwrap();
    let tracks = match init {
        CmafEvent::Init(tracks) => tracks,
        _ => panic!("expected Init first"),
    };
    assert_eq!(tracks.len(), 1);

    let mut total_samples = 0usize;
    let mut last_dts = None;
    while let Some(event) = demux.next_event().unwrap() {
        match event {
            CmafEvent::Fragment(samples) => {
                for sample in &samples {
                    if let Some(last) = last_dts {
                        assert!(sample.dts_ms >= last);
                    }
                    last_dts = Some(sample.dts_ms);
                }
                total_samples += samples.len();
            }
            CmafEvent::Init(_) => panic!("only one Init event is expected"),
        }
    }
    assert_eq!(total_samples, 90);
}
