// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The CMAF demuxer: a streaming reader over a sequential byte source (an initialization
//! header followed by one or more segments). Unlike the classic [`super::engine::Engine`],
//! which is random-access and driven by an absolute-offset callback, this reads top-level
//! boxes continuously off a `std::io::Read` and emits events as it goes.

use super::engine::{parse_moov_tolerant, ParsedTrak};
use super::{Sample, SampleDescription};
use crate::atoms::moof::MoofAtom;
use crate::atoms::trex::TrexAtom;
use crate::atoms::{AtomHeader, SampleEntry, HEADER_SIZE, LARGE_HEADER_SIZE};
use isobmff_core::errors::{malformed_error, truncated_error, BoxContext, Error, Result};
use isobmff_core::io::{ReadBytes, SliceReader, StdReader};
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::io::{ErrorKind, Read};

/// `trex` defaults recorded from the initialization header's `mvex`, used to fill in any
/// `trun`/`tfhd` field a fragment leaves unset.
#[derive(Debug, Clone, Copy)]
struct TrackDefaults {
    default_sample_duration: u32,
    default_sample_size: u32,
    default_sample_flags: u32,
}

impl From<&TrexAtom> for TrackDefaults {
    fn from(trex: &TrexAtom) -> Self {
        TrackDefaults {
            default_sample_duration: trex.default_sample_duration,
            default_sample_size: trex.default_sample_size,
            default_sample_flags: trex.default_sample_flags,
        }
    }
}

struct TrackState {
    sample_entry: Option<SampleEntry>,
    timescale: u32,
    defaults: TrackDefaults,
}

/// One parsed top-level event: the initialization header's track map, or one fragment's worth
/// of samples (possibly spanning several tracks, in the offset order they appear in `mdat`).
#[derive(Debug)]
pub enum CmafEvent {
    Init(HashMap<u32, SampleDescription>),
    Fragment(Vec<Sample>),
}

/// Reads a CMAF byte stream continuously: `next_event` pulls boxes off the underlying reader
/// until it has a complete event (an `moov` or a `moof` whose paired `mdat` has been read).
pub struct CmafDemuxer<R: Read> {
    reader: StdReader<R>,
    tracks: HashMap<u32, TrackState>,
}

impl<R: Read> CmafDemuxer<R> {
    pub fn new(reader: R) -> Self {
        CmafDemuxer { reader: StdReader::new(reader), tracks: HashMap::new() }
    }

    /// Reads and discards exactly `len` bytes, for boxes this demuxer doesn't need the
    /// content of (`ftyp`/`styp`/`sidx`/unknown boxes).
    fn skip(&mut self, len: u64) -> Result<()> {
        let mut remaining = len;
        let mut scratch = [0u8; 4096];
        while remaining > 0 {
            let n = remaining.min(scratch.len() as u64) as usize;
            self.reader.read_buf_exact(&mut scratch[..n])?;
            remaining -= n as u64;
        }
        Ok(())
    }

    fn read_exact_owned(&mut self, len: usize) -> Result<Vec<u8>> {
        self.reader.read_boxed_slice(len)
    }

    /// Reads the next top-level box's header, or `None` at a clean end-of-stream (no bytes
    /// available right at a box boundary). A short read partway through a header is truncation.
    fn next_header(&mut self) -> Result<Option<(AtomHeader, u64)>> {
        let box_start = self.reader.pos();

        let mut first = [0u8; 1];
        let n = self.reader.read_buf(&mut first)?;
        if n == 0 {
            return Ok(None);
        }

        let mut rest = [0u8; 7];
        self.reader.read_buf_exact(&mut rest)?;

        let mut buf = [0u8; 8];
        buf[0] = first[0];
        buf[1..].copy_from_slice(&rest);
        let mut hr = SliceReader::new(&buf);
        let declared_size = hr.read_be_u32()?;
        let mut name = [0u8; 4];
        hr.read_buf_exact(&mut name)?;

        let (size, header_len) = if declared_size == 1 {
            let large_bytes = self.read_exact_owned(8)?;
            let mut lr = SliceReader::new(&large_bytes);
            (lr.read_be_u64()?, LARGE_HEADER_SIZE)
        } else {
            (u64::from(declared_size), HEADER_SIZE)
        };

        let header = AtomHeader { name, size, header_len };
        trace!("cmaf demux: box {:?} at {}", String::from_utf8_lossy(&name), box_start);
        Ok(Some((header, box_start)))
    }

    /// Reads the next event off the stream: `moov` yields [`CmafEvent::Init`], an `moof`
    /// followed by its paired `mdat` yields [`CmafEvent::Fragment`]. `ftyp`/`styp`/`sidx` and
    /// any unrecognized box are skipped. Returns `None` at a clean end-of-stream.
    pub fn next_event(&mut self) -> Result<Option<CmafEvent>> {
        loop {
            let (header, box_start) = match self.next_header() {
                Ok(Some(h)) => h,
                Ok(None) => return Ok(None),
                Err(Error::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    return truncated_error(BoxContext::new("/"));
                }
                Err(err) => return Err(err),
            };
            let content_len = header.content_len()?;

            match &header.name {
                b"moov" => {
                    let content = self.read_exact_owned(content_len as usize)?;
                    let mut r = SliceReader::new(&content);
                    let (parsed_tracks, mvex) = parse_moov_tolerant(&mut r)?;
                    let descriptions = self.install_tracks(parsed_tracks, mvex);
                    debug!("cmaf demux: moov parsed, {} tracks", descriptions.len());
                    return Ok(Some(CmafEvent::Init(descriptions)));
                }
                b"moof" => {
                    let content = self.read_exact_owned(content_len as usize)?;
                    let mut r = SliceReader::new(&content);
                    let moof = MoofAtom::read(&mut r)?;

                    let (next_header, mdat_start) = self
                        .next_header()?
                        .ok_or(())
                        .or_else(|_| malformed_error(BoxContext::new("/"), "moof without a paired mdat"))?;
                    if &next_header.name != b"mdat" {
                        return malformed_error(
                            BoxContext::new("/"),
                            format!(
                                "expected mdat to follow moof, found {}",
                                crate::atoms::display_name(&next_header.name)
                            ),
                        );
                    }
                    let mdat_content_len = next_header.content_len()?;
                    let mdat = self.read_exact_owned(mdat_content_len as usize)?;
                    let mdat_content_start = mdat_start + next_header.header_len;

                    let samples =
                        self.resolve_fragment_samples(&moof, box_start, &mdat, mdat_content_start)?;
                    return Ok(Some(CmafEvent::Fragment(samples)));
                }
                _ => {
                    trace!(
                        "cmaf demux: skipping {} ({} bytes)",
                        crate::atoms::display_name(&header.name),
                        content_len
                    );
                    self.skip(content_len)?;
                }
            }
        }
    }

    fn install_tracks(
        &mut self,
        parsed_tracks: Vec<ParsedTrak>,
        mvex: Option<crate::atoms::mvex::MvexAtom>,
    ) -> HashMap<u32, SampleDescription> {
        let trex_by_track: HashMap<u32, TrackDefaults> = mvex
            .map(|m| m.trex.iter().map(|t| (t.track_id, TrackDefaults::from(t))).collect())
            .unwrap_or_default();

        let mut descriptions = HashMap::with_capacity(parsed_tracks.len());
        for track in parsed_tracks {
            let defaults = trex_by_track.get(&track.track_id).copied().unwrap_or(TrackDefaults {
                default_sample_duration: 0,
                default_sample_size: 0,
                default_sample_flags: 0,
            });

            descriptions.insert(
                track.track_id,
                SampleDescription { sample_entry: track.sample_entry.clone() },
            );
            self.tracks.insert(
                track.track_id,
                TrackState { sample_entry: track.sample_entry, timescale: track.timescale, defaults },
            );
        }
        descriptions
    }

    /// Resolves every `trun` sample in `moof` to its absolute byte offset, size, timing, and
    /// sync flag, then fetches its bytes out of the already-read `mdat` buffer. Samples are
    /// returned in ascending offset order, as they were laid out in `mdat`.
    fn resolve_fragment_samples(
        &self,
        moof: &MoofAtom,
        moof_box_start: u64,
        mdat: &[u8],
        mdat_content_start: u64,
    ) -> Result<Vec<Sample>> {
        struct Resolved {
            track_id: u32,
            offset: u64,
            size: u32,
            dts: u64,
            composition_offset: i64,
            is_sync: bool,
        }

        let mut resolved = Vec::new();

        for traf in &moof.traf {
            let track = self.tracks.get(&traf.tfhd.track_id).ok_or(()).or_else(|_| {
                malformed_error(
                    BoxContext::new("moof/traf/tfhd"),
                    format!("fragment references unknown track {}", traf.tfhd.track_id),
                )
            })?;

            let base = moof_box_start + traf.tfhd.base_data_offset.unwrap_or(0);
            let mut dts = traf.tfdt.base_media_decode_time;

            for trun in &traf.trun {
                let mut offset =
                    (base as i64 + i64::from(trun.data_offset.unwrap_or(0))) as u64;

                for sample in &trun.samples {
                    let size = sample.size.unwrap_or(
                        traf.tfhd.default_sample_size.unwrap_or(track.defaults.default_sample_size),
                    );
                    let duration = sample.duration.unwrap_or(
                        traf.tfhd
                            .default_sample_duration
                            .unwrap_or(track.defaults.default_sample_duration),
                    );
                    let flags = sample.flags.unwrap_or(
                        traf.tfhd.default_sample_flags.unwrap_or(track.defaults.default_sample_flags),
                    );
                    let is_sync = flags & 0x0001_0000 == 0;

                    resolved.push(Resolved {
                        track_id: traf.tfhd.track_id,
                        offset,
                        size,
                        dts,
                        composition_offset: sample.composition_time_offset.unwrap_or(0),
                        is_sync,
                    });

                    offset += u64::from(size);
                    dts += u64::from(duration);
                }
            }
        }

        resolved.sort_by_key(|s| s.offset);

        resolved
            .into_iter()
            .map(|s| {
                let start = s
                    .offset
                    .checked_sub(mdat_content_start)
                    .ok_or(())
                    .or_else(|_| {
                        malformed_error(
                            BoxContext::new("moof/traf/trun"),
                            "sample offset precedes its fragment's mdat",
                        )
                    })? as usize;
                let end = start + s.size as usize;
                if end > mdat.len() {
                    return truncated_error(BoxContext::new("mdat"));
                }

                let track = self.tracks.get(&s.track_id).expect("validated above");
                let dts_ms = isobmff_core::timescale::convert_truncating(s.dts, track.timescale, 1000);
                let pts_ticks = s.dts as i64 + s.composition_offset;
                let pts_ms = isobmff_core::timescale::convert_truncating_signed(
                    pts_ticks,
                    track.timescale,
                    1000,
                );

                Ok(Sample {
                    track_id: s.track_id,
                    data: mdat[start..end].to_vec(),
                    dts_ms,
                    pts_ms,
                    is_sync: s.is_sync,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Framerate, StreamFormat};
    use crate::mux::cmaf::{CmafMuxer, CmafMuxerOptions};
    use isobmff_common::AvcDecoderConfigurationRecord;

    fn avc_format() -> StreamFormat {
        StreamFormat {
            sample_entry: SampleEntry::Avc {
                width: 640,
                height: 360,
                config: AvcDecoderConfigurationRecord {
                    profile_indication: 0x64,
                    profile_compatibility: 0,
                    level_indication: 0x1f,
                    sequence_parameter_sets: vec![],
                    picture_parameter_sets: vec![],
                },
            },
            framerate: Some(Framerate { num: 30, den: 1 }),
        }
    }

    #[test]
    fn reads_init_then_one_fragment() {
        let mut mux = CmafMuxer::new(
            1,
            CmafMuxerOptions { segment_min_duration_secs: 0.1, target_segment_duration_secs: 0.2 },
        );
        mux.set_stream_format(0, avc_format()).unwrap();

        let mut stream = mux.init_segment().unwrap();
        let ticks_per_frame = 30 * 1024 / 30;
        for i in 0..20u64 {
            let is_sync = i == 0;
            if let Some(segment) =
                mux.push_sample(0, &[i as u8; 8], i * ticks_per_frame, is_sync, 0).unwrap()
            {
                stream.extend_from_slice(&segment);
                break;
            }
        }

        let mut demuxer = CmafDemuxer::new(std::io::Cursor::new(stream));

        let init = demuxer.next_event().unwrap().unwrap();
        match init {
            CmafEvent::Init(tracks) => {
                assert_eq!(tracks.len(), 1);
                assert!(tracks.values().next().unwrap().is_video());
            }
            _ => panic!("expected Init event first"),
        }

        let fragment = demuxer.next_event().unwrap().unwrap();
        match fragment {
            CmafEvent::Fragment(samples) => {
                assert!(!samples.is_empty());
                assert!(samples[0].is_sync);
                for w in samples.windows(2) {
                    assert!(w[0].dts_ms <= w[1].dts_ms);
                }
            }
            _ => panic!("expected Fragment event second"),
        }
    }
}
