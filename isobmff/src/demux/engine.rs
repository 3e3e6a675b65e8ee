// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The classic ISOM demuxer: framework-agnostic, driven entirely by a caller-supplied
//! data-provider callback rather than owning any I/O itself. Tolerates `mdat` appearing before
//! `moov` since every offset in a reconstructed sample table is absolute within the stream.

use super::{Sample, SampleDescription};
use crate::atoms::mdhd::MdhdAtom;
use crate::atoms::tkhd::TkhdAtom;
use crate::atoms::trak::TrakAtom;
use crate::atoms::{AtomIterator, SampleEntry, HEADER_SIZE, LARGE_HEADER_SIZE};
use crate::sample_table::{reconstruct, ReconstructedSample};
use isobmff_core::errors::{malformed_error, truncated_error, BoxContext, Error, Result};
use isobmff_core::io::{ReadBytes, SliceReader};
use isobmff_core::timescale::{convert_rounding, convert_truncating, convert_truncating_signed};
use log::{debug, trace, warn};
use std::collections::HashMap;

/// The data source the Engine reads through: an absolute-offset, bounded-length byte fetch.
/// A short read (fewer bytes than `len`) signals a temporary underrun during sample reads, or
/// end-of-file during the startup scan.
pub trait DataProvider {
    fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>>;
}

impl<F> DataProvider for F
where
    F: FnMut(u64, usize) -> Result<Vec<u8>>,
{
    fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self(offset, len)
    }
}

/// Reads exactly `len` bytes at `offset`, retrying short reads a bounded number of times
/// before giving up. Used both for the startup scan (where a persistent underrun is fatal)
/// and, with its own tolerance for end-of-file, for per-sample reads.
const MAX_READ_RETRIES: u32 = 3;

fn read_exact<P: DataProvider>(provider: &mut P, offset: u64, len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(len);
    let mut pos = offset;

    for _ in 0..MAX_READ_RETRIES {
        if out.len() == len {
            return Ok(out);
        }
        let chunk = provider.read(pos, len - out.len())?;
        if chunk.is_empty() {
            break;
        }
        pos += chunk.len() as u64;
        out.extend_from_slice(&chunk);
    }

    if out.len() == len {
        Ok(out)
    } else {
        truncated_error(BoxContext::new("/").with_data(&out[..out.len().min(16)]))
    }
}

struct EngineTrack {
    id: u32,
    timescale: u32,
    sample_description: Option<SampleEntry>,
    samples: Vec<ReconstructedSample>,
    cursor: usize,
}

/// A parsed, random-access ISOM file: `tracks()` to discover what's there, `seek`/
/// `read_sample` to pull samples out track by track.
pub struct Engine<P: DataProvider> {
    provider: P,
    tracks: Vec<EngineTrack>,
}

impl<P: DataProvider> Engine<P> {
    /// Scans top-level boxes starting at the beginning of the stream; on `moov`, parses it
    /// fully (tolerating `mdat` appearing first or last) and stops scanning, since every
    /// sample offset `moov` carries is absolute and does not depend on what follows.
    pub fn open(mut provider: P) -> Result<Self> {
        let mut offset = 0u64;
        let mut parsed_tracks = None;

        loop {
            let header_bytes = match read_exact(&mut provider, offset, HEADER_SIZE as usize) {
                Ok(bytes) => bytes,
                Err(Error::Truncated(_)) => break,
                Err(err) => return Err(err),
            };

            let mut hr = SliceReader::new(&header_bytes);
            let declared_size = hr.read_be_u32()?;
            let mut name = [0u8; 4];
            hr.read_buf_exact(&mut name)?;

            let (size, header_len) = if declared_size == 1 {
                let large_bytes = read_exact(&mut provider, offset + HEADER_SIZE, 8)?;
                let mut lr = SliceReader::new(&large_bytes);
                (lr.read_be_u64()?, LARGE_HEADER_SIZE)
            } else {
                (u64::from(declared_size), HEADER_SIZE)
            };
            let header = crate::atoms::AtomHeader { name, size, header_len };
            let content_len = header.content_len()?;

            trace!("engine: top-level box {:?} at offset {}", String::from_utf8_lossy(&name), offset);

            if &name == b"moov" {
                let content = read_exact(&mut provider, offset + header_len, content_len as usize)?;
                let mut r = SliceReader::new(&content);
                let (tracks, _mvex) = parse_moov_tolerant(&mut r)?;
                parsed_tracks = Some(tracks);
                break;
            }

            offset = offset
                .checked_add(header_len)
                .and_then(|o| o.checked_add(content_len))
                .ok_or(())
                .or_else(|_| malformed_error(BoxContext::new("/"), "box size overflowed stream offset"))?;
        }

        let parsed_tracks = parsed_tracks
            .ok_or(())
            .or_else(|_| malformed_error(BoxContext::new("/"), "stream has no moov box"))?;

        let tracks = parsed_tracks
            .into_iter()
            .map(|t| {
                let samples = match &t.stbl {
                    Some(stbl) => reconstruct(stbl)?,
                    None => Vec::new(),
                };
                Ok(EngineTrack {
                    id: t.track_id,
                    timescale: t.timescale,
                    sample_description: t.sample_entry,
                    samples,
                    cursor: 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("engine: opened stream with {} tracks", tracks.len());
        Ok(Engine { provider, tracks })
    }

    /// The sample description each known track id resolved to. A `None` entry means the
    /// track's codec is unsupported; such a track yields no samples.
    pub fn tracks(&self) -> HashMap<u32, SampleDescription> {
        self.tracks
            .iter()
            .map(|t| (t.id, SampleDescription { sample_entry: t.sample_description.clone() }))
            .collect()
    }

    fn track_mut(&mut self, track_id: u32) -> Result<&mut EngineTrack> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == track_id)
            .ok_or(())
            .or_else(|_| malformed_error(BoxContext::new("/"), format!("no track with id {}", track_id)))
    }

    /// Positions `track_id`'s cursor at the first sample whose dts is at or after
    /// `dts_ms`, converted into the track's own timescale by rounding to nearest.
    pub fn seek(&mut self, track_id: u32, dts_ms: u64) -> Result<()> {
        let track = self.track_mut(track_id)?;
        let target = convert_rounding(dts_ms, 1000, track.timescale);
        track.cursor = track.samples.partition_point(|s| s.dts < target);
        Ok(())
    }

    /// Reads the next sample on `track_id`, advancing its cursor. Returns `Ok(None)` once the
    /// cursor passes the track's last sample (including when a persistent I/O underrun makes
    /// the final sample's bytes unreachable, which this toolkit treats as an early but valid
    /// end-of-stream rather than a hard failure).
    pub fn read_sample(&mut self, track_id: u32) -> Result<Option<Sample>> {
        let track = self.track_mut(track_id)?;
        if track.cursor >= track.samples.len() {
            return Ok(None);
        }

        let sample = track.samples[track.cursor];
        let timescale = track.timescale;
        let is_last = track.cursor + 1 == track.samples.len();

        let data = match read_exact(&mut self.provider, sample.offset, sample.size as usize) {
            Ok(bytes) => bytes,
            Err(Error::Truncated(_)) if is_last => {
                warn!(
                    "engine: track {} ended with a persistent underrun reading its last sample",
                    track_id
                );
                let track = self.track_mut(track_id)?;
                track.cursor += 1;
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let track = self.track_mut(track_id)?;
        track.cursor += 1;

        let dts_ms = convert_truncating(sample.dts, timescale, 1000);
        let pts_ticks = sample.dts as i64 + sample.composition_offset;
        let pts_ms = convert_truncating_signed(pts_ticks, timescale, 1000);

        Ok(Some(Sample { track_id, data, dts_ms, pts_ms, is_sync: sample.is_sync }))
    }
}

pub(crate) struct ParsedTrak {
    pub track_id: u32,
    pub timescale: u32,
    pub sample_entry: Option<SampleEntry>,
    pub stbl: Option<crate::atoms::StblAtom>,
}

/// Parses `moov`'s `trak` children tolerantly (see [`parse_trak_tolerant`]) and, if present,
/// its `mvex` box — the latter only meaningful for a CMAF initialization header.
pub(crate) fn parse_moov_tolerant(
    r: &mut SliceReader<'_>,
) -> Result<(Vec<ParsedTrak>, Option<crate::atoms::mvex::MvexAtom>)> {
    let mut tracks = Vec::new();
    let mut mvex = None;

    let mut it = AtomIterator::new(r.remaining(), "moov");
    while let Some((header, mut content)) = it.next_atom()? {
        match &header.name {
            b"trak" => tracks.push(parse_trak_tolerant(&mut content)?),
            b"mvex" => mvex = Some(crate::atoms::mvex::MvexAtom::read(&mut content)?),
            _ => {}
        }
    }

    if tracks.is_empty() {
        return malformed_error(BoxContext::new("moov"), "missing at least one trak");
    }

    Ok((tracks, mvex))
}

/// Parses one `trak`, falling back to an identity-only parse (track id, timescale, kind) when
/// its `stsd` names a codec this toolkit does not support, rather than failing the whole file.
pub(crate) fn parse_trak_tolerant(content: &mut SliceReader<'_>) -> Result<ParsedTrak> {
    match TrakAtom::read(content) {
        Ok(trak) => {
            let sample_entry = trak.mdia.minf.stbl.stsd.entries.first().cloned();
            Ok(ParsedTrak {
                track_id: trak.tkhd.track_id,
                timescale: trak.mdia.mdhd.timescale,
                sample_entry,
                stbl: Some(trak.mdia.minf.stbl),
            })
        }
        Err(Error::Unsupported(reason)) => {
            warn!("engine: track uses an unsupported codec ({}); reporting a null sample description", reason);
            let (track_id, timescale) = parse_trak_identity(content)?;
            Ok(ParsedTrak { track_id, timescale, sample_entry: None, stbl: None })
        }
        Err(err) => Err(err),
    }
}

/// A shallow re-walk of `trak` that stops at `tkhd`/`mdhd`, never touching `stsd`; used only
/// as the fallback when the full parse above hit an unsupported codec.
fn parse_trak_identity(content: &mut SliceReader<'_>) -> Result<(u32, u32)> {
    let mut track_id = None;
    let mut timescale = None;

    let mut it = AtomIterator::new(content.remaining(), "trak");
    while let Some((header, mut inner)) = it.next_atom()? {
        match &header.name {
            b"tkhd" => track_id = Some(TkhdAtom::read(&mut inner)?.track_id),
            b"mdia" => {
                let mut mdia_it = AtomIterator::new(inner.remaining(), "trak/mdia");
                while let Some((mheader, mut minner)) = mdia_it.next_atom()? {
                    if &mheader.name == b"mdhd" {
                        timescale = Some(MdhdAtom::read(&mut minner)?.timescale);
                    }
                }
            }
            _ => {}
        }
    }

    let track_id = track_id
        .ok_or(())
        .or_else(|_| malformed_error(BoxContext::new("trak"), "missing tkhd"))?;
    let timescale = timescale
        .ok_or(())
        .or_else(|_| malformed_error(BoxContext::new("trak/mdia"), "missing mdhd"))?;

    Ok((track_id, timescale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StreamFormat;
    use crate::mux::isom::{IsomMuxer, IsomMuxerOptions};
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

    fn muxed_file() -> Vec<u8> {
        let mut mux = IsomMuxer::new(1, IsomMuxerOptions::default()).unwrap();
        mux.set_stream_format(0, opus_format()).unwrap();
        for i in 0..10u64 {
            mux.push_sample(0, &[i as u8; 20], i * 960, true, 0).unwrap();
        }
        mux.end_stream(0).unwrap();
        mux.finalize().unwrap()
    }

    fn provider_over(bytes: Vec<u8>) -> impl DataProvider {
        move |offset: u64, len: usize| -> Result<Vec<u8>> {
            let offset = offset as usize;
            if offset >= bytes.len() {
                return Ok(Vec::new());
            }
            let end = (offset + len).min(bytes.len());
            Ok(bytes[offset..end].to_vec())
        }
    }

    #[test]
    fn opens_file_and_reports_one_track() {
        let file = muxed_file();
        let engine = Engine::open(provider_over(file)).unwrap();
        let tracks = engine.tracks();
        assert_eq!(tracks.len(), 1);
        let desc = tracks.values().next().unwrap();
        assert!(desc.sample_entry.is_some());
        assert!(!desc.is_video());
    }

    #[test]
    fn reads_every_sample_in_order_then_ends() {
        let file = muxed_file();
        let mut engine = Engine::open(provider_over(file)).unwrap();
        let track_id = *engine.tracks().keys().next().unwrap();

        for i in 0..10u64 {
            let sample = engine.read_sample(track_id).unwrap().unwrap();
            assert_eq!(sample.data, vec![i as u8; 20]);
            assert!(sample.is_sync);
        }
        assert!(engine.read_sample(track_id).unwrap().is_none());
    }

    #[test]
    fn seek_positions_cursor_at_or_after_target() {
        let file = muxed_file();
        let mut engine = Engine::open(provider_over(file)).unwrap();
        let track_id = *engine.tracks().keys().next().unwrap();

        // Sample 5 has dts 4800 ticks @ 48kHz == 100ms.
        engine.seek(track_id, 100).unwrap();
        let sample = engine.read_sample(track_id).unwrap().unwrap();
        assert_eq!(sample.data, vec![5u8; 20]);
    }
}
