// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The codec-agnostic stream format carried by a [`Track`](crate::track::Track): a
//! [`SampleEntry`] (the `stsd` payload a track will eventually be serialized with) paired with
//! whatever framerate hint the input supplied, since video timescale selection depends on a
//! quantity the wire-level sample entry itself doesn't carry.

pub use crate::atoms::SampleEntry;

/// A rational frame rate, e.g. `{ num: 30000, den: 1001 }` for 29.97 fps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framerate {
    pub num: u32,
    pub den: u32,
}

/// A codec stream format as delivered by an input, before a [`Track`](crate::track::Track) is
/// built around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_entry: SampleEntry,
    /// Only meaningful for video; `None` selects the 30 fps default timescale.
    pub framerate: Option<Framerate>,
}

impl StreamFormat {
    pub fn is_video(&self) -> bool {
        matches!(self.sample_entry, SampleEntry::Avc { .. } | SampleEntry::Hevc { .. })
    }

    /// Spatial dimensions, or `(0, 0)` for audio. Doubles as the kind discriminator when a
    /// caller asks for a track by kind rather than id, per the codec family.
    pub fn dimensions(&self) -> (u16, u16) {
        match &self.sample_entry {
            SampleEntry::Avc { width, height, .. } => (*width, *height),
            SampleEntry::Hevc { width, height, .. } => (*width, *height),
            SampleEntry::Aac { .. } | SampleEntry::Opus { .. } => (0, 0),
        }
    }

    /// The timescale (ticks per second) a newly created track should use for this format.
    ///
    /// - Opus is always 48 kHz.
    /// - AAC uses its configured sample rate.
    /// - H.264/H.265 use `30 * 1024` absent a framerate hint, or `framerate.num * 1024`
    ///   when one was supplied (the denominator only matters for duration arithmetic, which
    ///   is expressed in these ticks, not in the timescale itself).
    pub fn timescale(&self) -> u32 {
        match &self.sample_entry {
            SampleEntry::Opus { .. } => 48_000,
            SampleEntry::Aac { sample_rate, .. } => *sample_rate,
            SampleEntry::Avc { .. } | SampleEntry::Hevc { .. } => {
                self.framerate.map_or(30 * 1024, |f| f.num * 1024)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isobmff_common::OpusIdHeader;

    #[test]
    fn opus_timescale_is_fixed() {
        let format = StreamFormat {
            sample_entry: SampleEntry::Opus {
                channel_count: 2,
                sample_rate: 48_000,
                header: OpusIdHeader { output_channel_count: 2 },
            },
            framerate: None,
        };
        assert_eq!(format.timescale(), 48_000);
        assert!(!format.is_video());
        assert_eq!(format.dimensions(), (0, 0));
    }

    #[test]
    fn avc_timescale_defaults_to_30fps() {
        use isobmff_common::AvcDecoderConfigurationRecord;
        let format = StreamFormat {
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
            framerate: None,
        };
        assert_eq!(format.timescale(), 30 * 1024);
        assert_eq!(format.dimensions(), (1280, 720));
        assert!(format.is_video());
    }

    #[test]
    fn avc_timescale_follows_framerate_hint() {
        use isobmff_common::AvcDecoderConfigurationRecord;
        let format = StreamFormat {
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
            framerate: Some(Framerate { num: 25, den: 1 }),
        };
        assert_eq!(format.timescale(), 25 * 1024);
    }
}
