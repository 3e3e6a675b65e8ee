// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Codec configuration record parsing shared by the box schema's sample-entry boxes: AVC/HEVC
//! decoder configuration records, the MPEG-4 object descriptor framework used by `esds`, and
//! the Opus `dOps` record.

pub mod avc;
pub mod esds;
pub mod hevc;
pub mod opus;

pub use avc::AvcDecoderConfigurationRecord;
pub use esds::EsDescriptor;
pub use hevc::HevcDecoderConfigurationRecord;
pub use opus::OpusIdHeader;
