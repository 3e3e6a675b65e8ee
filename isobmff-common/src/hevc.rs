// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `HEVCDecoderConfigurationRecord` (`hvcC`). Per spec, this is treated as an opaque
//! pass-through: upstream H.265 parsers already produce the record bytes, so this toolkit
//! stores and re-emits them verbatim rather than interpreting the bit layout.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HevcDecoderConfigurationRecord {
    pub raw: Vec<u8>,
}

impl HevcDecoderConfigurationRecord {
    pub fn read(buf: &[u8]) -> Self {
        HevcDecoderConfigurationRecord { raw: buf.to_vec() }
    }

    pub fn write(&self) -> &[u8] {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_opaque_bytes() {
        let raw = vec![1, 2, 3, 4, 5];
        let record = HevcDecoderConfigurationRecord::read(&raw);
        assert_eq!(record.write(), raw.as_slice());
    }
}
