// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `fp(int_bits, frac_bits)` fixed-point fields: two big-endian integers concatenated and
//! addressed together, as used by `mvhd`/`tkhd` rate and volume, and the unity transformation
//! matrix.

use isobmff_core::errors::Result;
use isobmff_core::io::{ReadBytes, WriteBytes};

/// A 16.16 fixed-point value, e.g. `mvhd`/`tkhd` `rate` and the matrix entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixed1616(pub i32);

impl Fixed1616 {
    pub const ONE: Fixed1616 = Fixed1616(0x0001_0000);
    pub const ZERO: Fixed1616 = Fixed1616(0);

    pub fn read<R: ReadBytes>(r: &mut R) -> Result<Self> {
        Ok(Fixed1616(r.read_be_i32()?))
    }

    pub fn write<W: WriteBytes>(self, w: &mut W) -> Result<()> {
        w.write_be_i32(self.0)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 65536.0
    }
}

/// An 8.8 fixed-point value, e.g. `mvhd`/`tkhd` `volume`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixed88(pub i16);

impl Fixed88 {
    pub const ONE: Fixed88 = Fixed88(0x0100);
    pub const ZERO: Fixed88 = Fixed88(0);

    pub fn read<R: ReadBytes>(r: &mut R) -> Result<Self> {
        Ok(Fixed88(r.read_be_i16()?))
    }

    pub fn write<W: WriteBytes>(self, w: &mut W) -> Result<()> {
        w.write_be_u16(self.0 as u16)
    }
}

/// The 3x3 transformation matrix stored in `mvhd`/`tkhd`, always emitted as the identity
/// matrix by this toolkit (edit-list/arbitrary geometry composition is out of scope).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformMatrix(pub [i32; 9]);

impl TransformMatrix {
    pub const IDENTITY: TransformMatrix =
        TransformMatrix([0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000]);

    pub fn read<R: ReadBytes>(r: &mut R) -> Result<Self> {
        let mut values = [0i32; 9];
        for v in values.iter_mut() {
            *v = r.read_be_i32()?;
        }
        Ok(TransformMatrix(values))
    }

    pub fn write<W: WriteBytes>(&self, w: &mut W) -> Result<()> {
        for &v in &self.0 {
            w.write_be_i32(v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isobmff_core::io::SliceReader;

    #[test]
    fn fixed1616_one_is_65536() {
        assert_eq!(Fixed1616::ONE.0, 65536);
        assert_eq!(Fixed1616::ONE.to_f64(), 1.0);
    }

    #[test]
    fn matrix_round_trips_identity() {
        let mut buf = Vec::new();
        TransformMatrix::IDENTITY.write(&mut buf).unwrap();
        let mut r = SliceReader::new(&buf);
        let parsed = TransformMatrix::read(&mut r).unwrap();
        assert_eq!(parsed, TransformMatrix::IDENTITY);
    }
}
