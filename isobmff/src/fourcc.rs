// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Four-character box names.

use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const fn new(name: &[u8; 4]) -> Self {
        FourCc(*name)
    }

    pub fn as_bytes(&self) -> [u8; 4] {
        self.0
    }

    /// A best-effort display form: non-ASCII-printable bytes are rendered as `\xNN`, matching
    /// how an unrecognized or malformed box name should still be reportable in error context.
    pub fn to_display_string(&self) -> String {
        self.0
            .iter()
            .map(|&b| {
                if b.is_ascii_graphic() || b == b' ' {
                    (b as char).to_string()
                } else {
                    format!("\\x{:02x}", b)
                }
            })
            .collect()
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({:?})", self.to_display_string())
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_ascii_name() {
        assert_eq!(FourCc::new(b"ftyp").to_string(), "ftyp");
    }
}
