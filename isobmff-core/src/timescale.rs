// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Timescale conversion. ISO-BMFF expresses every duration and timestamp in a track- or
//! movie-specific "ticks per second" unit; converting between two timescales truncates toward
//! zero everywhere except the one mux input→track helper, which rounds to nearest.

/// Converts `time` ticks in `source_scale` to the equivalent tick count in `target_scale`,
/// truncating toward zero. This is the conversion used everywhere boxes reference each
/// other's timescales (e.g. rescaling a track duration into the movie timescale for `tkhd`).
pub fn convert_truncating(time: u64, source_scale: u32, target_scale: u32) -> u64 {
    debug_assert!(source_scale > 0);
    ((time as u128 * target_scale as u128) / source_scale as u128) as u64
}

/// As [`convert_truncating`], but for signed ticks (composition offsets may be negative).
pub fn convert_truncating_signed(time: i64, source_scale: u32, target_scale: u32) -> i64 {
    debug_assert!(source_scale > 0);
    ((time as i128 * target_scale as i128) / source_scale as i128) as i64
}

/// Converts `time` ticks in `source_scale` to `target_scale`, rounding to nearest. Used only
/// when converting a caller-supplied mux input timestamp (e.g. milliseconds) into a track's
/// timescale, where the spec calls for rounding rather than truncation.
pub fn convert_rounding(time: u64, source_scale: u32, target_scale: u32) -> u64 {
    debug_assert!(source_scale > 0);
    let numerator = time as u128 * target_scale as u128;
    let denominator = source_scale as u128;
    ((numerator + denominator / 2) / denominator) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_toward_zero() {
        // 1 tick at timescale 3 -> timescale 2: 1 * 2 / 3 = 0 (truncated, not rounded).
        assert_eq!(convert_truncating(1, 3, 2), 0);
        assert_eq!(convert_truncating(1000, 1000, 48000), 48000);
    }

    #[test]
    fn rounds_to_nearest() {
        // 1 tick at timescale 3 -> timescale 2: 2/3 rounds to 1.
        assert_eq!(convert_rounding(1, 3, 2), 1);
    }

    #[test]
    fn signed_conversion_preserves_sign() {
        assert_eq!(convert_truncating_signed(-1024, 30720, 1000), -33);
    }
}
