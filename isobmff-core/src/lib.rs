// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared I/O, error, and timescale primitives used by the `isobmff-common` and `isobmff`
//! crates.

pub mod bits;
pub mod errors;
pub mod io;
pub mod timescale;

pub use errors::{Error, Result};
