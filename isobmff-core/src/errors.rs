// isobmff
// Copyright (c) 2024 The isobmff Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type for the isobmff container toolkit.

use std::fmt;
use std::io;
use std::result;

/// Context attached to a malformed-input error: the box-name path from the root, the field
/// that failed to parse (if the failure is field-specific), and a short snippet of the
/// offending bytes.
#[derive(Debug, Clone, Default)]
pub struct BoxContext {
    /// Box names from the root, joined with `/`, e.g. `/moov/trak/tkhd`.
    pub box_path: String,
    /// The field within the box that failed, if known.
    pub field: Option<&'static str>,
    /// A short copy of the bytes that caused the failure, if available.
    pub data: Vec<u8>,
}

impl BoxContext {
    pub fn new(box_path: impl Into<String>) -> Self {
        BoxContext { box_path: box_path.into(), field: None, data: Vec::new() }
    }

    pub fn with_field(mut self, field: &'static str) -> Self {
        self.field = Some(field);
        self
    }

    pub fn with_data(mut self, data: &[u8]) -> Self {
        self.data = data.to_vec();
        self
    }
}

impl fmt::Display for BoxContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "box={}", self.box_path)?;
        if let Some(field) = self.field {
            write!(f, ", field={}", field)?;
        }
        if !self.data.is_empty() {
            write!(f, ", data={:02x?}", self.data)?;
        }
        Ok(())
    }
}

/// `Error` enumerates every failure this toolkit can report.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred while reading from or writing to the caller-supplied stream.
    Io(io::Error),
    /// The stream contained malformed data that could not be parsed or serialized.
    Malformed(BoxContext, String),
    /// The declared size of a box or field exceeded the bytes actually available.
    Truncated(BoxContext),
    /// A codec or box type is recognized but this toolkit does not support it in a context
    /// where that is fatal (e.g. muxing a track with an unsupported stream format).
    Unsupported(String),
    /// A protocol invariant was violated: an incompatible stream-format change after samples
    /// started, end-of-stream before any stream format, or a non-monotonic dts.
    Protocol(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {}", err),
            Error::Malformed(ctx, msg) => write!(f, "malformed stream: {} ({})", msg, ctx),
            Error::Truncated(ctx) => write!(f, "truncated stream ({})", ctx),
            Error::Unsupported(what) => write!(f, "unsupported: {}", what),
            Error::Protocol(what) => write!(f, "protocol violation: {}", what),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a malformed-input error.
pub fn malformed_error<T>(ctx: BoxContext, desc: impl Into<String>) -> Result<T> {
    Err(Error::Malformed(ctx, desc.into()))
}

/// Convenience function to create a truncated-stream error.
pub fn truncated_error<T>(ctx: BoxContext) -> Result<T> {
    Err(Error::Truncated(ctx))
}

/// Convenience function to create an unsupported-feature error.
pub fn unsupported_error<T>(what: impl Into<String>) -> Result<T> {
    Err(Error::Unsupported(what.into()))
}

/// Convenience function to create a protocol-violation error.
pub fn protocol_error<T>(what: impl Into<String>) -> Result<T> {
    Err(Error::Protocol(what.into()))
}
