// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Error and result types.

use std::path::PathBuf;

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the periodic reducer, segment decoder, and collector.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Metadata, configuration, or call-site argument that is malformed by
    /// construction (not a transient I/O or decode condition).
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Human-readable description of what was invalid.
        reason: String,
    },

    /// A segment file could not be decoded: wrong magic, failed checksum,
    /// truncated body, or a stream id with no matching scale pair.
    #[error("failed to decode segment {path}: {reason}")]
    Decode {
        /// Path of the offending segment file.
        path: PathBuf,
        /// Human-readable description of the decode failure.
        reason: String,
    },

    /// A non-tolerated filesystem error (missing files during segment
    /// removal are tolerated and do not surface this variant).
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path the failing operation was performed against.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
