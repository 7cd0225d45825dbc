// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Test-only encoder for this crate's segment container format.
//!
//! The real segment *writer* is out of scope for this crate (spec §1); this
//! module exists purely so the decoder and collector can be exercised
//! end-to-end in tests without a real producer, the same way the `quiver`
//! crate ships a `segment::test_utils` module alongside its store.

use std::fs;
use std::io::Write;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use super::MAGIC;
use crate::error::{Error, Result};

/// One raw (pre-scale) record: `(stream_id, quantized_epoch, indices, raw_values)`.
pub type RawRecord = (u32, i64, Vec<i64>, Vec<i64>);

/// Encodes `records` into a well-formed segment file at `path`, in the
/// format documented in SPEC_FULL.md §4.2.
pub fn encode_segment_file(path: &Path, records: &[RawRecord]) -> Result<()> {
    let mut body = Vec::new();
    for (stream_id, quantized_epoch, indices, raw_values) in records {
        body.write_u32::<LittleEndian>(*stream_id)
            .expect("writing to Vec cannot fail");
        body.write_i64::<LittleEndian>(*quantized_epoch)
            .expect("writing to Vec cannot fail");
        body.write_u32::<LittleEndian>(indices.len() as u32)
            .expect("writing to Vec cannot fail");
        for idx in indices {
            body.write_i64::<LittleEndian>(*idx)
                .expect("writing to Vec cannot fail");
        }
        for val in raw_values {
            body.write_i64::<LittleEndian>(*val)
                .expect("writing to Vec cannot fail");
        }
    }

    let frame = zstd::stream::encode_all(&body[..], 0)
        .map_err(|e| Error::invalid(format!("zstd encode failed: {e}")))?;
    let crc = crc32fast::hash(&frame);

    let mut file = fs::File::create(path).map_err(|e| Error::io(path, e))?;
    file.write_all(&MAGIC).map_err(|e| Error::io(path, e))?;
    file.write_all(&crc.to_le_bytes())
        .map_err(|e| Error::io(path, e))?;
    file.write_all(&frame).map_err(|e| Error::io(path, e))?;
    Ok(())
}
