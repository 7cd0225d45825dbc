// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Segment decoder: turns a `*.seg.zst` file plus a per-stream `ScalePair`
//! map into a finite, single-pass sequence of [`SparseMeasurement`]s.
//!
//! The on-disk container format is this crate's own (spec §4.2 leaves the
//! byte format to the producer, which is out of scope); see SPEC_FULL.md
//! §4.2 for the layout. [`test_support`] provides an encoder for building
//! well-formed segment files in tests, mirroring how a real producer would.

pub mod test_support;

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result};
use crate::sparse::SparseMeasurement;

pub(crate) const MAGIC: [u8; 4] = *b"SG1\0";

/// `(epoch_scale, value_scale)`, used to convert a segment file's quantized
/// integer representation back to floating point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalePair {
    /// Multiplier recovering the float epoch from a quantized integer tick.
    pub epoch_scale: f64,
    /// Multiplier recovering float values from quantized integers.
    pub value_scale: f64,
}

/// Decodes every record in `path`, in file order, applying the scales in
/// `scales` to convert quantized values back to floating point.
///
/// The `scales` map need not cover every stream id that exists anywhere;
/// it only needs an entry for a `stream_id` that actually appears in this
/// particular file. A `stream_id` present in the file without a matching
/// `ScalePair` is a [`Error::Decode`].
pub fn decode_segment_file(
    path: &Path,
    scales: &HashMap<u32, ScalePair>,
) -> Result<Vec<SparseMeasurement>> {
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    decode_segment_bytes(path, &bytes, scales)
}

fn decode_segment_bytes(
    path: &Path,
    bytes: &[u8],
    scales: &HashMap<u32, ScalePair>,
) -> Result<Vec<SparseMeasurement>> {
    if bytes.len() < MAGIC.len() + 4 {
        return Err(Error::decode(path, "file too short for header"));
    }
    let (header, rest) = bytes.split_at(MAGIC.len());
    if header != MAGIC {
        return Err(Error::decode(path, "bad magic"));
    }
    let (crc_bytes, frame) = rest.split_at(4);
    let expected_crc = u32::from_le_bytes(crc_bytes.try_into().expect("4 bytes"));
    let actual_crc = crc32fast::hash(frame);
    if actual_crc != expected_crc {
        return Err(Error::decode(path, "checksum mismatch"));
    }

    let body = zstd::stream::decode_all(frame)
        .map_err(|e| Error::decode(path, format!("zstd decode failed: {e}")))?;

    let mut cursor = std::io::Cursor::new(body);
    let mut measurements = Vec::new();
    loop {
        let stream_id = match cursor.read_u32::<LittleEndian>() {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(Error::decode(path, format!("truncated record header: {e}"))),
        };
        let quantized_epoch = cursor
            .read_i64::<LittleEndian>()
            .map_err(|e| Error::decode(path, format!("truncated epoch: {e}")))?;
        let count = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::decode(path, format!("truncated count: {e}")))? as usize;

        let mut indices = Vec::with_capacity(count);
        for _ in 0..count {
            indices.push(
                cursor
                    .read_i64::<LittleEndian>()
                    .map_err(|e| Error::decode(path, format!("truncated index: {e}")))?,
            );
        }
        let mut raw_values = Vec::with_capacity(count);
        for _ in 0..count {
            raw_values.push(
                cursor
                    .read_i64::<LittleEndian>()
                    .map_err(|e| Error::decode(path, format!("truncated value: {e}")))?,
            );
        }

        let scale = scales
            .get(&stream_id)
            .ok_or_else(|| Error::decode(path, format!("no scale pair for stream {stream_id}")))?;

        let epoch = quantized_epoch as f64 * scale.epoch_scale;
        let values: Vec<f64> = raw_values
            .iter()
            .map(|v| *v as f64 * scale.value_scale)
            .collect();

        measurements.push(
            SparseMeasurement::new(stream_id, epoch, indices, values)
                .map_err(|e| Error::decode(path, e.to_string()))?,
        );
    }

    Ok(measurements)
}
