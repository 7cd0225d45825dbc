// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Stream metadata: the JSON descriptors a logger directory's `streams/`
//! subdirectory holds, and the label map they carry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A single heterogeneous label/metadata cell. JSON objects, arrays, and
/// null are rejected during metadata load (spec §3 describes the label map
/// as string-keyed but leaves the value type open; see DESIGN.md for why
/// this crate restricts values to scalars).
#[derive(Debug, Clone, PartialEq)]
pub enum LabelValue {
    /// A string value.
    Str(String),
    /// A signed integer value.
    Int(i64),
    /// A floating point value.
    Float(f64),
    /// A boolean value.
    Bool(bool),
}

impl LabelValue {
    /// Renders the value as a string, used by the label-selector contract
    /// (`Rule::matches` takes string labels) and as the fallback cell
    /// representation when a label column's inferred type doesn't match.
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            LabelValue::Str(s) => s.clone(),
            LabelValue::Int(i) => i.to_string(),
            LabelValue::Float(f) => f.to_string(),
            LabelValue::Bool(b) => b.to_string(),
        }
    }

    fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(s) => Ok(LabelValue::Str(s.clone())),
            serde_json::Value::Bool(b) => Ok(LabelValue::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(LabelValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(LabelValue::Float(f))
                } else {
                    Err(Error::invalid(format!("unsupported label number: {n}")))
                }
            }
            other => Err(Error::invalid(format!(
                "label values must be scalar, got: {other}"
            ))),
        }
    }
}

/// A stream's label map: deterministic (`BTreeMap`) so output column order
/// and test assertions stay stable.
pub type LabelMap = BTreeMap<String, LabelValue>;

/// Absence of a label is equivalent to an empty string value for the
/// purposes of `Rule::matches` (spec §6).
#[must_use]
pub fn label_or_empty<'a>(labels: &'a LabelMap, key: &str) -> String {
    labels
        .get(key)
        .map(LabelValue::as_string)
        .unwrap_or_default()
}

/// Immutable descriptor for one stream within one logger directory.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMetadata {
    /// Unique (within `dir`) stream identifier.
    pub stream_id: u32,
    /// Scale used to recover the float epoch from a quantized integer.
    /// `None` if the descriptor omitted it; selecting this stream for
    /// decode without a scale present is a fatal input error (spec §4.5).
    pub epoch_scale: Option<f64>,
    /// Scale used to recover float values from quantized integers.
    pub value_scale: Option<f64>,
    /// Arbitrary string-keyed label map, including passthrough metadata.
    pub labels: LabelMap,
    /// Directory this descriptor was loaded from.
    pub dir: PathBuf,
}

const STREAM_ID_KEY: &str = "stream_id";
const EPOCH_SCALE_KEY: &str = "epoch_scale";
const VALUE_SCALE_KEY: &str = "value_scale";

impl StreamMetadata {
    /// Parses one `*.json` descriptor's contents. `stream_id` is required;
    /// `epoch_scale`/`value_scale` are optional at parse time (the
    /// collector only requires them for streams actually selected for
    /// decode, per spec §4.5) but are validated as strictly positive when
    /// present.
    pub fn parse(dir: &Path, bytes: &[u8]) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::invalid(format!("malformed stream metadata JSON: {e}")))?;
        let object = json
            .as_object()
            .ok_or_else(|| Error::invalid("stream metadata must be a JSON object"))?;

        let stream_id = object
            .get(STREAM_ID_KEY)
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| Error::invalid("stream metadata missing stream_id"))?;
        let stream_id = u32::try_from(stream_id)
            .map_err(|_| Error::invalid("stream_id does not fit in u32"))?;

        let mut epoch_scale = None;
        let mut value_scale = None;
        let mut labels = LabelMap::new();

        for (key, value) in object {
            match key.as_str() {
                STREAM_ID_KEY => continue,
                EPOCH_SCALE_KEY => {
                    epoch_scale = Some(parse_positive_scale(value, EPOCH_SCALE_KEY)?);
                }
                VALUE_SCALE_KEY => {
                    value_scale = Some(parse_positive_scale(value, VALUE_SCALE_KEY)?);
                }
                _ => {
                    let _ = labels.insert(key.clone(), LabelValue::from_json(value)?);
                }
            }
        }

        Ok(StreamMetadata {
            stream_id,
            epoch_scale,
            value_scale,
            labels,
            dir: dir.to_path_buf(),
        })
    }
}

fn parse_positive_scale(value: &serde_json::Value, key: &str) -> Result<f64> {
    let scale = value
        .as_f64()
        .ok_or_else(|| Error::invalid(format!("{key} must be a number")))?;
    if !(scale > 0.0) {
        return Err(Error::invalid(format!("{key} must be strictly positive")));
    }
    Ok(scale)
}
