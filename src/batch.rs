// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Batch buffer: accumulates decoded rows column-wise and emits Arrow
//! `RecordBatch`es with the fixed leading schema plus passthrough label
//! columns. See spec §4.1.

use std::sync::Arc;

use arrow_array::builder::{BooleanBuilder, Float64Builder, Int64Builder, ListBuilder, StringBuilder};
use arrow_array::{ArrayRef, Float64Array, RecordBatch, UInt32Array};
use arrow_schema::{DataType, Field, Schema, SchemaRef};

use crate::error::{Error, Result};
use crate::metadata::{LabelMap, LabelValue};

/// Deduplicates a requested extra-column list, preserving first occurrence
/// (spec §4.5 "Column plan").
#[must_use]
pub fn plan_columns<I, S>(requested: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = std::collections::HashSet::new();
    let mut columns = Vec::new();
    for col in requested {
        let col = col.into();
        if seen.insert(col.clone()) {
            columns.push(col);
        }
    }
    columns
}

struct Row {
    stream_id: u32,
    epoch: f64,
    indices: Vec<i64>,
    values: Vec<f64>,
    extras: Vec<Option<LabelValue>>,
}

/// Accumulates appended rows until drained into a `RecordBatch`.
///
/// Buffered rows hold private copies: mutating a caller's `indices`/
/// `values` slice after `append` returns cannot change a buffered row
/// (spec §4.1, "Must not retain references").
pub struct BatchBuffer {
    columns: Vec<String>,
    capacity: usize,
    rows: Vec<Row>,
}

impl BatchBuffer {
    /// Creates a buffer with the given (already deduplicated) extra label
    /// columns and capacity. `capacity == 0` disables `is_full`.
    #[must_use]
    pub fn new(columns: Vec<String>, capacity: usize) -> Self {
        Self {
            columns,
            capacity,
            rows: Vec::new(),
        }
    }

    /// Number of rows currently buffered.
    #[must_use]
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// `true` once `size() >= capacity`, when `capacity > 0`; always
    /// `false` for `capacity == 0` (caller-driven flushing).
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.rows.len() >= self.capacity
    }

    /// Appends one decoded row, copying `indices`/`values` and pulling the
    /// configured label columns out of `metadata` (absent keys become
    /// nulls).
    pub fn append(&mut self, stream_id: u32, epoch: f64, indices: &[i64], values: &[f64], metadata: &LabelMap) {
        let extras = self
            .columns
            .iter()
            .map(|col| metadata.get(col).cloned())
            .collect();
        self.rows.push(Row {
            stream_id,
            epoch,
            indices: indices.to_vec(),
            values: values.to_vec(),
            extras,
        });
    }

    /// Assembles and returns a single batch covering every buffered row, in
    /// append order, then empties the buffer. If `schema_hint` is given,
    /// label columns are built to match its declared types rather than
    /// inferred from the buffered values.
    pub fn drain_to_batch(&mut self, schema_hint: Option<&SchemaRef>) -> Result<RecordBatch> {
        let rows = std::mem::take(&mut self.rows);

        let stream_ids = UInt32Array::from_iter(rows.iter().map(|r| Some(r.stream_id)));
        let epochs = Float64Array::from_iter(rows.iter().map(|r| Some(r.epoch)));

        let mut indices_builder = ListBuilder::new(Int64Builder::new());
        let mut values_builder = ListBuilder::new(Float64Builder::new());
        for row in &rows {
            indices_builder
                .values()
                .extend(row.indices.iter().map(|v| Some(*v)));
            indices_builder.append(true);
            values_builder
                .values()
                .extend(row.values.iter().map(|v| Some(*v)));
            values_builder.append(true);
        }

        let mut fields = vec![
            Field::new("stream_id", DataType::UInt32, false),
            Field::new("epoch", DataType::Float64, false),
            Field::new(
                "indices",
                DataType::List(Arc::new(Field::new("item", DataType::Int64, true))),
                false,
            ),
            Field::new(
                "values",
                DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
                false,
            ),
        ];
        let mut arrays: Vec<ArrayRef> = vec![
            Arc::new(stream_ids),
            Arc::new(epochs),
            Arc::new(indices_builder.finish()),
            Arc::new(values_builder.finish()),
        ];

        for (col_idx, col_name) in self.columns.iter().enumerate() {
            let hint_type = schema_hint.and_then(|s| {
                s.field_with_name(col_name)
                    .ok()
                    .map(|f| f.data_type().clone())
            });
            let cells: Vec<Option<&LabelValue>> = rows
                .iter()
                .map(|r| r.extras[col_idx].as_ref())
                .collect();
            let (data_type, array) = build_label_column(col_name, &cells, hint_type)?;
            fields.push(Field::new(col_name, data_type, true));
            arrays.push(array);
        }

        let schema = Arc::new(Schema::new(fields));
        RecordBatch::try_new(schema, arrays)
            .map_err(|e| Error::invalid(format!("failed to assemble record batch: {e}")))
    }
}

/// Picks a column type (from `hint`, or inferred from the first non-null
/// cell, falling back to `Utf8` on mixed variants) and builds the array.
fn build_label_column(
    name: &str,
    cells: &[Option<&LabelValue>],
    hint: Option<DataType>,
) -> Result<(DataType, ArrayRef)> {
    let data_type = hint.unwrap_or_else(|| infer_column_type(cells));

    let array: ArrayRef = match &data_type {
        DataType::Int64 => {
            let mut builder = Int64Builder::new();
            for cell in cells {
                match cell {
                    Some(LabelValue::Int(i)) => builder.append_value(*i),
                    Some(other) => {
                        return cast_mismatch_err(name, &data_type, other);
                    }
                    None => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::new();
            for cell in cells {
                match cell {
                    Some(LabelValue::Float(f)) => builder.append_value(*f),
                    Some(LabelValue::Int(i)) => builder.append_value(*i as f64),
                    Some(other) => return cast_mismatch_err(name, &data_type, other),
                    None => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Boolean => {
            let mut builder = BooleanBuilder::new();
            for cell in cells {
                match cell {
                    Some(LabelValue::Bool(b)) => builder.append_value(*b),
                    Some(other) => return cast_mismatch_err(name, &data_type, other),
                    None => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        _ => {
            let mut builder = StringBuilder::new();
            for cell in cells {
                match cell {
                    Some(value) => builder.append_value(value.as_string()),
                    None => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
    };

    Ok((data_type, array))
}

fn cast_mismatch_err(name: &str, data_type: &DataType, value: &LabelValue) -> Result<(DataType, ArrayRef)> {
    Err(Error::invalid(format!(
        "label column `{name}` has schema hint {data_type:?} but value {value:?} does not fit it"
    )))
}

/// Infers a single Arrow type for a label column from its buffered cells:
/// the first non-null cell's variant if every other non-null cell agrees,
/// else `Utf8` (spec §9, "string is the default").
fn infer_column_type(cells: &[Option<&LabelValue>]) -> DataType {
    let mut inferred: Option<DataType> = None;
    for cell in cells.iter().flatten() {
        let candidate = match cell {
            LabelValue::Str(_) => DataType::Utf8,
            LabelValue::Int(_) => DataType::Int64,
            LabelValue::Float(_) => DataType::Float64,
            LabelValue::Bool(_) => DataType::Boolean,
        };
        match &inferred {
            None => inferred = Some(candidate),
            Some(existing) if *existing == candidate => {}
            Some(_) => return DataType::Utf8,
        }
    }
    inferred.unwrap_or(DataType::Utf8)
}
