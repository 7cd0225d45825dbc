// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The caller-supplied batch writer contract. The writer itself (parquet,
//! Arrow IPC, or anything else) is out of scope (spec §1).

use arrow_array::RecordBatch;

use crate::error::Result;

/// Consumes record batches produced by a [`crate::collector::Collector`].
pub trait RecordBatchSink {
    /// Writes one batch. Called once per flush, in batch-emission order.
    fn write_batch(&mut self, batch: RecordBatch) -> Result<()>;
}

/// A [`RecordBatchSink`] that collects every batch it receives, useful in
/// tests.
#[derive(Debug, Default)]
pub struct VecSink {
    /// Batches received so far, in write order.
    pub batches: Vec<RecordBatch>,
}

impl VecSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows across every received batch.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

impl RecordBatchSink for VecSink {
    fn write_batch(&mut self, batch: RecordBatch) -> Result<()> {
        self.batches.push(batch);
        Ok(())
    }
}
