// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Core of a sparse time-series data logger.
//!
//! This crate covers two coupled algorithms: reducing sparse measurement
//! streams into period-aligned records ([`reducer`]), and collecting
//! previously persisted, quantized segment files back into filtered Arrow
//! record batches ([`collector`]). The label-selector expression language,
//! segment writer, and output sink are external collaborators; this crate
//! only defines the [`rule::Rule`] and [`sink::RecordBatchSink`] contracts
//! they must satisfy.

pub mod batch;
pub mod collector;
pub mod error;
pub mod metadata;
pub mod reducer;
pub mod rule;
pub mod segment;
pub mod sink;
pub mod sparse;
pub mod waiter;

pub use batch::BatchBuffer;
pub use collector::Collector;
pub use error::{Error, Result};
pub use metadata::{LabelMap, LabelValue, StreamMetadata};
pub use reducer::{Emission, PeriodicKind, PeriodicReducer};
pub use rule::{FnRule, Rule};
pub use segment::{decode_segment_file, ScalePair};
pub use sink::{RecordBatchSink, VecSink};
pub use sparse::SparseMeasurement;
