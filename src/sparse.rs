// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Sparse vector types and the merge-sum algebra the periodic reducer needs.

use crate::error::{Error, Result};

/// One sparse measurement for a stream: a set of `(index, value)` pairs
/// observed at a single `epoch`.
///
/// `indices` must be strictly increasing and the same length as `values`;
/// both invariants are enforced by [`SparseMeasurement::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMeasurement {
    /// Owning stream id.
    pub stream_id: u32,
    /// Measurement epoch, in the stream's own floating-point time units.
    pub epoch: f64,
    /// Strictly increasing index array.
    pub indices: Vec<i64>,
    /// Value array, same length as `indices`.
    pub values: Vec<f64>,
}

impl SparseMeasurement {
    /// Builds a measurement, validating the shared invariants from
    /// spec §3: equal lengths and strictly increasing indices.
    pub fn new(stream_id: u32, epoch: f64, indices: Vec<i64>, values: Vec<f64>) -> Result<Self> {
        if indices.len() != values.len() {
            return Err(Error::invalid(format!(
                "indices and values have mismatched lengths: {} != {}",
                indices.len(),
                values.len()
            )));
        }
        if !indices.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::invalid("indices must be strictly increasing"));
        }
        Ok(Self {
            stream_id,
            epoch,
            indices,
            values,
        })
    }
}

/// Stable-sorts `(indices, values)` by index if `indices` is not already
/// strictly increasing, leaving already-sorted input untouched. Mirrors
/// the original reducer's `record`, which accepts unsorted input and
/// stable-sorts it before accumulating (ties keep their original relative
/// order).
pub(crate) fn sort_by_index_if_needed(indices: Vec<i64>, values: Vec<f64>) -> (Vec<i64>, Vec<f64>) {
    if indices.windows(2).all(|w| w[0] < w[1]) {
        return (indices, values);
    }
    let mut paired: Vec<(i64, f64)> = indices.into_iter().zip(values).collect();
    paired.sort_by_key(|(idx, _)| *idx);
    paired.into_iter().unzip()
}

/// A sparse vector without the stream/epoch envelope: just sorted indices
/// and their values. Used internally by the periodic reducer to hold
/// latched state and in-flight accumulator sums.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SparseVec {
    pub indices: Vec<i64>,
    pub values: Vec<f64>,
}

impl SparseVec {
    pub(crate) fn new(indices: Vec<i64>, values: Vec<f64>) -> Self {
        Self { indices, values }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Sparse element-wise union-sum: the union of both index sets, with
    /// overlapping indices summed and non-overlapping indices carried
    /// through unchanged. Output indices are strictly ascending (spec §4.3).
    pub(crate) fn merge_sum(&self, other: &SparseVec) -> SparseVec {
        let mut indices = Vec::with_capacity(self.indices.len() + other.indices.len());
        let mut values = Vec::with_capacity(self.indices.len() + other.indices.len());

        let (mut i, mut j) = (0, 0);
        while i < self.indices.len() && j < other.indices.len() {
            let (a, b) = (self.indices[i], other.indices[j]);
            match a.cmp(&b) {
                std::cmp::Ordering::Less => {
                    indices.push(a);
                    values.push(self.values[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    indices.push(b);
                    values.push(other.values[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    indices.push(a);
                    values.push(self.values[i] + other.values[j]);
                    i += 1;
                    j += 1;
                }
            }
        }
        indices.extend_from_slice(&self.indices[i..]);
        values.extend_from_slice(&self.values[i..]);
        indices.extend_from_slice(&other.indices[j..]);
        values.extend_from_slice(&other.values[j..]);

        SparseVec { indices, values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_lengths() {
        let err = SparseMeasurement::new(0, 0.0, vec![1, 2], vec![1.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn rejects_non_increasing_indices() {
        let err = SparseMeasurement::new(0, 0.0, vec![2, 1], vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn merge_sum_overlapping_and_disjoint() {
        let a = SparseVec::new(vec![1, 3, 5], vec![1.0, 2.0, 3.0]);
        let b = SparseVec::new(vec![2, 3, 6], vec![10.0, 20.0, 30.0]);
        let merged = a.merge_sum(&b);
        assert_eq!(merged.indices, vec![1, 2, 3, 5, 6]);
        assert_eq!(merged.values, vec![1.0, 10.0, 22.0, 3.0, 30.0]);
    }

    #[test]
    fn merge_sum_with_empty() {
        let a = SparseVec::new(vec![1], vec![4.0]);
        let empty = SparseVec::default();
        assert_eq!(a.merge_sum(&empty), a);
        assert_eq!(empty.merge_sum(&a), a);
    }

    #[test]
    fn sort_by_index_if_needed_leaves_sorted_input_alone() {
        let (idx, vals) = sort_by_index_if_needed(vec![1, 2, 3], vec![10.0, 20.0, 30.0]);
        assert_eq!(idx, vec![1, 2, 3]);
        assert_eq!(vals, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn sort_by_index_if_needed_sorts_unsorted_input_stably() {
        let (idx, vals) = sort_by_index_if_needed(vec![3, 1, 2], vec![30.0, 10.0, 20.0]);
        assert_eq!(idx, vec![1, 2, 3]);
        assert_eq!(vals, vec![10.0, 20.0, 30.0]);
    }
}
