// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-stream periodic reducer: collapses a sequence of sparse measurements
//! into one emitted record per period, under either latched-state or
//! additive-accumulator semantics. See spec §4.3.

use crate::error::{Error, Result};
use crate::sparse::{sort_by_index_if_needed, SparseVec};

/// One emitted, period-aligned record: the raw-logger-facing output of a
/// [`PeriodicReducer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    /// Stream the emission belongs to.
    pub stream_id: u32,
    /// Exact period boundary, `k * periodicity`.
    pub boundary_epoch: f64,
    /// Emitted indices (possibly empty, for a bin/period with no input).
    pub indices: Vec<i64>,
    /// Emitted values, same length as `indices`.
    pub values: Vec<f64>,
}

/// The two reduction semantics a [`PeriodicReducer`] can run under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodicKind {
    /// Emit the latest measurement observed strictly before each boundary
    /// (the "latched state" at that boundary).
    State,
    /// Sum all measurements whose epoch falls in a period's half-open
    /// bin, emitting the sum (or an empty record) at the period boundary.
    Accumulator,
}

#[derive(Debug)]
enum Variant {
    State { last: Option<SparseVec> },
    Accumulator {
        cur_k: Option<i64>,
        acc: Option<SparseVec>,
    },
}

/// A per-stream state machine that turns a sequence of sparse measurements
/// into one emitted record per period. See spec §4.3 for the full semantics;
/// this type implements both `State` and `Accumulator` kinds behind one
/// `next_k` counter, dispatching on the variant tag at `record`/`close`.
#[derive(Debug)]
pub struct PeriodicReducer {
    stream_id: u32,
    periodicity: f64,
    next_k: i64,
    variant: Variant,
}

impl PeriodicReducer {
    /// Creates a reducer for `stream_id` with the given `periodicity` (must
    /// be strictly positive) and `kind`.
    pub fn new(stream_id: u32, periodicity: f64, kind: PeriodicKind) -> Result<Self> {
        if !(periodicity > 0.0) {
            return Err(Error::invalid("periodicity must be positive"));
        }
        let variant = match kind {
            PeriodicKind::State => Variant::State { last: None },
            PeriodicKind::Accumulator => Variant::Accumulator {
                cur_k: None,
                acc: None,
            },
        };
        Ok(Self {
            stream_id,
            periodicity,
            next_k: 0,
            variant,
        })
    }

    /// Records one sparse measurement at `epoch`, returning any records
    /// that the boundary crossing emits. `indices`/`values` are copied
    /// before this call returns: later caller-side mutation of the
    /// original arrays cannot affect an emitted record (spec §4.3 inv. 4).
    /// Input need not already be sorted: it is stable-sorted by index if
    /// it isn't strictly increasing, matching the original reducer.
    pub fn record(&mut self, epoch: f64, indices: &[i64], values: &[f64]) -> Result<Vec<Emission>> {
        if indices.len() != values.len() {
            return Err(Error::invalid(format!(
                "indices and values have mismatched lengths: {} != {}",
                indices.len(),
                values.len()
            )));
        }
        let (indices, values) = sort_by_index_if_needed(indices.to_vec(), values.to_vec());
        let input = SparseVec::new(indices, values);

        match &mut self.variant {
            Variant::State { last } => {
                let mut emissions = Vec::new();
                while let Some(v) = last.as_ref() {
                    let boundary = self.next_k as f64 * self.periodicity;
                    if boundary >= epoch {
                        break;
                    }
                    emissions.push(Emission {
                        stream_id: self.stream_id,
                        boundary_epoch: boundary,
                        indices: v.indices.clone(),
                        values: v.values.clone(),
                    });
                    self.next_k += 1;
                }
                *last = Some(input);
                Ok(emissions)
            }
            Variant::Accumulator { cur_k, acc } => {
                let k_in = (epoch / self.periodicity).floor() as i64;
                let emissions = Self::drain_accumulator(
                    self.stream_id,
                    self.periodicity,
                    &mut self.next_k,
                    cur_k,
                    acc,
                    k_in,
                );
                if *cur_k != Some(k_in) {
                    *cur_k = Some(k_in);
                    *acc = if input.is_empty() { None } else { Some(input) };
                } else if !input.is_empty() {
                    *acc = Some(match acc.take() {
                        Some(existing) => existing.merge_sum(&input),
                        None => input,
                    });
                }
                Ok(emissions)
            }
        }
    }

    /// Flushes residual state at end-of-stream. For `State`, this includes
    /// the boundary exactly at `final_epoch` (unlike `record`, which uses a
    /// strict `<`). For `Accumulator`, this drains every bin strictly
    /// before `floor(final_epoch / periodicity)`; an in-progress bin
    /// containing `final_epoch` is left unemitted (spec §4.3.2, §9).
    pub fn close(&mut self, final_epoch: f64) -> Vec<Emission> {
        match &mut self.variant {
            Variant::State { last } => {
                let mut emissions = Vec::new();
                while let Some(v) = last.as_ref() {
                    let boundary = self.next_k as f64 * self.periodicity;
                    if boundary > final_epoch {
                        break;
                    }
                    emissions.push(Emission {
                        stream_id: self.stream_id,
                        boundary_epoch: boundary,
                        indices: v.indices.clone(),
                        values: v.values.clone(),
                    });
                    self.next_k += 1;
                }
                emissions
            }
            Variant::Accumulator { cur_k, acc } => {
                let k_in = (final_epoch / self.periodicity).floor() as i64;
                Self::drain_accumulator(
                    self.stream_id,
                    self.periodicity,
                    &mut self.next_k,
                    cur_k,
                    acc,
                    k_in,
                )
            }
        }
    }

    /// Emits every completed accumulator bin `next_k..k_in` (exclusive of
    /// `k_in`), advancing `next_k` past them. Shared by `record` and
    /// `close`, which differ only in how `k_in` is computed.
    fn drain_accumulator(
        stream_id: u32,
        periodicity: f64,
        next_k: &mut i64,
        cur_k: &mut Option<i64>,
        acc: &mut Option<SparseVec>,
        k_in: i64,
    ) -> Vec<Emission> {
        let mut emissions = Vec::new();
        while *next_k < k_in {
            let (indices, values) = if *cur_k == Some(*next_k) {
                let v = acc.take().unwrap_or_default();
                *cur_k = None;
                (v.indices, v.values)
            } else {
                (Vec::new(), Vec::new())
            };
            emissions.push(Emission {
                stream_id,
                boundary_epoch: *next_k as f64 * periodicity,
                indices,
                values,
            });
            *next_k += 1;
        }
        emissions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_periodicity() {
        assert!(PeriodicReducer::new(0, 0.0, PeriodicKind::State).is_err());
        assert!(PeriodicReducer::new(0, -1.0, PeriodicKind::State).is_err());
    }

    // S3 — periodic state.
    #[test]
    fn state_emits_latched_value_at_each_boundary() {
        let mut r = PeriodicReducer::new(1, 1.0, PeriodicKind::State).unwrap();
        let emitted = r.record(0.4, &[5], &[4.0]).unwrap();
        assert!(emitted.is_empty());
        let emitted = r.close(2.0);
        assert_eq!(
            emitted,
            vec![
                Emission {
                    stream_id: 1,
                    boundary_epoch: 1.0,
                    indices: vec![5],
                    values: vec![4.0],
                },
                Emission {
                    stream_id: 1,
                    boundary_epoch: 2.0,
                    indices: vec![5],
                    values: vec![4.0],
                },
            ]
        );
    }

    #[test]
    fn state_emits_nothing_without_any_measurement() {
        let mut r = PeriodicReducer::new(1, 1.0, PeriodicKind::State).unwrap();
        assert!(r.close(5.0).is_empty());
    }

    #[test]
    fn state_mutation_after_record_does_not_affect_emission() {
        let mut r = PeriodicReducer::new(1, 1.0, PeriodicKind::State).unwrap();
        let mut idx = vec![1_i64, 2, 3];
        let mut val = vec![1.0, 2.0, 3.0];
        let _ = r.record(0.1, &idx, &val).unwrap();
        idx[0] = 999;
        val[0] = -999.0;
        let emitted = r.close(1.0);
        assert_eq!(emitted[0].indices, vec![1, 2, 3]);
        assert_eq!(emitted[0].values, vec![1.0, 2.0, 3.0]);
    }

    // S4 — accumulator, empty bins via close.
    #[test]
    fn accumulator_sums_within_one_bin_and_closes_it() {
        let mut r = PeriodicReducer::new(2, 1.0, PeriodicKind::Accumulator).unwrap();
        assert!(r.record(0.1, &[1], &[2.0]).unwrap().is_empty());
        assert!(r.record(0.9, &[1], &[3.0]).unwrap().is_empty());
        let emitted = r.close(1.0);
        assert_eq!(
            emitted,
            vec![Emission {
                stream_id: 2,
                boundary_epoch: 0.0,
                indices: vec![1],
                values: vec![5.0],
            }]
        );
    }

    // S5 — accumulator with a skipped (empty) bin in the middle.
    #[test]
    fn accumulator_emits_empty_record_for_skipped_bin() {
        let mut r = PeriodicReducer::new(3, 1.0, PeriodicKind::Accumulator).unwrap();
        assert!(r.record(0.5, &[0], &[1.0]).unwrap().is_empty());
        let emitted = r.record(2.5, &[0], &[1.0]).unwrap();
        assert_eq!(
            emitted,
            vec![
                Emission {
                    stream_id: 3,
                    boundary_epoch: 0.0,
                    indices: vec![0],
                    values: vec![1.0],
                },
                Emission {
                    stream_id: 3,
                    boundary_epoch: 1.0,
                    indices: vec![],
                    values: vec![],
                },
            ]
        );
        let emitted = r.close(3.0);
        assert_eq!(
            emitted,
            vec![Emission {
                stream_id: 3,
                boundary_epoch: 2.0,
                indices: vec![0],
                values: vec![1.0],
            }]
        );
    }

    #[test]
    fn accumulator_in_progress_bin_at_close_is_not_emitted() {
        let mut r = PeriodicReducer::new(4, 1.0, PeriodicKind::Accumulator).unwrap();
        assert!(r.record(0.1, &[1], &[2.0]).unwrap().is_empty());
        // final_epoch lands exactly inside the open bin 0; it stays open.
        assert!(r.close(0.5).is_empty());
    }

    #[test]
    fn accumulator_mutation_after_record_does_not_affect_accumulation() {
        let mut r = PeriodicReducer::new(5, 1.0, PeriodicKind::Accumulator).unwrap();
        let mut idx = vec![1_i64];
        let mut val = vec![2.0];
        let _ = r.record(0.1, &idx, &val).unwrap();
        idx[0] = 42;
        val[0] = -5.0;
        let mut idx2 = vec![1_i64];
        let mut val2 = vec![3.0];
        let _ = r.record(0.9, &idx2, &val2).unwrap();
        idx2[0] = 42;
        val2[0] = -7.0;
        let emitted = r.close(1.0);
        assert_eq!(emitted[0].indices, vec![1]);
        assert_eq!(emitted[0].values, vec![5.0]);
    }

    #[test]
    fn emitted_period_indices_are_strictly_monotonic() {
        let mut r = PeriodicReducer::new(6, 0.5, PeriodicKind::Accumulator).unwrap();
        let mut last_k: Option<i64> = None;
        for t in [0.1, 0.6, 1.7, 2.4] {
            for e in r.record(t, &[0], &[1.0]).unwrap() {
                let k = (e.boundary_epoch / 0.5).round() as i64;
                if let Some(prev) = last_k {
                    assert!(k > prev);
                }
                last_k = Some(k);
            }
        }
        for e in r.close(3.0) {
            let k = (e.boundary_epoch / 0.5).round() as i64;
            if let Some(prev) = last_k {
                assert!(k > prev);
            }
            last_k = Some(k);
        }
    }

    #[test]
    fn record_rejects_mismatched_lengths() {
        let mut r = PeriodicReducer::new(7, 1.0, PeriodicKind::State).unwrap();
        assert!(r.record(0.0, &[1, 2], &[1.0]).is_err());
    }

    #[test]
    fn accumulator_sorts_unsorted_record_input() {
        let mut r = PeriodicReducer::new(8, 1.0, PeriodicKind::Accumulator).unwrap();
        assert!(r.record(0.1, &[3, 1, 2], &[30.0, 10.0, 20.0]).unwrap().is_empty());
        let emitted = r.close(1.0);
        assert_eq!(emitted[0].indices, vec![1, 2, 3]);
        assert_eq!(emitted[0].values, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn state_sorts_unsorted_record_input() {
        let mut r = PeriodicReducer::new(9, 1.0, PeriodicKind::State).unwrap();
        assert!(r.record(0.1, &[2, 1], &[20.0, 10.0]).unwrap().is_empty());
        let emitted = r.close(1.0);
        assert_eq!(emitted[0].indices, vec![1, 2]);
        assert_eq!(emitted[0].values, vec![10.0, 20.0]);
    }
}
