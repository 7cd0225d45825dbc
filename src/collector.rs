// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Collector: fans in stream metadata and segment files from one or more
//! logger directories into a filtered, columnar record-batch stream. See
//! spec §4.5.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::batch::{plan_columns, BatchBuffer};
use crate::error::{Error, Result};
use crate::metadata::StreamMetadata;
use crate::rule::Rule;
use crate::segment::{decode_segment_file, ScalePair};
use crate::sink::RecordBatchSink;
use crate::waiter::wait_for_done;

/// Default batch capacity, matching the original data logger's tuned
/// default (large enough to amortize per-batch overhead, small enough to
/// bound peak memory).
pub const DEFAULT_BATCH_SIZE: usize = 2048;

const STREAMS_DIR: &str = "streams";
const SEGMENT_SUFFIX: &str = ".seg.zst";

/// Orchestrates discovery, filtering, waiting, decoding, and batching
/// across a fixed set of logger directories.
pub struct Collector {
    paths: Vec<PathBuf>,
    batch_size: usize,
}

impl Collector {
    /// Creates a collector over `paths`. At least one path is required.
    pub fn new<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        if paths.is_empty() {
            return Err(Error::invalid("at least one path must be provided"));
        }
        Ok(Self {
            paths,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Overrides the batch capacity passed to the internal [`BatchBuffer`]
    /// (default: [`DEFAULT_BATCH_SIZE`]).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Decodes every selected stream across all configured directories and
    /// writes record batches to `writer`. Returns `Ok(false)` if the
    /// completion waiter times out (no partial batch is written beyond
    /// whatever had already been flushed); returns `Ok(true)` on success,
    /// including the "nothing selected" and "nothing to wait for" cases.
    pub fn collect<I, S>(
        &self,
        writer: &mut dyn RecordBatchSink,
        rule: Option<&dyn Rule>,
        columns: I,
        backoff_ms: i64,
        timeout_ms: Option<u64>,
    ) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (streams_by_path, total) = self.load_streams()?;
        tracing::debug!(directories = self.paths.len(), streams = total, "discovered stream metadata");

        let selected: HashSet<(PathBuf, u32)> = streams_by_path
            .iter()
            .flat_map(|(dir, streams)| streams.values().map(move |meta| (dir.clone(), meta.stream_id)))
            .filter(|(dir, sid)| {
                let meta = &streams_by_path[dir][sid];
                match rule {
                    Some(rule) => rule.matches(&meta.labels),
                    None => true,
                }
            })
            .collect();
        if selected.is_empty() {
            tracing::debug!("no streams matched the selection rule");
            return Ok(true);
        }

        let selected_dirs: Vec<&PathBuf> = self
            .paths
            .iter()
            .filter(|dir| selected.iter().any(|(d, _)| d == *dir))
            .collect();

        if !selected_dirs.is_empty() && !wait_for_done(selected_dirs.iter().copied(), backoff_ms, timeout_ms) {
            tracing::warn!("collect aborted: completion wait timed out");
            return Ok(false);
        }

        let columns = plan_columns(columns);
        let mut buffer = BatchBuffer::new(columns, self.batch_size);

        for dir in &selected_dirs {
            let selected_ids: HashSet<u32> = selected
                .iter()
                .filter(|(d, _)| d == *dir)
                .map(|(_, sid)| *sid)
                .collect();
            let meta_map = &streams_by_path[*dir];
            self.decode_directory(dir, &selected_ids, meta_map, writer, &mut buffer)?;
        }

        Self::flush(writer, &mut buffer)?;
        Ok(true)
    }

    /// Removes every `*.seg.zst` file under each configured path (missing
    /// files tolerated), and, when `keep_meta` is false, also removes the
    /// `streams/` subdirectory. Optionally waits for completion first.
    pub fn cleanup(
        &self,
        keep_meta: bool,
        wait_for_completion: bool,
        backoff_ms: i64,
        timeout_ms: Option<u64>,
    ) -> Result<bool> {
        if wait_for_completion && !wait_for_done(self.paths.iter(), backoff_ms, timeout_ms) {
            return Ok(false);
        }
        for base in &self.paths {
            self.remove_segments(base)?;
            if !keep_meta {
                self.remove_metadata(base)?;
            }
        }
        Ok(true)
    }

    fn load_streams(&self) -> Result<(HashMap<PathBuf, HashMap<u32, StreamMetadata>>, usize)> {
        let mut per_path: HashMap<PathBuf, HashMap<u32, StreamMetadata>> = HashMap::new();
        let mut total = 0;
        for base in &self.paths {
            let streams_dir = base.join(STREAMS_DIR);
            if !streams_dir.is_dir() {
                continue;
            }
            let mut entries: Vec<PathBuf> = fs::read_dir(&streams_dir)
                .map_err(|e| Error::io(&streams_dir, e))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
                .collect();
            entries.sort();

            let base_map = per_path.entry(base.clone()).or_default();
            for path in entries {
                let bytes = fs::read(&path).map_err(|e| Error::io(&path, e))?;
                let meta = StreamMetadata::parse(base, &bytes)?;
                total += 1;
                let _ = base_map.insert(meta.stream_id, meta);
            }
        }
        Ok((per_path, total))
    }

    #[allow(clippy::too_many_arguments)]
    fn decode_directory(
        &self,
        dir: &Path,
        selected_ids: &HashSet<u32>,
        meta_map: &HashMap<u32, StreamMetadata>,
        writer: &mut dyn RecordBatchSink,
        buffer: &mut BatchBuffer,
    ) -> Result<()> {
        if selected_ids.is_empty() {
            return Ok(());
        }
        let scales = Self::scale_pairs(meta_map)?;
        tracing::debug!(dir = %dir.display(), selected = selected_ids.len(), "decoding directory");

        let mut segment_paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| Error::io(dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(SEGMENT_SUFFIX))
            })
            .collect();
        segment_paths.sort();

        for segment_path in segment_paths {
            let measurements = decode_segment_file(&segment_path, &scales)?;
            for measurement in measurements {
                if !selected_ids.contains(&measurement.stream_id) {
                    continue;
                }
                let Some(meta) = meta_map.get(&measurement.stream_id) else {
                    continue;
                };
                buffer.append(
                    measurement.stream_id,
                    measurement.epoch,
                    &measurement.indices,
                    &measurement.values,
                    &meta.labels,
                );
                if buffer.is_full() {
                    Self::flush(writer, buffer)?;
                }
            }
        }
        Ok(())
    }

    /// Builds a `stream_id -> ScalePair` map covering every descriptor in
    /// this directory (not only the selected ones): the decoder needs a
    /// scale for any stream id that appears in a segment file, selected or
    /// not, so a missing scale anywhere in the directory is fatal.
    fn scale_pairs(meta_map: &HashMap<u32, StreamMetadata>) -> Result<HashMap<u32, ScalePair>> {
        meta_map
            .iter()
            .map(|(sid, meta)| {
                let epoch_scale = meta.epoch_scale.ok_or_else(|| {
                    Error::invalid(format!("stream {sid} metadata missing epoch_scale"))
                })?;
                let value_scale = meta.value_scale.ok_or_else(|| {
                    Error::invalid(format!("stream {sid} metadata missing value_scale"))
                })?;
                Ok((
                    *sid,
                    ScalePair {
                        epoch_scale,
                        value_scale,
                    },
                ))
            })
            .collect()
    }

    fn flush(writer: &mut dyn RecordBatchSink, buffer: &mut BatchBuffer) -> Result<()> {
        if buffer.size() == 0 {
            return Ok(());
        }
        let batch = buffer.drain_to_batch(None)?;
        writer.write_batch(batch)
    }

    fn remove_segments(&self, base: &Path) -> Result<()> {
        if !base.is_dir() {
            return Ok(());
        }
        for entry in fs::read_dir(base).map_err(|e| Error::io(base, e))? {
            let entry = entry.map_err(|e| Error::io(base, e))?;
            let path = entry.path();
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(SEGMENT_SUFFIX))
            {
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(Error::io(&path, e)),
                }
            }
        }
        Ok(())
    }

    fn remove_metadata(&self, base: &Path) -> Result<()> {
        let streams_dir = base.join(STREAMS_DIR);
        if streams_dir.is_dir() {
            match fs::remove_dir_all(&streams_dir) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(&streams_dir, e)),
            }
        }
        Ok(())
    }
}
