// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Completion waiter: blocks until every directory in a set exposes a
//! `_DONE` marker file, or a deadline elapses. See spec §4.4.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Name of the zero-byte completion marker a producer writes once it has
/// finished emitting segments to a directory.
pub const DONE_MARKER: &str = "_DONE";

/// Polls `paths` for `_DONE`, sleeping `backoff_ms` (clamped to `>= 0`)
/// between rounds, until every path has the marker or `timeout_ms`
/// elapses. An empty `paths` succeeds immediately. `timeout_ms == None`
/// waits indefinitely.
pub fn wait_for_done<I, P>(paths: I, backoff_ms: i64, timeout_ms: Option<u64>) -> bool
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut pending: HashSet<PathBuf> = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
    if pending.is_empty() {
        return true;
    }

    let sleep_for = Duration::from_millis(backoff_ms.max(0) as u64);
    let deadline = timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
    tracing::debug!(pending = pending.len(), ?timeout_ms, "waiting for completion markers");

    loop {
        pending.retain(|path| !path.join(DONE_MARKER).exists());
        if pending.is_empty() {
            tracing::debug!("all directories completed");
            return true;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                tracing::warn!(pending = pending.len(), "timed out waiting for completion markers");
                return false;
            }
        }
        std::thread::sleep(sleep_for);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_succeeds_immediately() {
        assert!(wait_for_done(Vec::<PathBuf>::new(), 1, Some(1)));
    }

    #[test]
    fn succeeds_when_marker_already_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DONE_MARKER), []).unwrap();
        assert!(wait_for_done([dir.path()], 1, Some(50)));
    }

    #[test]
    fn times_out_when_marker_never_appears() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!wait_for_done([dir.path()], 1, Some(10)));
    }

    #[test]
    fn waits_across_multiple_directories() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        std::fs::write(a.path().join(DONE_MARKER), []).unwrap();
        assert!(!wait_for_done([a.path(), b.path()], 1, Some(10)));
        std::fs::write(b.path().join(DONE_MARKER), []).unwrap();
        assert!(wait_for_done([a.path(), b.path()], 1, Some(500)));
    }
}
