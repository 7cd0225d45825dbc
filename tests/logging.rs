// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

#![allow(missing_docs)]

use std::fs;

use sparsequiver::segment::test_support::encode_segment_file;
use sparsequiver::{Collector, VecSink};

/// Installs a `fmt` subscriber and exercises a full `collect` pass so the
/// `tracing::debug!`/`warn!` events in `collector.rs`/`waiter.rs` actually
/// run through a real subscriber at least once.
#[test]
fn collect_emits_tracing_events_without_panicking() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    let dir = tempfile::tempdir().unwrap();
    let streams_dir = dir.path().join("streams");
    fs::create_dir_all(&streams_dir).unwrap();
    fs::write(
        streams_dir.join("1.json"),
        r#"{"stream_id": 1, "epoch_scale": 1.0, "value_scale": 1.0}"#,
    )
    .unwrap();
    encode_segment_file(&dir.path().join("a.seg.zst"), &[(1, 0, vec![0], vec![1])]).unwrap();
    fs::write(dir.path().join("_DONE"), []).unwrap();

    let collector = Collector::new([dir.path()]).unwrap();
    let mut sink = VecSink::new();
    let ok = collector
        .collect(&mut sink, None, Vec::<String>::new(), 0, Some(1000))
        .unwrap();

    assert!(ok);
    assert_eq!(sink.total_rows(), 1);
}

/// Exercises the completion-waiter timeout path's `tracing::warn!` event.
#[test]
fn wait_timeout_emits_tracing_warning() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    let dir = tempfile::tempdir().unwrap();
    assert!(!sparsequiver::waiter::wait_for_done([dir.path()], 1, Some(10)));
}
