use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tempfile::tempdir;

use tapedeck::capture::{FrameSource, Recorder, Teardown};
use tapedeck::frames::{FrameStore, Layer};
use tapedeck::state::RecordingState;

struct SolidSource;

impl FrameSource for SolidSource {
    fn capture(&self, _layer: Layer) -> Result<Vec<u8>> {
        Ok(vec![0u8; 16])
    }
}

struct FailingSource;

impl FrameSource for FailingSource {
    fn capture(&self, layer: Layer) -> Result<Vec<u8>> {
        Err(anyhow!("{} canvas detached", layer.as_str()))
    }
}

struct NoHandles;

impl Teardown for NoHandles {
    fn release(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

struct FlagRelease(Arc<AtomicBool>);

impl Teardown for FlagRelease {
    fn release(self: Box<Self>) -> Result<()> {
        self.0.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct HostKillFailure;

impl Teardown for HostKillFailure {
    fn release(self: Box<Self>) -> Result<()> {
        Err(anyhow!("no such process"))
    }
}

fn fresh_store(dir: &std::path::Path) -> FrameStore {
    let store = FrameStore::new(dir.join("frames"));
    store.init().unwrap();
    store
}

fn assert_contiguous_pairs(store: &FrameStore, total: u32) {
    for index in 1..=total {
        for layer in Layer::ALL {
            assert!(
                store.frame_path(layer, index).is_file(),
                "missing {} frame {index} of {total}",
                layer.as_str()
            );
        }
    }
    for layer in Layer::ALL {
        assert!(!store.frame_path(layer, total + 1).exists());
    }
}

#[test]
fn uninterrupted_capture_holds_cadence() {
    let dir = tempdir().unwrap();
    let store = fresh_store(dir.path());

    let (recorder, _errors) = Recorder::start(
        Arc::new(SolidSource),
        store.clone(),
        RecordingState::new(),
        Box::new(NoHandles),
        50,
    )
    .unwrap();
    thread::sleep(Duration::from_millis(600));
    let summary = recorder.finish().unwrap();

    // 50 fps over ~0.6s, minus the settle interval up front. The cadence
    // bounds the count from above; scheduler jitter only lowers it.
    assert!(
        summary.total_frames >= 10,
        "only {} frames captured",
        summary.total_frames
    );
    assert!(
        summary.total_frames <= 32,
        "cadence exceeded: {} frames",
        summary.total_frames
    );
    assert_contiguous_pairs(&store, summary.total_frames);
    summary.teardown.unwrap();
}

#[test]
fn pause_before_first_tick_writes_nothing() {
    let dir = tempdir().unwrap();
    let store = fresh_store(dir.path());

    let state = RecordingState::new();
    state.pause();
    let (recorder, _errors) = Recorder::start(
        Arc::new(SolidSource),
        store.clone(),
        state.clone(),
        Box::new(NoHandles),
        40,
    )
    .unwrap();
    thread::sleep(Duration::from_millis(300));
    assert_eq!(fs::read_dir(store.root()).unwrap().count(), 0);

    state.resume();
    thread::sleep(Duration::from_millis(300));
    let summary = recorder.finish().unwrap();

    assert!(summary.total_frames >= 1);
    assert!(store.frame_path(Layer::Text, 1).is_file());
    assert!(store.frame_path(Layer::Cursor, 1).is_file());
    assert_contiguous_pairs(&store, summary.total_frames);
}

#[test]
fn failing_source_reports_but_never_stalls() {
    let dir = tempdir().unwrap();
    let store = fresh_store(dir.path());

    // The receiver is deliberately not drained while the loop runs: a
    // full error buffer must cost errors, not cadence.
    let (recorder, errors) = Recorder::start(
        Arc::new(FailingSource),
        store.clone(),
        RecordingState::new(),
        Box::new(NoHandles),
        100,
    )
    .unwrap();
    thread::sleep(Duration::from_millis(700));
    let summary = recorder.finish().unwrap();

    assert!(
        summary.total_frames > 40,
        "loop stalled at {} frames",
        summary.total_frames
    );
    let reported: Vec<_> = errors.iter().collect();
    assert!(!reported.is_empty());
    assert!(reported.len() < summary.total_frames as usize);
    assert!(format!("{:#}", reported[0]).contains("frame 1"));
    assert_eq!(fs::read_dir(store.root()).unwrap().count(), 0);
}

#[test]
fn finish_runs_teardown_exactly_at_cancellation() {
    let dir = tempdir().unwrap();
    let store = fresh_store(dir.path());

    let released = Arc::new(AtomicBool::new(false));
    let (recorder, _errors) = Recorder::start(
        Arc::new(SolidSource),
        store,
        RecordingState::new(),
        Box::new(FlagRelease(Arc::clone(&released))),
        30,
    )
    .unwrap();
    thread::sleep(Duration::from_millis(150));
    assert!(!released.load(Ordering::SeqCst));

    let summary = recorder.finish().unwrap();
    assert!(released.load(Ordering::SeqCst));
    summary.teardown.unwrap();
}

#[test]
fn host_kill_failure_surfaces_in_the_summary() {
    let dir = tempdir().unwrap();
    let store = fresh_store(dir.path());

    let (recorder, _errors) = Recorder::start(
        Arc::new(SolidSource),
        store,
        RecordingState::new(),
        Box::new(HostKillFailure),
        30,
    )
    .unwrap();
    thread::sleep(Duration::from_millis(100));
    let summary = recorder.finish().unwrap();
    assert!(summary.teardown.is_err());
}
