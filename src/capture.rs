use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};

use crate::frames::{FrameStore, Layer};
use crate::state::RecordingState;

/// Supplies layer images from the live terminal view.
pub trait FrameSource: Send + Sync {
    fn capture(&self, layer: Layer) -> Result<Vec<u8>>;
}

/// Single release path for the session's external handles. Runs exactly
/// once, in the capture loop's terminal state.
pub trait Teardown: Send {
    fn release(self: Box<Self>) -> Result<()>;
}

/// Errors beyond this many undrained entries are dropped instead of
/// stalling the capture loop.
const ERROR_CHANNEL_CAPACITY: usize = 32;

/// What one capture run produced.
pub struct CaptureSummary {
    /// Set exactly once, when the loop terminates.
    pub total_frames: u32,
    /// Outcome of releasing the external handles. Only the terminal-host
    /// kill error survives to here; the browser-close error is discarded
    /// inside the teardown.
    pub teardown: Result<()>,
}

/// Handle to the running capture loop.
///
/// The loop runs on its own thread until [`Recorder::finish`] signals
/// cancellation. Cancellation is cooperative: a tick already in progress
/// always completes first.
pub struct Recorder {
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<CaptureSummary>>,
}

impl Recorder {
    /// Starts capturing at `framerate` frames per second. Returns the
    /// recorder handle and the capture-error stream; the caller should
    /// drain the stream for the lifetime of the recording.
    pub fn start(
        source: Arc<dyn FrameSource>,
        store: FrameStore,
        state: RecordingState,
        teardown: Box<dyn Teardown>,
        framerate: u32,
    ) -> Result<(Self, Receiver<anyhow::Error>)> {
        if framerate == 0 {
            bail!("framerate must be > 0");
        }
        let interval = Duration::from_secs_f64(1.0 / f64::from(framerate));
        let (errors, drain) = mpsc::sync_channel(ERROR_CHANNEL_CAPACITY);
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);

        let worker = thread::Builder::new()
            .name("tapedeck-capture".to_owned())
            .spawn(move || capture_loop(source, store, state, teardown, interval, flag, errors))
            .context("failed to spawn capture thread")?;

        Ok((
            Self {
                cancel,
                worker: Some(worker),
            },
            drain,
        ))
    }

    /// Cancels the loop and waits for it to tear the session down.
    pub fn finish(mut self) -> Result<CaptureSummary> {
        self.cancel.store(true, Ordering::Relaxed);
        let handle = self
            .worker
            .take()
            .ok_or_else(|| anyhow!("capture worker already joined"))?;
        handle.join().map_err(|_| anyhow!("capture worker panicked"))
    }
}

fn capture_loop(
    source: Arc<dyn FrameSource>,
    store: FrameStore,
    state: RecordingState,
    teardown: Box<dyn Teardown>,
    interval: Duration,
    cancel: Arc<AtomicBool>,
    errors: SyncSender<anyhow::Error>,
) -> CaptureSummary {
    // Give the terminal view one interval to settle before the first tick.
    thread::sleep(interval);

    let mut counter: u32 = 0;
    loop {
        if cancel.load(Ordering::Relaxed) {
            let released = teardown.release();
            drop(errors);
            return CaptureSummary {
                total_frames: counter,
                teardown: released,
            };
        }

        if !state.is_recording() {
            // Reduced polling while paused.
            thread::sleep(interval * 2);
            continue;
        }

        counter += 1;
        let start = Instant::now();
        if let Err(err) = capture_tick(source.as_ref(), &store, counter) {
            // try_send: a full buffer drops this tick's error rather than
            // stalling the cadence on a slow consumer.
            let _ = errors.try_send(err);
        }

        // Hold the cadence; an overlong tick drops straight into the next
        // one with no catch-up.
        let elapsed = start.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }
}

/// Captures and persists both layers for one frame index. All failures of
/// the tick collapse into a single error.
fn capture_tick(source: &dyn FrameSource, store: &FrameStore, index: u32) -> Result<()> {
    let cursor = source
        .capture(Layer::Cursor)
        .context("cursor capture failed");
    let text = source.capture(Layer::Text).context("text capture failed");

    match (cursor, text) {
        (Ok(cursor), Ok(text)) => {
            let cursor_write = store.write_frame(Layer::Cursor, index, &cursor);
            let text_write = store.write_frame(Layer::Text, index, &text);
            merge_tick_errors(index, [cursor_write.err(), text_write.err()])
        }
        (cursor, text) => merge_tick_errors(index, [cursor.err(), text.err()]),
    }
}

fn merge_tick_errors(index: u32, failures: [Option<anyhow::Error>; 2]) -> Result<()> {
    let messages: Vec<String> = failures
        .into_iter()
        .flatten()
        .map(|err| format!("{err:#}"))
        .collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("frame {index}: {}", messages.join("; ")))
    }
}
