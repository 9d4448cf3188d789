use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;

use crate::browser::TermPage;
use crate::capture::{CaptureSummary, FrameSource, Recorder, Teardown};
use crate::frames::FrameStore;
use crate::host::TerminalHost;
use crate::options::Options;
use crate::state::RecordingState;

/// Grace interval before teardown so trailing terminal-side commands can
/// finish. A command that runs longer than this must be followed by an
/// explicit sleep in the driving script.
const TEARDOWN_GRACE: Duration = Duration::from_millis(100);

/// One recording session. Owns the terminal-host and browser handles
/// (nothing else is permitted to terminate them) and walks the pipeline:
/// setup, capture gated by the recording state, teardown, then rotation,
/// render, and cleanup on the produced frame store.
pub struct Session {
    options: Options,
    page: Arc<TermPage>,
    host: TerminalHost,
    store: FrameStore,
}

impl Session {
    pub fn new(options: Options, page: TermPage, host: TerminalHost) -> Self {
        let store = FrameStore::new(&options.video.input);
        Self {
            options,
            page: Arc::new(page),
            host,
            store,
        }
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Prepares the terminal view and the frame directory. Recording must
    /// not start unless this succeeds.
    pub fn setup(&self) -> Result<()> {
        let (width, height) = self.options.capture_viewport();
        self.page.set_viewport(width, height)?;
        self.page.wait_term_ready()?;
        self.page.locate_layers()?;
        self.page.install_prompt(&self.options.prompt)?;
        self.page.apply_term_options(&self.options)?;
        self.store.init()?;
        Ok(())
    }

    /// Hands the session over to the capture loop. The returned recording
    /// carries the only release path for both external handles.
    pub fn record(self) -> Result<Recording> {
        let state = RecordingState::new();
        let source: Arc<dyn FrameSource> = Arc::clone(&self.page);
        let teardown = SessionTeardown {
            page: self.page,
            host: self.host,
        };
        let (recorder, errors) = Recorder::start(
            source,
            self.store.clone(),
            state.clone(),
            Box::new(teardown),
            self.options.video.framerate,
        )?;
        Ok(Recording {
            state,
            errors: Some(errors),
            recorder,
        })
    }
}

/// A capture loop in flight.
pub struct Recording {
    state: RecordingState,
    errors: Option<Receiver<anyhow::Error>>,
    recorder: Recorder,
}

impl Recording {
    /// Shared pause/resume handle for the command layer.
    pub fn state(&self) -> RecordingState {
        self.state.clone()
    }

    /// The bounded capture-error stream. The consumer should drain it for
    /// the lifetime of the recording; errors beyond the buffer are
    /// dropped, never queued against the capture cadence.
    pub fn take_errors(&mut self) -> Option<Receiver<anyhow::Error>> {
        self.errors.take()
    }

    /// Cancels the capture loop and waits for the session teardown it
    /// performs. The summary carries the final frame count and the
    /// teardown outcome.
    pub fn finish(self) -> Result<CaptureSummary> {
        self.recorder.finish()
    }
}

/// Removes the frame sequence if the session was configured to. Called
/// after rendering; an already-absent directory is fine.
pub fn cleanup_frames(options: &Options, store: &FrameStore) -> Result<()> {
    if !options.video.cleanup_frames {
        return Ok(());
    }
    store.remove()
}

struct SessionTeardown {
    page: Arc<TermPage>,
    host: TerminalHost,
}

impl Teardown for SessionTeardown {
    fn release(self: Box<Self>) -> Result<()> {
        thread::sleep(TEARDOWN_GRACE);
        // The browser connection is shared with whoever launched the
        // browser; closing our tab is best-effort and its error is
        // discarded. The host kill error is the one callers act on.
        let _ = self.page.close();
        self.host.kill()
    }
}
