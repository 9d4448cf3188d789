use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Recording,
    Paused,
}

/// Shared pause/resume flag between the capture loop and the command layer.
///
/// Transitions may arrive at any time; the capture loop reads the state
/// once per tick, so a transition during an in-flight tick takes effect on
/// the next tick. There is no queue of transitions, the most recent one
/// wins.
#[derive(Debug, Clone)]
pub struct RecordingState(Arc<AtomicU8>);

const RECORDING: u8 = 0;
const PAUSED: u8 = 1;

impl RecordingState {
    /// A fresh session starts out recording.
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(RECORDING)))
    }

    pub fn mode(&self) -> Mode {
        match self.0.load(Ordering::Acquire) {
            PAUSED => Mode::Paused,
            _ => Mode::Recording,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.mode() == Mode::Recording
    }

    pub fn pause(&self) {
        self.0.store(PAUSED, Ordering::Release);
    }

    pub fn resume(&self) {
        self.0.store(RECORDING, Ordering::Release);
    }
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_recording() {
        let state = RecordingState::new();
        assert_eq!(state.mode(), Mode::Recording);
        assert!(state.is_recording());
    }

    #[test]
    fn pause_and_resume_cycle() {
        let state = RecordingState::new();
        state.pause();
        assert_eq!(state.mode(), Mode::Paused);
        state.resume();
        assert_eq!(state.mode(), Mode::Recording);
    }

    #[test]
    fn clones_share_the_flag() {
        let state = RecordingState::new();
        let command_side = state.clone();
        command_side.pause();
        assert!(!state.is_recording());
        command_side.resume();
        assert!(state.is_recording());
    }

    #[test]
    fn latest_transition_wins() {
        let state = RecordingState::new();
        state.pause();
        state.pause();
        state.resume();
        assert_eq!(state.mode(), Mode::Recording);
    }
}
