//! Session state shared between the listening loop, dispatcher and speech output
//!
//! The record is owned by `SharedSession` and only reachable through its
//! methods. Every method takes the single session lock exactly once, so
//! compound transitions (e.g. starting a turn) are atomic.

use parking_lot::Mutex;
use std::sync::Arc;

/// Interaction mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Spoken input, spoken output
    #[default]
    Voice,
    /// Typed input, transcript-only output
    Chat,
}

impl Mode {
    pub fn is_voice(&self) -> bool {
        matches!(self, Mode::Voice)
    }

    /// The other mode
    pub fn toggled(&self) -> Mode {
        match self {
            Mode::Voice => Mode::Chat,
            Mode::Chat => Mode::Voice,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Voice => write!(f, "voice"),
            Mode::Chat => write!(f, "chat"),
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    mode: Mode,
    listening_enabled: bool,
    speaking: bool,
    processing: bool,
    /// A mode switch is in progress; nothing may re-enable listening
    transitioning: bool,
}

/// Immutable copy of the session state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub listening_enabled: bool,
    pub speaking: bool,
    pub processing: bool,
    pub transitioning: bool,
}

impl SessionSnapshot {
    /// Voice mode with no turn, speech or mode switch in flight
    pub fn may_capture(&self) -> bool {
        self.mode.is_voice() && !self.processing && !self.speaking && !self.transitioning
    }
}

/// Thread-safe handle to the session state
#[derive(Clone, Debug, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<SessionState>>,
}

impl SharedSession {
    /// New session in voice mode with listening disabled
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mode: Mode) -> Self {
        let session = Self::new();
        session.inner.lock().mode = mode;
        session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.lock();
        SessionSnapshot {
            mode: state.mode,
            listening_enabled: state.listening_enabled,
            speaking: state.speaking,
            processing: state.processing,
            transitioning: state.transitioning,
        }
    }

    pub fn mode(&self) -> Mode {
        self.inner.lock().mode
    }

    pub fn is_listening_enabled(&self) -> bool {
        self.inner.lock().listening_enabled
    }

    pub fn is_speaking(&self) -> bool {
        self.inner.lock().speaking
    }

    pub fn is_processing(&self) -> bool {
        self.inner.lock().processing
    }

    // === Transitions ===

    /// Set the mode, returning the previous one
    pub fn set_mode(&self, mode: Mode) -> Mode {
        std::mem::replace(&mut self.inner.lock().mode, mode)
    }

    pub fn set_listening(&self, enabled: bool) {
        self.inner.lock().listening_enabled = enabled;
    }

    /// Enter the processing phase of a turn and stop listening
    pub fn begin_turn(&self) {
        let mut state = self.inner.lock();
        state.processing = true;
        state.listening_enabled = false;
    }

    pub fn end_turn(&self) {
        self.inner.lock().processing = false;
    }

    pub fn begin_speaking(&self) {
        self.inner.lock().speaking = true;
    }

    pub fn finish_speaking(&self) {
        self.inner.lock().speaking = false;
    }

    /// Drop any turn or speech markers, used by the stop protocols
    pub fn reset_activity(&self) {
        let mut state = self.inner.lock();
        state.processing = false;
        state.speaking = false;
    }

    /// Start a mode switch: listening goes off and stays off until
    /// `finish_transition`, whatever finishes speaking in between.
    pub fn begin_transition(&self) {
        let mut state = self.inner.lock();
        state.transitioning = true;
        state.listening_enabled = false;
    }

    /// End a mode switch with listening set for the new mode
    pub fn finish_transition(&self, listening: bool) {
        let mut state = self.inner.lock();
        state.transitioning = false;
        state.listening_enabled = listening;
    }

    /// Re-enable listening if the session is idle in voice mode.
    ///
    /// Returns whether listening is now enabled.
    pub fn try_resume_listening(&self, shutdown: bool) -> bool {
        let mut state = self.inner.lock();
        if shutdown || !state.mode.is_voice() || state.processing || state.transitioning {
            return false;
        }
        state.listening_enabled = true;
        true
    }

    /// Re-enable listening after speech, unless a turn is still in flight.
    ///
    /// Same as `try_resume_listening` but also refuses while speaking, for
    /// deferred resumes scheduled by the dispatcher.
    pub fn try_resume_when_silent(&self, shutdown: bool) -> bool {
        let mut state = self.inner.lock();
        if shutdown || state.transitioning || !state.mode.is_voice() {
            return false;
        }
        if state.processing || state.speaking {
            return false;
        }
        state.listening_enabled = true;
        true
    }

    /// Failsafe used by the listening loop: enable listening if the session
    /// is idle in voice mode but listening was left disabled.
    ///
    /// Returns true if a recovery happened.
    pub fn force_enable_if_idle(&self) -> bool {
        let mut state = self.inner.lock();
        let idle = !state.processing && !state.speaking && !state.transitioning;
        if state.mode.is_voice() && idle && !state.listening_enabled {
            state.listening_enabled = true;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let session = SharedSession::new();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.mode, Mode::Voice);
        assert!(!snapshot.listening_enabled);
        assert!(!snapshot.speaking);
        assert!(!snapshot.processing);
        assert!(snapshot.may_capture());
    }

    #[test]
    fn test_turn_disables_listening() {
        let session = SharedSession::new();
        session.set_listening(true);
        session.begin_turn();
        assert!(session.is_processing());
        assert!(!session.is_listening_enabled());
        assert!(!session.try_resume_listening(false));

        session.end_turn();
        assert!(session.try_resume_listening(false));
        assert!(session.is_listening_enabled());
    }

    #[test]
    fn test_resume_refused_in_chat_or_shutdown() {
        let session = SharedSession::with_mode(Mode::Chat);
        assert!(!session.try_resume_listening(false));

        session.set_mode(Mode::Voice);
        assert!(!session.try_resume_listening(true));
        assert!(session.try_resume_listening(false));
    }

    #[test]
    fn test_resume_when_silent_waits_for_speech() {
        let session = SharedSession::new();
        session.begin_speaking();
        assert!(!session.try_resume_when_silent(false));
        session.finish_speaking();
        assert!(session.try_resume_when_silent(false));
    }

    #[test]
    fn test_force_enable_only_when_idle() {
        let session = SharedSession::new();
        session.begin_speaking();
        assert!(!session.force_enable_if_idle());

        session.reset_activity();
        assert!(session.force_enable_if_idle());
        // Already enabled: nothing to recover
        assert!(!session.force_enable_if_idle());
    }

    #[test]
    fn test_transition_blocks_every_resume() {
        let session = SharedSession::new();
        session.set_listening(true);
        session.begin_transition();
        assert!(!session.is_listening_enabled());
        assert!(!session.snapshot().may_capture());

        assert!(!session.try_resume_listening(false));
        assert!(!session.try_resume_when_silent(false));
        assert!(!session.force_enable_if_idle());
        assert!(!session.is_listening_enabled());

        session.set_mode(Mode::Chat);
        session.finish_transition(false);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.mode, Mode::Chat);
        assert!(!snapshot.listening_enabled);
        assert!(!snapshot.transitioning);
    }

    #[test]
    fn test_set_mode_returns_previous() {
        let session = SharedSession::new();
        assert_eq!(session.set_mode(Mode::Chat), Mode::Voice);
        assert_eq!(session.mode(), Mode::Chat);
        assert_eq!(Mode::Chat.toggled(), Mode::Voice);
    }
}
