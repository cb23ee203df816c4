//! Listening loop: the process-wide driver
//!
//! Each iteration does one thing: dispatch a queued typed command, attempt a
//! voice capture, or idle. Capture errors are counted and trigger a cooldown
//! at the threshold; only shutdown ends the loop.

use crate::capture::{CaptureError, VoiceCapture};
use crate::dispatch::CommandDispatcher;
use crate::session::Session;
use crate::utils::channels::{AssistantEvent, Status};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one loop iteration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Iteration {
    /// A queued typed command was dispatched
    Dispatched,
    /// A spoken command was captured and dispatched
    Captured,
    /// Capture ended without usable speech
    NothingHeard,
    /// Capture failed; `consecutive` failures so far
    CaptureFailed { consecutive: u32 },
    /// Failure threshold reached; cooled down and re-enabled listening
    Cooldown,
    /// Nothing to do this round
    Idle,
    Shutdown,
}

pub struct ListeningLoop {
    session: Session,
    capture: Arc<dyn VoiceCapture>,
    dispatcher: Arc<CommandDispatcher>,
    consecutive_errors: u32,
}

impl ListeningLoop {
    pub fn new(
        session: Session,
        capture: Arc<dyn VoiceCapture>,
        dispatcher: Arc<CommandDispatcher>,
    ) -> Self {
        Self {
            session,
            capture,
            dispatcher,
            consecutive_errors: 0,
        }
    }

    /// Iterate until shutdown, then report termination
    pub fn run(mut self) {
        info!("Listening loop started");
        while self.run_iteration() != Iteration::Shutdown {}
        self.session.events.emit(AssistantEvent::Terminated);
        info!("Listening loop stopped");
    }

    pub fn run_iteration(&mut self) -> Iteration {
        if self.session.signals.is_shutdown() {
            return Iteration::Shutdown;
        }
        self.session.tasks.reap();

        // Typed input always wins over capture
        if let Some(command) = self.session.queue.try_pop() {
            debug!("Dequeued typed command: '{}'", command);
            self.dispatcher.spawn_turn(&command);
            return Iteration::Dispatched;
        }

        let snapshot = self.session.state.snapshot();
        if !snapshot.may_capture() {
            self.session.sleep(self.session.timings.idle_interval);
            return Iteration::Idle;
        }

        if !snapshot.listening_enabled && self.session.state.force_enable_if_idle() {
            warn!("Listening was left disabled while idle, re-enabling");
            self.session.status(Status::AutoResumed);
        }

        self.capture_once()
    }

    fn capture_once(&mut self) -> Iteration {
        let timings = &self.session.timings;
        self.session.status(Status::Listening);

        let capture = Arc::clone(&self.capture);
        let (timeout, phrase_limit) = (timings.capture_timeout, timings.phrase_limit);
        let result =
            catch_unwind(AssertUnwindSafe(|| capture.capture_utterance(timeout, phrase_limit)))
                .unwrap_or_else(|_| Err(CaptureError::Failed("capture panicked".into())));

        if self.session.signals.is_shutdown() {
            return Iteration::Shutdown;
        }

        match result {
            Ok(text) => {
                self.consecutive_errors = 0;
                if text.trim().is_empty() {
                    return Iteration::NothingHeard;
                }
                info!("Heard: '{}'", text);
                self.session.status(Status::Heard);
                self.session.append_user(&text);
                self.session.state.set_listening(false);
                self.dispatcher.spawn_turn(&text);
                Iteration::Captured
            }
            Err(e) if e.is_expected() => {
                self.consecutive_errors = 0;
                if e == CaptureError::Unrecognized {
                    self.session.status(Status::DidNotCatch);
                }
                Iteration::NothingHeard
            }
            Err(e) => {
                self.consecutive_errors += 1;
                warn!("Capture error ({} in a row): {}", self.consecutive_errors, e);
                self.session.status(Status::CaptureError);

                if self.consecutive_errors >= self.session.timings.max_consecutive_errors {
                    warn!(
                        "Too many consecutive capture errors ({}), cooling down",
                        self.consecutive_errors
                    );
                    self.session.status(Status::ErrorRecovery);
                    self.session.sleep(self.session.timings.error_cooldown);
                    // The user may have left voice mode during the cooldown
                    self.session.resume_listening();
                    self.consecutive_errors = 0;
                    self.session.status(Status::Recovered);
                    return Iteration::Cooldown;
                }

                self.session.sleep(self.session.timings.error_backoff);
                Iteration::CaptureFailed {
                    consecutive: self.consecutive_errors,
                }
            }
        }
    }
}
