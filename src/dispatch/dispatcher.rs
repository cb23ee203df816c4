//! Command dispatcher
//!
//! Runs one turn: classify the command, execute exactly one branch, then hand
//! listening back. The turn contract (processing flag, deferred resume) holds
//! even when a branch panics.

use crate::config::{ExitPolicy, PersonaConfig};
use crate::dispatch::actions::ActionRunner;
use crate::dispatch::rules::{classify, Route};
use crate::integration::controls::Controls;
use crate::llm::{CompletionClient, CompletionError};
use crate::session::{normalize_command, Mode, Session, Signal};
use crate::speech::SpeechController;
use crate::utils::channels::Status;
use crate::CopilotError;
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const GENERIC_APOLOGY: &str = "Sorry, I encountered an error while processing your request.";
pub const THINKING: &str = "Let me think about that for you.";
pub const ALREADY_VOICE: &str = "I'm already in voice mode and ready to talk!";
pub const ALREADY_CHAT: &str = "Already in chat mode.";

pub struct CommandDispatcher {
    session: Session,
    speech: Arc<SpeechController>,
    completion: Arc<dyn CompletionClient>,
    controls: Controls,
    actions: ActionRunner,
    persona: PersonaConfig,
    exit: ExitPolicy,
}

impl CommandDispatcher {
    pub fn new(
        session: Session,
        speech: Arc<SpeechController>,
        completion: Arc<dyn CompletionClient>,
        controls: Controls,
        actions: ActionRunner,
        persona: PersonaConfig,
        exit: ExitPolicy,
    ) -> Self {
        Self {
            session,
            speech,
            completion,
            controls,
            actions,
            persona,
            exit,
        }
    }

    /// Start a turn for `command` and run it on a tracked task.
    ///
    /// The processing flag is set before this returns, so the listening loop
    /// never sees a gap between capture and turn. Returns false if the command
    /// was ignored.
    pub fn spawn_turn(self: &Arc<Self>, command: &str) -> bool {
        let Some(command) = self.begin(command) else {
            return false;
        };
        let dispatcher = Arc::clone(self);
        self.session.tasks.spawn("turn", move || {
            dispatcher.run_turn(&command);
        });
        true
    }

    /// Run one turn on the calling thread.
    ///
    /// Returns the route taken, or `None` if the command was ignored (empty,
    /// or the session is shutting down).
    pub fn dispatch(&self, command: &str) -> Option<Route> {
        let command = self.begin(command)?;
        Some(self.run_turn(&command))
    }

    fn begin(&self, command: &str) -> Option<String> {
        let command = normalize_command(command)?;
        if self.session.signals.is_shutdown() {
            debug!("Ignoring '{}' during shutdown", command);
            return None;
        }

        self.session.state.begin_turn();
        self.session.status(Status::Processing);
        info!("Processing command: '{}'", command);
        Some(command)
    }

    fn run_turn(&self, command: &str) -> Route {
        let route = classify(command);
        let outcome = catch_unwind(AssertUnwindSafe(|| self.execute(route, command)));
        if outcome.is_err() {
            error!("Command '{}' panicked in {:?}", command, route);
            if !self.session.signals.is_shutdown() {
                self.speech.speak(GENERIC_APOLOGY);
            }
        }

        self.finish_turn();
        route
    }

    fn execute(&self, route: Route, command: &str) {
        debug!("Route: {:?}", route);
        match route {
            Route::SwitchMode(target) => self.switch_mode(target),
            Route::Exit => self.exit(),
            Route::Builtin(action) => self.actions.run(action, &self.speech, &self.session.signals),
            Route::Fallback => self.fallback(command),
        }
    }

    fn finish_turn(&self) {
        self.session.state.end_turn();
        if !self.session.state.mode().is_voice() || self.session.signals.is_shutdown() {
            return;
        }

        // Speech still starting up resumes listening itself when it finishes
        let session = self.session.clone();
        self.session.tasks.spawn("resume", move || {
            session.sleep(session.timings.resume_delay);
            if session.state.try_resume_when_silent(session.signals.is_shutdown()) {
                session.status(Status::Listening);
                debug!("Listening resumed after turn");
            }
        });
    }

    fn switch_mode(&self, target: Mode) {
        if self.session.state.mode() == target {
            match target {
                Mode::Voice => self.speech.speak(ALREADY_VOICE),
                Mode::Chat => self.speech.speak(ALREADY_CHAT),
            }
            return;
        }
        self.controls.transition_to(target);
    }

    fn exit(&self) {
        info!("Exit requested");
        self.speech.speak_farewell(&format!(
            "Goodbye{}! It was nice talking with you. Have a great day!",
            self.persona.name_suffix()
        ));
        self.session.signals.raise(Signal::Shutdown);
        self.session.status(Status::ShuttingDown);

        match self.exit {
            ExitPolicy::AwaitFarewell { max_wait } => {
                if !self.speech.wait_until_silent(max_wait) {
                    warn!("Farewell still playing after {:?}, cutting it off", max_wait);
                    self.speech.stop();
                }
            }
            ExitPolicy::Truncate { grace } => {
                self.session.sleep(grace);
                self.speech.stop();
            }
        }
    }

    fn fallback(&self, command: &str) {
        let epoch = self.session.signals.chat_epoch();
        self.speech.speak(THINKING);
        if self.session.signals.chat_cancelled_since(epoch) {
            info!("Fallback cancelled before request");
            return;
        }

        let (tx, rx) = bounded(1);
        let client = Arc::clone(&self.completion);
        let prompt = command.to_string();
        let timeout = self.session.timings.completion_timeout;
        self.session.tasks.spawn("completion", move || {
            let _ = tx.send(client.complete(&prompt, timeout));
        });

        let result = loop {
            if self.session.signals.chat_cancelled_since(epoch) {
                info!("Fallback abandoned");
                return;
            }
            match rx.recv_timeout(self.session.timings.poll_interval) {
                Ok(result) => break result,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    break Err(CompletionError::Transport(
                        "completion task ended without a result".into(),
                    ))
                }
            }
        };

        if self.session.signals.chat_cancelled_since(epoch) {
            info!("Fallback answer discarded after cancel");
            return;
        }

        match result {
            Ok(answer) => self.speech.speak(&answer),
            Err(e) => {
                warn!("Completion failed: {}", e);
                self.speech.speak(&CopilotError::from(e).user_message());
            }
        }
    }
}
