//! User control actions: stop chat, stop all, toggle mode
//!
//! None of these block the caller. The slow parts (renderer reinit, settle
//! delays, mode transitions) run as tracked tasks.

use crate::session::{Mode, Session, Signal};
use crate::speech::SpeechController;
use crate::utils::channels::{AssistantEvent, Status};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

pub const VOICE_MODE_ANNOUNCEMENT: &str =
    "Switched to voice mode. I'm ready to listen and respond to your commands.";
pub const CHAT_MODE_ANNOUNCEMENT: &str = "Switched to chat mode. You can now type your messages.";

#[derive(Clone)]
pub struct Controls {
    session: Session,
    speech: Arc<SpeechController>,
    /// Serializes mode transitions
    transition: Arc<Mutex<()>>,
}

impl Controls {
    pub fn new(session: Session, speech: Arc<SpeechController>) -> Self {
        Self {
            session,
            speech,
            transition: Arc::new(Mutex::new(())),
        }
    }

    /// Abandon the in-flight fallback answer. Speech already playing is left alone.
    pub fn request_stop_chat(&self) {
        info!("Stop chat requested");
        self.session.state.end_turn();
        self.session.signals.raise(Signal::CancelChat);
        self.session.status(Status::ChatStopped);

        let session = self.session.clone();
        self.session.tasks.spawn("stop-chat", move || {
            session.sleep(session.timings.chat_cancel_pulse);
            session.signals.clear(Signal::CancelChat);
            session.resume_listening();
        });
    }

    /// Stop everything: pending answer, speech, and the renderer itself
    pub fn request_stop_all(&self) {
        info!("Stop all requested");
        self.session.state.reset_activity();
        self.session.signals.raise(Signal::CancelChat);
        self.session.signals.raise(Signal::CancelSpeech);
        self.session.status(Status::AllStopped);

        let speech = Arc::clone(&self.speech);
        self.session.tasks.spawn("speech-reinit", move || speech.reinitialize());

        let session = self.session.clone();
        self.session.tasks.spawn("stop-all-resume", move || {
            session.sleep(session.timings.settle_delay);
            if session.state.mode().is_voice() {
                session.resume_listening();
            }
        });
    }

    /// Flip the mode; returns the mode being switched to
    pub fn request_toggle_mode(&self) -> Mode {
        let target = self.session.state.mode().toggled();
        self.transition_to(target);
        target
    }

    /// Run the mode transition protocol on a tracked task
    pub fn transition_to(&self, target: Mode) {
        let controls = self.clone();
        self.session
            .tasks
            .spawn("mode-switch", move || controls.run_transition(target));
    }

    fn run_transition(&self, target: Mode) {
        let _serial = self.transition.lock();
        if self.session.signals.is_shutdown() {
            return;
        }
        info!("Switching to {} mode", target);

        // Listening stays closed while the stop below ends the old rendering
        self.session.state.begin_transition();
        self.full_stop();
        let previous = self.session.state.set_mode(target);
        debug!("Mode {} -> {}", previous, target);
        self.session.events.emit(AssistantEvent::ModeChanged(target));

        match target {
            Mode::Voice => {
                self.session.events.emit(AssistantEvent::TextInput(false));
                self.session.sleep(self.session.timings.settle_delay);
                if self.session.signals.is_shutdown() {
                    self.session.state.finish_transition(false);
                    return;
                }
                self.session.state.finish_transition(true);
                self.session.status(Status::SwitchingToVoice);
                self.speech.speak(VOICE_MODE_ANNOUNCEMENT);
            }
            Mode::Chat => {
                self.session.events.emit(AssistantEvent::TextInput(true));
                self.session.state.finish_transition(false);
                self.session.status(Status::ChatMode);
                self.session.append_assistant(CHAT_MODE_ANNOUNCEMENT);
            }
        }
    }

    /// Preempt speech and pending answers, then clear both pulses
    fn full_stop(&self) {
        self.session.state.reset_activity();
        self.session.signals.raise(Signal::CancelChat);
        self.session.signals.raise(Signal::CancelSpeech);
        self.speech.stop();
        self.session.signals.clear(Signal::CancelChat);
        self.session.signals.clear(Signal::CancelSpeech);
    }
}
