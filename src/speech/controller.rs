//! Speech output controller
//!
//! Owns the speech renderer and guarantees a single speaker: a new response
//! always stops and joins the previous rendering before it starts. Each
//! rendering runs on its own thread, utterance by utterance, and checks the
//! cancellation signals between utterances.

use crate::session::{Session, Signal};
use crate::speech::renderer::{split_utterances, RendererFactory, SpeechRenderer};
use crate::utils::channels::Status;
use crate::Result;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Kind of response being spoken
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Delivery {
    /// Stops on cancel-speech or shutdown
    Normal,
    /// Stops only on cancel-speech, so it survives the shutdown it announces
    Farewell,
}

struct ActiveRendering {
    handle: JoinHandle<()>,
    renderer: Arc<dyn SpeechRenderer>,
    /// Set when a newer rendering takes over the speaking flag
    superseded: Arc<AtomicBool>,
}

/// Clears the speaking flag on every exit path of a rendering thread,
/// including a panicking renderer.
struct SpeakingGuard {
    session: Session,
    superseded: Arc<AtomicBool>,
}

impl Drop for SpeakingGuard {
    fn drop(&mut self) {
        if self.superseded.load(Ordering::SeqCst) {
            return;
        }
        self.session.state.finish_speaking();
        if !self.session.resume_listening() && !self.session.signals.is_shutdown() {
            self.session.status(Status::Ready);
        }
        debug!("Speech rendering finished");
    }
}

pub struct SpeechController {
    session: Session,
    renderer: RwLock<Arc<dyn SpeechRenderer>>,
    factory: RendererFactory,
    active: Mutex<Option<ActiveRendering>>,
}

impl SpeechController {
    /// Build the controller and its first renderer from `factory`
    pub fn new(session: Session, factory: RendererFactory) -> Result<Self> {
        let renderer = factory()?;
        Ok(Self {
            session,
            renderer: RwLock::new(renderer),
            factory,
            active: Mutex::new(None),
        })
    }

    /// Show `text` in the transcript and, in voice mode, speak it.
    ///
    /// Returns once rendering has started; any earlier rendering has been
    /// fully stopped by then.
    pub fn speak(&self, text: &str) {
        self.deliver(text, Delivery::Normal);
    }

    /// Like `speak`, but the rendering keeps going after shutdown is raised
    pub fn speak_farewell(&self, text: &str) {
        self.deliver(text, Delivery::Farewell);
    }

    fn deliver(&self, text: &str, delivery: Delivery) {
        self.session.append_assistant(text);

        if !self.session.state.mode().is_voice() || self.session.signals.is_shutdown() {
            return;
        }

        let utterances = split_utterances(text);
        if utterances.is_empty() {
            return;
        }

        // Holding the slot serializes concurrent speakers
        let mut active = self.active.lock();
        self.preempt(&mut active, true);

        let renderer = Arc::clone(&*self.renderer.read());
        let superseded = Arc::new(AtomicBool::new(false));
        self.session.state.begin_speaking();

        let guard = SpeakingGuard {
            session: self.session.clone(),
            superseded: Arc::clone(&superseded),
        };
        let session = self.session.clone();
        let thread_renderer = Arc::clone(&renderer);
        let spawned = thread::Builder::new()
            .name("speech".to_string())
            .spawn(move || {
                let _guard = guard;
                render_all(&session, thread_renderer.as_ref(), &utterances, delivery);
            });

        match spawned {
            Ok(handle) => {
                *active = Some(ActiveRendering {
                    handle,
                    renderer,
                    superseded,
                });
            }
            // The guard was dropped with the closure, so speaking is already cleared
            Err(e) => error!("Failed to start speech thread: {}", e),
        }
    }

    /// Stop and join the current rendering.
    ///
    /// `superseded` tells the old rendering that a newer one owns the
    /// speaking flag from now on.
    fn preempt(&self, active: &mut Option<ActiveRendering>, superseded: bool) {
        let Some(current) = active.take() else {
            return;
        };

        if !current.handle.is_finished() {
            info!("Preempting active speech");
            current.superseded.store(superseded, Ordering::SeqCst);
            self.session.signals.raise(Signal::CancelSpeech);
            current.renderer.stop_rendering();
            self.session.sleep(self.session.timings.speech_teardown);
        }

        if current.handle.join().is_err() {
            warn!("Speech thread panicked");
        }
        self.session.signals.clear(Signal::CancelSpeech);
    }

    /// Stop any rendering in progress without starting another
    pub fn stop(&self) {
        let mut active = self.active.lock();
        self.preempt(&mut active, false);
    }

    /// Stop, wait the reinit grace, rebuild the renderer, then clear both
    /// cancellation pulses.
    pub fn reinitialize(&self) {
        self.stop();
        self.session.sleep(self.session.timings.reinit_grace);

        match (self.factory)() {
            Ok(renderer) => {
                *self.renderer.write() = renderer;
                info!("Speech renderer reinitialized");
            }
            Err(e) => error!("Speech renderer reinit failed, keeping previous: {}", e),
        }

        self.session.signals.clear(Signal::CancelSpeech);
        self.session.signals.clear(Signal::CancelChat);
    }

    /// Wait until nothing is being spoken, at most `max`.
    ///
    /// Returns true if speech finished in time.
    pub fn wait_until_silent(&self, max: Duration) -> bool {
        self.session.wait_for(max, || !self.session.state.is_speaking())
    }

    /// Join the last rendering thread without interrupting it
    pub fn join(&self) {
        let finished = self.active.lock().take();
        if let Some(current) = finished {
            if current.handle.join().is_err() {
                warn!("Speech thread panicked");
            }
        }
    }
}

fn render_all(
    session: &Session,
    renderer: &dyn SpeechRenderer,
    utterances: &[String],
    delivery: Delivery,
) {
    let interrupted = || match delivery {
        Delivery::Normal => session.signals.speech_interrupted(),
        Delivery::Farewell => session.signals.is_set(Signal::CancelSpeech),
    };

    if interrupted() {
        return;
    }
    session.status(Status::Speaking);

    for utterance in utterances {
        if interrupted() {
            debug!("Speech cancelled between utterances");
            return;
        }
        if let Err(e) = renderer.render_utterance(utterance) {
            warn!("Speech rendering failed: {}", e);
            return;
        }
    }
}
