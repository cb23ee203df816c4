//! Shared coordination state for one assistant session
//!
//! - `SignalSet`: lock-free cancel/shutdown flags
//! - `SharedSession`: the lock-protected mode/listening/speaking/processing record
//! - `CommandQueue`: typed commands waiting for the listening loop
//! - `TaskTracker`: owner of every short-lived worker thread
//! - `Sleeper`: seam for bounded delays

pub mod clock;
pub mod queue;
pub mod signals;
pub mod state;
pub mod tasks;

pub use clock::{RecordingSleeper, Sleeper, ThreadSleeper};
pub use queue::{normalize_command, CommandQueue};
pub use signals::{Signal, SignalSet};
pub use state::{Mode, SessionSnapshot, SharedSession};
pub use tasks::TaskTracker;

use crate::config::Timings;
use crate::messages::{Sender, Transcript};
use crate::utils::channels::{EventSink, Status};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Handles shared by every component of a session.
///
/// Cloning is cheap; every clone refers to the same session.
#[derive(Clone)]
pub struct Session {
    pub state: SharedSession,
    pub signals: SignalSet,
    pub queue: CommandQueue,
    pub tasks: TaskTracker,
    pub events: EventSink,
    pub transcript: Arc<dyn Transcript>,
    pub sleeper: Arc<dyn Sleeper>,
    pub timings: Timings,
}

impl Session {
    pub fn status(&self, status: Status) {
        self.events.status(status);
    }

    pub fn append_assistant(&self, text: &str) {
        self.transcript.append_entry(text, Sender::Assistant);
    }

    pub fn append_user(&self, text: &str) {
        self.transcript.append_entry(text, Sender::User);
    }

    pub fn sleep(&self, duration: Duration) {
        self.sleeper.sleep(duration);
    }

    /// Enable listening if idle in voice mode and report it
    pub fn resume_listening(&self) -> bool {
        let resumed = self.state.try_resume_listening(self.signals.is_shutdown());
        if resumed {
            self.status(Status::Listening);
            tracing::debug!("Listening resumed");
        }
        resumed
    }

    /// Poll `condition` every poll interval until it holds or `max` elapses.
    ///
    /// Wall-clock bounded so a simulated sleeper cannot make it spin forever.
    pub fn wait_for(&self, max: Duration, condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + max;
        let mut waited = Duration::ZERO;
        loop {
            if condition() {
                return true;
            }
            if waited >= max || Instant::now() >= deadline {
                return false;
            }
            self.sleep(self.timings.poll_interval);
            waited += self.timings.poll_interval;
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state.snapshot())
            .field("signals", &self.signals)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}
