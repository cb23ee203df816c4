//! Lock-free cancellation and shutdown flags
//!
//! Any component may raise a signal and every component polls them on its
//! own schedule. `CancelChat` and `CancelSpeech` are pulses: whoever raises
//! them clears them again shortly after. `Shutdown` is monotonic for the
//! lifetime of a session.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// The three coordination signals shared by every component
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Abort the in-flight fallback completion
    CancelChat,
    /// Abort the in-flight speech rendering
    CancelSpeech,
    /// Terminate the session
    Shutdown,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::CancelChat => write!(f, "cancel-chat"),
            Signal::CancelSpeech => write!(f, "cancel-speech"),
            Signal::Shutdown => write!(f, "shutdown"),
        }
    }
}

#[derive(Debug, Default)]
struct Flags {
    cancel_chat: AtomicBool,
    cancel_speech: AtomicBool,
    shutdown: AtomicBool,
    /// Bumped on every `CancelChat` raise, so a pulse that was already
    /// cleared can still be detected
    chat_epoch: AtomicU64,
}

/// Shared set of signals; cloning shares the same flags
#[derive(Clone, Debug, Default)]
pub struct SignalSet {
    flags: Arc<Flags>,
}

impl SignalSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, signal: Signal) -> &AtomicBool {
        match signal {
            Signal::CancelChat => &self.flags.cancel_chat,
            Signal::CancelSpeech => &self.flags.cancel_speech,
            Signal::Shutdown => &self.flags.shutdown,
        }
    }

    /// Raise a signal. Idempotent.
    pub fn raise(&self, signal: Signal) {
        if signal == Signal::CancelChat {
            self.flags.chat_epoch.fetch_add(1, Ordering::SeqCst);
        }
        if !self.flag(signal).swap(true, Ordering::SeqCst) {
            debug!("Signal raised: {}", signal);
        }
    }

    /// Clear a pulse signal. Clearing `Shutdown` is ignored.
    pub fn clear(&self, signal: Signal) {
        if signal == Signal::Shutdown {
            return;
        }
        self.flag(signal).store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self, signal: Signal) -> bool {
        self.flag(signal).load(Ordering::SeqCst)
    }

    /// Shorthand for `is_set(Signal::Shutdown)`
    pub fn is_shutdown(&self) -> bool {
        self.is_set(Signal::Shutdown)
    }

    /// True if speech should stop: either speech was cancelled or the session is ending
    pub fn speech_interrupted(&self) -> bool {
        self.is_set(Signal::CancelSpeech) || self.is_shutdown()
    }

    /// True if the current chat turn should be abandoned
    pub fn chat_interrupted(&self) -> bool {
        self.is_set(Signal::CancelChat) || self.is_shutdown()
    }

    /// Number of `CancelChat` raises so far
    pub fn chat_epoch(&self) -> u64 {
        self.flags.chat_epoch.load(Ordering::SeqCst)
    }

    /// True if chat was interrupted now or at any point since `epoch`
    pub fn chat_cancelled_since(&self, epoch: u64) -> bool {
        self.chat_interrupted() || self.chat_epoch() != epoch
    }
}
