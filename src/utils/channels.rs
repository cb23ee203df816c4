//! Event stream from the assistant core to whatever front-end is attached

use crate::session::Mode;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Status shown to the user
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Starting,
    Ready,
    Listening,
    Heard,
    DidNotCatch,
    CaptureError,
    Processing,
    Speaking,
    ChatStopped,
    AllStopped,
    SwitchingToVoice,
    ChatMode,
    AutoResumed,
    ErrorRecovery,
    Recovered,
    ShuttingDown,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Status::Starting => "Starting...",
            Status::Ready => "Ready",
            Status::Listening => "Listening",
            Status::Heard => "Processing speech...",
            Status::DidNotCatch => "Didn't catch that",
            Status::CaptureError => "Error",
            Status::Processing => "Processing",
            Status::Speaking => "Speaking",
            Status::ChatStopped => "Chat Stopped",
            Status::AllStopped => "All Stopped",
            Status::SwitchingToVoice => "Switching to Voice",
            Status::ChatMode => "Chat Mode",
            Status::AutoResumed => "Auto-resumed",
            Status::ErrorRecovery => "Error Recovery",
            Status::Recovered => "Recovered",
            Status::ShuttingDown => "Shutting down",
        };
        write!(f, "{}", text)
    }
}

/// Notifications emitted by the assistant core
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssistantEvent {
    /// Display status changed
    Status(Status),
    /// Mode flipped
    ModeChanged(Mode),
    /// Text-input surface should be shown (`true`) or hidden
    TextInput(bool),
    /// Listening loop has exited
    Terminated,
}

/// Fire-and-forget sender for assistant events.
///
/// Sending never blocks; if nobody listens the event is dropped.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: Sender<AssistantEvent>,
}

impl EventSink {
    pub fn emit(&self, event: AssistantEvent) {
        let _ = self.tx.send(event);
    }

    pub fn status(&self, status: Status) {
        self.emit(AssistantEvent::Status(status));
    }
}

/// Create a connected event sink and receiver
pub fn event_channel() -> (EventSink, Receiver<AssistantEvent>) {
    let (tx, rx) = unbounded();
    (EventSink { tx }, rx)
}
