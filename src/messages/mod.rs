pub mod storage;
pub mod types;

pub use storage::{ConsoleTranscript, Transcript, TranscriptLog};
pub use types::{Sender, TranscriptEntry};
