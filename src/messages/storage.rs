use super::types::{Sender, TranscriptEntry};
use parking_lot::RwLock;
use std::sync::Arc;

/// Display collaborator: receives every transcript entry.
///
/// Implementations must not block the caller.
pub trait Transcript: Send + Sync {
    fn append_entry(&self, text: &str, sender: Sender);
}

/// In-memory transcript for the current process
#[derive(Debug, Clone)]
pub struct TranscriptLog {
    entries: Arc<RwLock<Vec<TranscriptEntry>>>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn add(&self, entry: TranscriptEntry) {
        self.entries.write().push(entry);
    }

    /// Texts of all entries from one sender, oldest first
    pub fn texts_from(&self, sender: Sender) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.sender == sender)
            .map(|e| e.text.clone())
            .collect()
    }

    pub fn contains(&self, sender: Sender, needle: &str) -> bool {
        self.entries
            .read()
            .iter()
            .any(|e| e.sender == sender && e.text.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for TranscriptLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript for TranscriptLog {
    fn append_entry(&self, text: &str, sender: Sender) {
        self.add(TranscriptEntry::new(sender, text));
    }
}

/// Transcript that prints timestamped entries to stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleTranscript;

impl ConsoleTranscript {
    pub fn new() -> Self {
        Self
    }
}

impl Transcript for ConsoleTranscript {
    fn append_entry(&self, text: &str, sender: Sender) {
        let entry = TranscriptEntry::new(sender, text);
        println!(
            "[{}] {}: {}",
            entry.timestamp.format("%H:%M:%S"),
            entry.sender,
            entry.text
        );
    }
}
