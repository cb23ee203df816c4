//! FIFO queue of typed commands waiting for the listening loop

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Normalize user text into a command: trimmed and lowercased.
///
/// Returns `None` for blank input.
pub fn normalize_command(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Unbounded multi-producer queue of normalized commands.
///
/// Clones share the same queue. Entries are consumed exactly once by
/// whoever calls `try_pop` first.
#[derive(Clone, Debug)]
pub struct CommandQueue {
    tx: Sender<String>,
    rx: Receiver<String>,
}

impl CommandQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Normalize and enqueue a command. Returns the queued text, or `None` if blank.
    pub fn push(&self, text: &str) -> Option<String> {
        let command = normalize_command(text)?;
        // Both ends live in `self`, so the channel cannot be disconnected here
        self.tx.send(command.clone()).ok()?;
        Some(command)
    }

    pub fn try_pop(&self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_command() {
        assert_eq!(normalize_command("  Open Notepad "), Some("open notepad".to_string()));
        assert_eq!(normalize_command("   "), None);
        assert_eq!(normalize_command(""), None);
    }

    #[test]
    fn test_queue_is_fifo() {
        let queue = CommandQueue::new();
        queue.push("first");
        queue.push("Second");
        queue.push("  ");
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.try_pop().as_deref(), Some("first"));
        assert_eq!(queue.try_pop().as_deref(), Some("second"));
        assert!(queue.try_pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_each_entry_consumed_once() {
        let queue = CommandQueue::new();
        let other = queue.clone();
        queue.push("hello");
        assert_eq!(other.try_pop().as_deref(), Some("hello"));
        assert!(queue.try_pop().is_none());
    }
}
