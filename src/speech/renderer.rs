//! Speech rendering collaborator and text preparation
//!
//! A renderer speaks one utterance at a time and can be told to stop from
//! another thread while `render_utterance` is blocking.

use crate::{CopilotError, Result};
use parking_lot::Mutex;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How often a running TTS process is checked for completion
const CHILD_POLL: Duration = Duration::from_millis(20);

pub trait SpeechRenderer: Send + Sync {
    /// Speak one utterance, blocking until it finishes or is stopped
    fn render_utterance(&self, text: &str) -> Result<()>;

    /// Interrupt the utterance currently being rendered, if any
    fn stop_rendering(&self);
}

/// Builds a fresh renderer; used at startup and when reinitializing after stop-all
pub type RendererFactory = Arc<dyn Fn() -> Result<Arc<dyn SpeechRenderer>> + Send + Sync>;

/// Renderer that drives an external TTS program, one process per utterance
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    child: Mutex<Option<Child>>,
    /// Bumped by every `stop_rendering`
    stops: AtomicU64,
}

impl CommandRenderer {
    /// Parse a shell-style command line such as `espeak-ng -s 160`
    pub fn from_command_line(line: &str) -> Result<Self> {
        let mut parts = shlex::split(line)
            .ok_or_else(|| CopilotError::Config(format!("Invalid speech command: {}", line)))?
            .into_iter();
        let program = parts
            .next()
            .ok_or_else(|| CopilotError::Config("Speech command is empty".into()))?;
        Ok(Self {
            program,
            args: parts.collect(),
            child: Mutex::new(None),
            stops: AtomicU64::new(0),
        })
    }

    /// Factory producing a new `CommandRenderer` for the same command line
    pub fn factory(line: impl Into<String>) -> RendererFactory {
        let line = line.into();
        Arc::new(move || {
            let renderer: Arc<dyn SpeechRenderer> =
                Arc::new(CommandRenderer::from_command_line(&line)?);
            Ok(renderer)
        })
    }
}

impl SpeechRenderer for CommandRenderer {
    fn render_utterance(&self, text: &str) -> Result<()> {
        let epoch = self.stops.load(Ordering::SeqCst);
        self.render_since(epoch, text)
    }

    fn stop_rendering(&self) {
        let child = {
            let mut slot = self.child.lock();
            self.stops.fetch_add(1, Ordering::SeqCst);
            slot.take()
        };
        if let Some(mut child) = child {
            if let Err(e) = child.kill() {
                warn!("Failed to stop TTS process: {}", e);
            }
            let _ = child.wait();
        }
    }
}

impl CommandRenderer {
    /// Speak `text` unless a stop arrived after `epoch` was read.
    ///
    /// The process is spawned and stored under the child lock, so a stop
    /// either sees it or has already bumped the epoch.
    fn render_since(&self, epoch: u64, text: &str) -> Result<()> {
        {
            let mut slot = self.child.lock();
            if self.stops.load(Ordering::SeqCst) != epoch {
                debug!("Utterance stopped before it started");
                return Ok(());
            }
            let child = Command::new(&self.program)
                .args(&self.args)
                .arg(text)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|e| {
                    CopilotError::Speech(format!("Failed to start {}: {}", self.program, e))
                })?;
            *slot = Some(child);
        }

        loop {
            {
                let mut slot = self.child.lock();
                let Some(child) = slot.as_mut() else {
                    // Taken by stop_rendering
                    debug!("Utterance stopped");
                    return Ok(());
                };
                if let Some(status) = child.try_wait()? {
                    slot.take();
                    if status.success() {
                        return Ok(());
                    }
                    return Err(CopilotError::Speech(format!(
                        "{} exited with {}",
                        self.program, status
                    )));
                }
            }
            std::thread::sleep(CHILD_POLL);
        }
    }
}

/// Renderer that produces no audio, for hosts without a TTS program
#[derive(Debug, Default)]
pub struct SilentRenderer;

impl SpeechRenderer for SilentRenderer {
    fn render_utterance(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn stop_rendering(&self) {}
}

/// Strip markdown emphasis and split text into sentence-sized utterances.
///
/// Each utterance keeps its terminating punctuation. Text without any
/// terminator becomes a single utterance.
pub fn split_utterances(text: &str) -> Vec<String> {
    let clean: String = text.chars().filter(|c| *c != '*' && *c != '_').collect();
    let clean = clean.trim();
    if clean.is_empty() {
        return Vec::new();
    }

    let mut utterances = Vec::new();
    let mut current = String::new();
    for c in clean.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            let sentence = current.trim();
            // Skip runs of punctuation like "..."
            if sentence.chars().any(char::is_alphanumeric) {
                utterances.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if rest.chars().any(char::is_alphanumeric) {
        utterances.push(rest.to_string());
    }

    if utterances.is_empty() {
        utterances.push(clean.to_string());
    }
    utterances
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences() {
        let units = split_utterances("Hello there. How are you? I'm *fine*!");
        assert_eq!(units, vec!["Hello there.", "How are you?", "I'm fine!"]);
    }

    #[test]
    fn test_split_without_terminator() {
        assert_eq!(split_utterances("just words"), vec!["just words"]);
        assert_eq!(split_utterances("One. two"), vec!["One.", "two"]);
    }

    #[test]
    fn test_split_strips_markdown_and_blank() {
        assert!(split_utterances("  ** __ ").is_empty());
        assert_eq!(split_utterances("Wait... __what__"), vec!["Wait.", "what"]);
    }

    #[test]
    fn test_command_line_parsing() {
        let renderer = CommandRenderer::from_command_line("espeak-ng -s 160 -v 'en-us'").unwrap();
        assert_eq!(renderer.program, "espeak-ng");
        assert_eq!(renderer.args, vec!["-s", "160", "-v", "en-us"]);

        assert!(CommandRenderer::from_command_line("   ").is_err());
        assert!(CommandRenderer::from_command_line("say 'unterminated").is_err());
    }

    #[test]
    fn test_missing_program_is_speech_error() {
        let renderer =
            CommandRenderer::from_command_line("definitely-not-a-tts-binary-xyz").unwrap();
        let err = renderer.render_utterance("hello").unwrap_err();
        assert!(matches!(err, CopilotError::Speech(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_before_spawn_skips_utterance() {
        let renderer = CommandRenderer::from_command_line("sh -c 'sleep 5' tts").unwrap();
        let epoch = renderer.stops.load(Ordering::SeqCst);
        renderer.stop_rendering();

        let start = std::time::Instant::now();
        renderer.render_since(epoch, "hello").unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(renderer.child.lock().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_stop_interrupts_running_utterance() {
        let renderer = Arc::new(CommandRenderer::from_command_line("sh -c 'sleep 5' tts").unwrap());
        let speaking = Arc::clone(&renderer);
        let start = std::time::Instant::now();
        let handle = std::thread::spawn(move || speaking.render_utterance("hello"));

        while renderer.child.lock().is_none() && start.elapsed() < Duration::from_secs(2) {
            std::thread::sleep(Duration::from_millis(5));
        }
        renderer.stop_rendering();

        assert!(handle.join().unwrap().is_ok());
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_stop_without_child_is_noop() {
        let renderer = CommandRenderer::from_command_line("espeak-ng").unwrap();
        renderer.stop_rendering();
        SilentRenderer.stop_rendering();
        assert!(SilentRenderer.render_utterance("x").is_ok());
    }
}
