//! Voice capture collaborator
//!
//! One call captures at most one phrase. Silence and unintelligible audio are
//! reported as distinct, non-fatal outcomes so the listening loop can tell
//! them apart from real device failures.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Recognizer exit code for "no speech before the timeout"
pub const EXIT_TIMEOUT: i32 = 2;
/// Recognizer exit code for "speech heard but not understood"
pub const EXIT_UNRECOGNIZED: i32 = 3;

/// Extra time granted to the recognizer process beyond its own limits
const PROCESS_SLACK: Duration = Duration::from_secs(2);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no speech before timeout")]
    Timeout,

    #[error("speech not understood")]
    Unrecognized,

    #[error("capture failed: {0}")]
    Failed(String),
}

impl CaptureError {
    /// Timeouts and unintelligible audio are normal outcomes of listening
    pub fn is_expected(&self) -> bool {
        matches!(self, CaptureError::Timeout | CaptureError::Unrecognized)
    }
}

pub trait VoiceCapture: Send + Sync {
    /// Wait up to `timeout` for speech to start, then record at most
    /// `phrase_limit` and return the recognized text.
    fn capture_utterance(
        &self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Result<String, CaptureError>;
}

/// Capture that never hears anything, for hosts without a recognizer
#[derive(Debug, Default)]
pub struct NoCapture;

impl VoiceCapture for NoCapture {
    fn capture_utterance(
        &self,
        timeout: Duration,
        _phrase_limit: Duration,
    ) -> Result<String, CaptureError> {
        // Behave like a quiet room so the loop paces itself
        std::thread::sleep(timeout);
        Err(CaptureError::Timeout)
    }
}

/// Capture backed by an external recognizer program.
///
/// Invoked as `<program> <args..> <timeout secs> <phrase limit secs>`; the
/// recognized phrase is read from stdout.
#[derive(Debug, Clone)]
pub struct CommandCapture {
    program: String,
    args: Vec<String>,
}

impl CommandCapture {
    /// Parse a shell-style command line; `None` when the line is blank
    pub fn from_command_line(line: &str) -> Result<Option<Self>, CaptureError> {
        let parts = shlex::split(line)
            .ok_or_else(|| CaptureError::Failed(format!("invalid capture command: {}", line)))?;
        let mut parts = parts.into_iter();
        Ok(parts.next().map(|program| Self {
            program,
            args: parts.collect(),
        }))
    }
}

impl VoiceCapture for CommandCapture {
    fn capture_utterance(
        &self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Result<String, CaptureError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(timeout.as_secs_f32().to_string())
            .arg(phrase_limit.as_secs_f32().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CaptureError::Failed(format!("failed to start {}: {}", self.program, e)))?;

        let deadline = Instant::now() + timeout + phrase_limit + PROCESS_SLACK;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(CaptureError::Failed(format!(
                        "{} did not finish in time",
                        self.program
                    )));
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(20)),
                Err(e) => return Err(CaptureError::Failed(e.to_string())),
            }
        };

        match status.code() {
            Some(EXIT_TIMEOUT) => return Err(CaptureError::Timeout),
            Some(EXIT_UNRECOGNIZED) => return Err(CaptureError::Unrecognized),
            _ if !status.success() => {
                return Err(CaptureError::Failed(format!("{} exited with {}", self.program, status)))
            }
            _ => {}
        }

        let mut text = String::new();
        if let Some(mut stdout) = child.stdout.take() {
            stdout
                .read_to_string(&mut text)
                .map_err(|e| CaptureError::Failed(e.to_string()))?;
        }
        let text = text.trim().to_lowercase();
        if text.is_empty() {
            return Err(CaptureError::Unrecognized);
        }
        debug!("Recognized: {}", text);
        Ok(text)
    }
}
