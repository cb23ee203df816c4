//! Configuration for the assistant
//!
//! Loaded from TOML (`COPILOT_CONFIG`, else `<config dir>/copilot/config.toml`),
//! falling back to defaults for any missing section or field. Durations are
//! written in milliseconds.

use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::{CopilotError, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "COPILOT_CONFIG";

fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_millis)
}

/// Polling intervals, settle delays and recovery thresholds
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Granularity of cooperative waits (cancellation checks, speech waits)
    #[serde(deserialize_with = "millis")]
    pub poll_interval: Duration,
    /// Sleep of the listening loop when it has nothing to do
    #[serde(deserialize_with = "millis")]
    pub idle_interval: Duration,
    /// Maximum wait for speech to start
    #[serde(deserialize_with = "millis")]
    pub capture_timeout: Duration,
    /// Maximum length of one captured phrase
    #[serde(deserialize_with = "millis")]
    pub phrase_limit: Duration,
    /// Wait after stopping a rendering before the next one starts
    #[serde(deserialize_with = "millis")]
    pub speech_teardown: Duration,
    /// Wait after stop-all or entering voice mode before listening resumes
    #[serde(deserialize_with = "millis")]
    pub settle_delay: Duration,
    /// Wait between stopping and rebuilding the speech renderer
    #[serde(deserialize_with = "millis")]
    pub reinit_grace: Duration,
    /// Delay before a finished turn re-enables listening
    #[serde(deserialize_with = "millis")]
    pub resume_delay: Duration,
    /// How long a stop-chat pulse stays raised
    #[serde(deserialize_with = "millis")]
    pub chat_cancel_pulse: Duration,
    /// Pause after a capture error below the threshold
    #[serde(deserialize_with = "millis")]
    pub error_backoff: Duration,
    /// Pause once the consecutive error threshold is reached
    #[serde(deserialize_with = "millis")]
    pub error_cooldown: Duration,
    pub max_consecutive_errors: u32,
    /// Network timeout of the remote completion call
    #[serde(deserialize_with = "millis")]
    pub completion_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            idle_interval: Duration::from_millis(500),
            capture_timeout: Duration::from_secs(5),
            phrase_limit: Duration::from_secs(7),
            speech_teardown: Duration::from_millis(100),
            settle_delay: Duration::from_millis(300),
            reinit_grace: Duration::from_millis(200),
            resume_delay: Duration::from_millis(500),
            chat_cancel_pulse: Duration::from_millis(100),
            error_backoff: Duration::from_secs(1),
            error_cooldown: Duration::from_secs(5),
            max_consecutive_errors: 5,
            completion_timeout: Duration::from_secs(15),
        }
    }
}

impl Timings {
    /// Timings with every delay shrunk to a few milliseconds, for tests
    pub fn fast() -> Self {
        let tick = Duration::from_millis(5);
        Self {
            poll_interval: tick,
            idle_interval: tick,
            capture_timeout: Duration::from_millis(50),
            phrase_limit: Duration::from_millis(50),
            speech_teardown: tick,
            settle_delay: tick,
            reinit_grace: tick,
            resume_delay: tick,
            chat_cancel_pulse: tick,
            error_backoff: tick,
            error_cooldown: Duration::from_millis(20),
            max_consecutive_errors: 5,
            completion_timeout: Duration::from_secs(2),
        }
    }
}

/// What happens to the farewell when the user exits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ExitPolicy {
    /// Wait (at most `max_wait_ms`) for the farewell to finish, then terminate
    AwaitFarewell {
        #[serde(rename = "max_wait_ms", deserialize_with = "millis")]
        max_wait: Duration,
    },
    /// Wait a fixed grace period, then cut the farewell off
    Truncate {
        #[serde(rename = "grace_ms", deserialize_with = "millis")]
        grace: Duration,
    },
}

impl Default for ExitPolicy {
    fn default() -> Self {
        ExitPolicy::AwaitFarewell {
            max_wait: Duration::from_secs(5),
        }
    }
}

/// Remote completion service settings
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// OpenAI-compatible chat completions endpoint
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            max_tokens: 300,
            api_key_env: "GROQ_API_KEY".to_string(),
        }
    }
}

/// External text-to-speech program; the utterance is appended as the last argument
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub command: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        let command = if cfg!(target_os = "macos") {
            "say -r 160"
        } else {
            "espeak-ng -s 160"
        };
        Self {
            command: command.to_string(),
        }
    }
}

/// External speech recognizer.
///
/// Invoked as `<command> <timeout secs> <phrase limit secs>`; prints the
/// recognized phrase on stdout. Exit code 2 means timeout, 3 means nothing
/// understood. An empty command disables voice capture.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub command: String,
}

/// Programs and media used by built-in actions
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub text_editor: String,
    pub calculator: String,
    pub music_file: PathBuf,
    pub video_file: PathBuf,
    pub wallpaper_dir: PathBuf,
    pub downloads_dir: Option<PathBuf>,
    pub volume_steps: u32,
    pub brightness_step: u8,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        let (text_editor, calculator) = if cfg!(target_os = "windows") {
            ("notepad", "calc.exe")
        } else if cfg!(target_os = "macos") {
            ("TextEdit", "Calculator")
        } else {
            ("gedit", "gnome-calculator")
        };
        Self {
            text_editor: text_editor.to_string(),
            calculator: calculator.to_string(),
            music_file: PathBuf::from("music/sample.mp3"),
            video_file: PathBuf::from("videos/sample_video.mp4"),
            wallpaper_dir: PathBuf::from("wallpapers"),
            downloads_dir: None,
            volume_steps: 5,
            brightness_step: 20,
        }
    }
}

impl ActionsConfig {
    /// Downloads folder, defaulting to the platform's
    pub fn downloads(&self) -> Option<PathBuf> {
        self.downloads_dir.clone().or_else(dirs::download_dir)
    }
}

/// How the assistant addresses the user
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    pub user_name: Option<String>,
}

impl PersonaConfig {
    /// ` Name` or empty, for splicing into greetings
    pub fn name_suffix(&self) -> String {
        match self.user_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!(" {}", name),
            _ => String::new(),
        }
    }
}

/// Complete assistant configuration
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CopilotConfig {
    pub timings: Timings,
    pub exit: ExitPolicy,
    pub completion: CompletionConfig,
    pub speech: SpeechConfig,
    pub capture: CaptureConfig,
    pub actions: ActionsConfig,
    pub persona: PersonaConfig,
}

impl CopilotConfig {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CopilotError::Config(format!("Invalid config: {}", e)))
    }

    /// Load a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CopilotError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        info!("Loaded configuration from {}", path.display());
        Self::from_toml(&content)
    }

    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("copilot").join("config.toml"))
    }

    /// Load from `COPILOT_CONFIG` or the default path, else defaults.
    ///
    /// An explicitly named file must exist; the default path is optional.
    pub fn discover() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_exit_policy(mut self, exit: ExitPolicy) -> Self {
        self.exit = exit;
        self
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.persona.user_name = Some(name.into());
        self
    }

    pub fn with_actions(mut self, actions: ActionsConfig) -> Self {
        self.actions = actions;
        self
    }

    /// Validate values that would otherwise break the loops
    pub fn validate(&self) -> Result<()> {
        if self.timings.poll_interval.is_zero() {
            return Err(CopilotError::Config("timings.poll_interval must be positive".into()));
        }
        if self.timings.max_consecutive_errors == 0 {
            return Err(CopilotError::Config(
                "timings.max_consecutive_errors must be at least 1".into(),
            ));
        }
        if self.completion.endpoint.trim().is_empty() {
            return Err(CopilotError::Config("completion.endpoint is required".into()));
        }
        Ok(())
    }
}

/// Read the completion API key once: `.env` first, then the environment
pub fn read_api_key(var: &str) -> Option<String> {
    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env loaded: {}", e);
    }
    std::env::var(var).ok().filter(|key| !key.trim().is_empty())
}
