//! Built-in actions: one side effect plus a spoken confirmation
//!
//! Failures never escape an action; they become a spoken apology. Every
//! action checks for shutdown right before touching the host.

use crate::config::{ActionsConfig, PersonaConfig};
use crate::dispatch::host::{ActionError, HostActions, PowerAction, VolumeStep};
use crate::dispatch::rules::Builtin;
use crate::session::SignalSet;
use crate::speech::SpeechController;
use crate::CopilotError;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

const GOOGLE_URL: &str = "https://www.google.com";
const YOUTUBE_URL: &str = "https://www.youtube.com";

/// Runs built-in actions against a host
pub struct ActionRunner {
    host: Arc<dyn HostActions>,
    config: ActionsConfig,
    persona: PersonaConfig,
}

impl ActionRunner {
    pub fn new(host: Arc<dyn HostActions>, config: ActionsConfig, persona: PersonaConfig) -> Self {
        Self { host, config, persona }
    }

    pub fn run(&self, action: Builtin, speech: &SpeechController, signals: &SignalSet) {
        info!("Built-in action: {:?}", action);
        let step = ActionStep { speech, signals };

        match action {
            Builtin::Greeting => speech.speak(&format!(
                "Hello{}! I'm your assistant. How can I help you today?",
                self.persona.name_suffix()
            )),
            Builtin::Wellbeing => speech.speak(
                "I'm doing great, thank you for asking! I'm here and ready to help you with anything you need.",
            ),
            Builtin::Notepad => step.announce_then(
                "Opening Notepad for you.",
                "Sorry, I couldn't open the text editor.",
                || self.host.launch(&self.config.text_editor),
            ),
            Builtin::Calculator => step.announce_then(
                "Opening Calculator.",
                "Sorry, I couldn't open the calculator.",
                || self.host.launch(&self.config.calculator),
            ),
            Builtin::PlayMusic => {
                if self.config.music_file.exists() {
                    step.announce_then(
                        "Playing your music now.",
                        "Sorry, I couldn't play the music.",
                        || self.host.open_path(&self.config.music_file),
                    );
                } else {
                    speech.speak("I couldn't find the music file. Please check if it exists.");
                }
            }
            Builtin::PlayVideo => {
                if self.config.video_file.exists() {
                    step.announce_then(
                        "Starting your video.",
                        "Sorry, I couldn't play the video.",
                        || self.host.open_path(&self.config.video_file),
                    );
                } else {
                    speech.speak("Video file not found. Please check the file path.");
                }
            }
            Builtin::VolumeUp => step.announce_then(
                "Increasing the volume for you.",
                "Sorry, I couldn't change the volume.",
                || self.host.volume(VolumeStep::Up, self.config.volume_steps),
            ),
            Builtin::VolumeDown => step.announce_then(
                "Decreasing the volume.",
                "Sorry, I couldn't change the volume.",
                || self.host.volume(VolumeStep::Down, self.config.volume_steps),
            ),
            Builtin::Mute => step.announce_then(
                "Muting the volume.",
                "Sorry, I couldn't change the volume.",
                || self.host.volume(VolumeStep::Mute, 1),
            ),
            Builtin::Lock => step.announce_then(
                "Locking your system now.",
                "Sorry, I couldn't lock the system.",
                || self.host.lock_workstation(),
            ),
            Builtin::HostShutdown => step.announce_then(
                "Shutting down the system. Goodbye!",
                "Sorry, I couldn't shut down the system.",
                || self.host.power(PowerAction::Shutdown),
            ),
            Builtin::HostRestart => step.announce_then(
                "Restarting the system.",
                "Sorry, I couldn't restart the system.",
                || self.host.power(PowerAction::Restart),
            ),
            Builtin::Downloads => match self.config.downloads() {
                Some(path) => step.announce_then(
                    "Opening your downloads folder.",
                    "Sorry, I couldn't open your downloads folder.",
                    || self.host.open_path(&path),
                ),
                None => speech.speak("Sorry, I couldn't find your downloads folder."),
            },
            Builtin::Google => step.announce_then(
                "Opening Google for you.",
                "Sorry, I couldn't open the browser.",
                || self.host.open_url(GOOGLE_URL),
            ),
            Builtin::Youtube => step.announce_then(
                "Opening YouTube.",
                "Sorry, I couldn't open the browser.",
                || self.host.open_url(YOUTUBE_URL),
            ),
            Builtin::BrightnessUp => step.act_then(
                "Brightness increased.",
                "Sorry, I couldn't change the brightness.",
                || self.shift_brightness(i16::from(self.config.brightness_step)),
            ),
            Builtin::BrightnessDown => step.act_then(
                "Brightness decreased.",
                "Sorry, I couldn't change the brightness.",
                || self.shift_brightness(-i16::from(self.config.brightness_step)),
            ),
            Builtin::Wallpaper => self.change_wallpaper(&step),
        }
    }

    fn shift_brightness(&self, delta: i16) -> Result<(), ActionError> {
        let current = i16::from(self.host.brightness()?);
        let target = (current + delta).clamp(0, 100) as u8;
        self.host.set_brightness(target)
    }

    fn change_wallpaper(&self, step: &ActionStep<'_>) {
        let images = match wallpaper_candidates(&self.config.wallpaper_dir) {
            Ok(images) => images,
            Err(e) => {
                warn!("Wallpaper folder unreadable: {}", e);
                step.speech.speak("Sorry, I couldn't change the wallpaper.");
                return;
            }
        };
        let Some(chosen) = images.choose(&mut rand::thread_rng()) else {
            step.speech.speak("I couldn't find any wallpaper images.");
            return;
        };
        step.act_then(
            "I've changed your wallpaper!",
            "Sorry, I couldn't change the wallpaper.",
            || self.host.set_wallpaper(chosen),
        );
    }
}

/// `.jpg` and `.png` files directly inside `dir`
pub fn wallpaper_candidates(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("png"))
                .unwrap_or(false)
        })
        .collect();
    images.sort();
    Ok(images)
}

struct ActionStep<'a> {
    speech: &'a SpeechController,
    signals: &'a SignalSet,
}

impl ActionStep<'_> {
    /// Speak first, then perform the side effect
    fn announce_then(
        &self,
        announcement: &str,
        apology: &str,
        effect: impl FnOnce() -> Result<(), ActionError>,
    ) {
        self.speech.speak(announcement);
        if self.signals.is_shutdown() {
            return;
        }
        if let Err(e) = effect() {
            self.apologize(apology, e);
        }
    }

    /// Perform the side effect, then report the outcome
    fn act_then(
        &self,
        confirmation: &str,
        apology: &str,
        effect: impl FnOnce() -> Result<(), ActionError>,
    ) {
        if self.signals.is_shutdown() {
            return;
        }
        match effect() {
            Ok(()) => self.speech.speak(confirmation),
            Err(e) => self.apologize(apology, e),
        }
    }

    /// Missing platform support is named; other failures get the action's own apology
    fn apologize(&self, apology: &str, error: ActionError) {
        warn!("Action failed: {}", error);
        match error {
            ActionError::Unsupported(_) => {
                self.speech.speak(&CopilotError::from(error).user_message())
            }
            _ => self.speech.speak(apology),
        }
    }
}
