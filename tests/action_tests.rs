//! Built-in action behaviour through the dispatcher

mod common;

use common::{HarnessBuilder, RecordingRenderer, StubCompletion};
use copilot::config::ActionsConfig;
use copilot::dispatch::dispatcher::GENERIC_APOLOGY;
use copilot::dispatch::{ActionError, HostActions, PowerAction, VolumeStep};
use copilot::messages::{Sender, TranscriptLog};
use copilot::session::ThreadSleeper;
use copilot::{AssistantBuilder, CopilotConfig, Mode, Signal, Timings};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn actions_in(dir: &Path) -> ActionsConfig {
    ActionsConfig {
        music_file: dir.join("sample.mp3"),
        video_file: dir.join("sample_video.mp4"),
        wallpaper_dir: dir.join("wallpapers"),
        downloads_dir: Some(dir.to_path_buf()),
        ..ActionsConfig::default()
    }
}

#[test]
fn test_brightness_is_clamped() {
    let h = HarnessBuilder::new(Mode::Chat).build();
    let dispatcher = h.assistant.dispatcher();

    h.host.set_brightness_level(90);
    dispatcher.dispatch("increase brightness");
    assert_eq!(h.host.brightness_level(), 100);

    h.host.set_brightness_level(10);
    dispatcher.dispatch("decrease brightness");
    assert_eq!(h.host.brightness_level(), 0);

    assert_eq!(
        h.transcript.texts_from(Sender::Assistant),
        vec!["Brightness increased.", "Brightness decreased."]
    );
}

#[test]
fn test_host_failure_becomes_apology() {
    let h = HarnessBuilder::new(Mode::Chat).build();
    h.host.set_failing(true);

    h.assistant.dispatcher().dispatch("lock pc");

    assert_eq!(
        h.transcript.texts_from(Sender::Assistant),
        vec!["Locking your system now.", "Sorry, I couldn't lock the system."]
    );
    assert!(!h.assistant.session().state.is_processing());
}

#[test]
fn test_unsupported_action_is_named() {
    let h = HarnessBuilder::new(Mode::Chat).build();
    h.host.fail_with(ActionError::Unsupported("volume control"));

    h.assistant.dispatcher().dispatch("volume up");

    assert_eq!(
        h.transcript.texts_from(Sender::Assistant),
        vec![
            "Increasing the volume for you.",
            "Sorry, volume control isn't available on this system."
        ]
    );
}

#[test]
fn test_media_files() {
    let dir = tempfile::tempdir().unwrap();
    let h = HarnessBuilder::new(Mode::Chat)
        .config(|c| c.with_actions(actions_in(dir.path())))
        .build();
    let dispatcher = h.assistant.dispatcher();

    dispatcher.dispatch("play music");
    assert!(h
        .transcript
        .contains(Sender::Assistant, "I couldn't find the music file."));
    assert!(h.host.calls().is_empty());

    fs::write(dir.path().join("sample.mp3"), b"id3").unwrap();
    dispatcher.dispatch("play music");
    assert!(h.transcript.contains(Sender::Assistant, "Playing your music now."));
    assert_eq!(
        h.host.calls(),
        vec![format!("open_path:{}", dir.path().join("sample.mp3").display())]
    );

    dispatcher.dispatch("play video");
    assert!(h.transcript.contains(Sender::Assistant, "Video file not found."));
}

#[test]
fn test_wallpaper_choice() {
    let dir = tempfile::tempdir().unwrap();
    let wallpapers = dir.path().join("wallpapers");
    fs::create_dir(&wallpapers).unwrap();
    let h = HarnessBuilder::new(Mode::Chat)
        .config(|c| c.with_actions(actions_in(dir.path())))
        .build();

    h.assistant.dispatcher().dispatch("change wallpaper");
    assert!(h
        .transcript
        .contains(Sender::Assistant, "I couldn't find any wallpaper images."));

    fs::write(wallpapers.join("lake.png"), b"png").unwrap();
    fs::write(wallpapers.join("readme.md"), b"md").unwrap();
    h.assistant.dispatcher().dispatch("change wallpaper");

    assert_eq!(
        h.host.calls(),
        vec![format!("wallpaper:{}", wallpapers.join("lake.png").display())]
    );
    assert!(h.transcript.contains(Sender::Assistant, "I've changed your wallpaper!"));
}

#[test]
fn test_downloads_and_launchers() {
    let dir = tempfile::tempdir().unwrap();
    let h = HarnessBuilder::new(Mode::Chat)
        .config(|c| {
            let mut actions = actions_in(dir.path());
            actions.text_editor = "gedit".to_string();
            actions.calculator = "gnome-calculator".to_string();
            c.with_actions(actions)
        })
        .build();
    let dispatcher = h.assistant.dispatcher();

    dispatcher.dispatch("open downloads");
    dispatcher.dispatch("open notepad");
    dispatcher.dispatch("calculator");
    dispatcher.dispatch("restart");
    dispatcher.dispatch("mute");

    assert_eq!(
        h.host.calls(),
        vec![
            format!("open_path:{}", dir.path().display()),
            "launch:gedit".to_string(),
            "launch:gnome-calculator".to_string(),
            "power:Restart".to_string(),
            "volume:Mute:1".to_string(),
        ]
    );
}

#[test]
fn test_shutdown_blocks_side_effects() {
    let h = HarnessBuilder::new(Mode::Chat).build();
    h.assistant.session().signals.raise(Signal::Shutdown);

    assert_eq!(h.assistant.dispatcher().dispatch("shut down"), None);
    assert!(h.host.calls().is_empty());
    assert!(h.transcript.is_empty());
}

/// Host whose every action panics
struct PanickingHost;

impl HostActions for PanickingHost {
    fn launch(&self, _program: &str) -> Result<(), ActionError> {
        panic!("launcher crashed")
    }
    fn open_path(&self, _path: &Path) -> Result<(), ActionError> {
        panic!("open crashed")
    }
    fn open_url(&self, _url: &str) -> Result<(), ActionError> {
        panic!("browser crashed")
    }
    fn volume(&self, _step: VolumeStep, _times: u32) -> Result<(), ActionError> {
        panic!("mixer crashed")
    }
    fn brightness(&self) -> Result<u8, ActionError> {
        panic!("backlight crashed")
    }
    fn set_brightness(&self, _percent: u8) -> Result<(), ActionError> {
        panic!("backlight crashed")
    }
    fn lock_workstation(&self) -> Result<(), ActionError> {
        panic!("lock crashed")
    }
    fn power(&self, _action: PowerAction) -> Result<(), ActionError> {
        panic!("power crashed")
    }
    fn set_wallpaper(&self, _path: &Path) -> Result<(), ActionError> {
        panic!("wallpaper crashed")
    }
}

#[test]
fn test_panicking_branch_is_contained() {
    let transcript = TranscriptLog::new();
    let assistant = AssistantBuilder::new()
        .with_config(CopilotConfig::default().with_timings(Timings::fast()))
        .with_mode(Mode::Voice)
        .with_transcript(Arc::new(transcript.clone()))
        .with_renderer(RecordingRenderer::instant().factory())
        .with_completion(StubCompletion::answering("unused"))
        .with_host(Arc::new(PanickingHost))
        .with_sleeper(Arc::new(ThreadSleeper))
        .build()
        .unwrap();

    assistant.dispatcher().dispatch("open google");
    assistant.session().tasks.wait_idle();
    assistant.speech().join();
    assistant.session().tasks.wait_idle();

    assert!(transcript.contains(Sender::Assistant, GENERIC_APOLOGY));
    let snapshot = assistant.session().state.snapshot();
    assert!(!snapshot.processing);
    assert!(snapshot.listening_enabled);
}
