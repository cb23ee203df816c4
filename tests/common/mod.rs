//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use copilot::capture::{CaptureError, VoiceCapture};
use copilot::dispatch::{ActionError, HostActions, PowerAction, VolumeStep};
use copilot::llm::{CompletionClient, CompletionError};
use copilot::messages::TranscriptLog;
use copilot::session::{Sleeper, ThreadSleeper};
use copilot::speech::{RendererFactory, SpeechRenderer};
use copilot::{Assistant, AssistantBuilder, CopilotConfig, Mode, Timings};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Capture that replays a script, then reports silence
pub struct ScriptedCapture {
    script: Mutex<VecDeque<Result<String, CaptureError>>>,
    calls: AtomicUsize,
}

impl ScriptedCapture {
    pub fn new(script: Vec<Result<String, CaptureError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn silent() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn push(&self, item: Result<String, CaptureError>) {
        self.script.lock().push_back(item);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl VoiceCapture for ScriptedCapture {
    fn capture_utterance(
        &self,
        _timeout: Duration,
        _phrase_limit: Duration,
    ) -> Result<String, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        match next {
            Some(item) => item,
            None => {
                std::thread::sleep(Duration::from_millis(2));
                Err(CaptureError::Timeout)
            }
        }
    }
}

/// Renderer that holds each utterance for a fixed time unless stopped
pub struct RecordingRenderer {
    hold: Duration,
    stop_epoch: AtomicU64,
    rendered: Mutex<Vec<String>>,
    /// (utterance, started) / (utterance, finished) in order
    timeline: Mutex<Vec<(String, bool)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    fail: AtomicBool,
}

impl RecordingRenderer {
    pub fn new(hold: Duration) -> Arc<Self> {
        Arc::new(Self {
            hold,
            stop_epoch: AtomicU64::new(0),
            rendered: Mutex::new(Vec::new()),
            timeline: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }

    pub fn instant() -> Arc<Self> {
        Self::new(Duration::ZERO)
    }

    pub fn factory(self: &Arc<Self>) -> RendererFactory {
        let renderer = Arc::clone(self);
        Arc::new(move || {
            let renderer: Arc<dyn SpeechRenderer> = renderer.clone();
            Ok(renderer)
        })
    }

    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().clone()
    }

    pub fn timeline(&self) -> Vec<(String, bool)> {
        self.timeline.lock().clone()
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u64 {
        self.stop_epoch.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl SpeechRenderer for RecordingRenderer {
    fn render_utterance(&self, text: &str) -> copilot::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(copilot::CopilotError::Speech("no audio device".into()));
        }
        let epoch = self.stop_epoch.load(Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.rendered.lock().push(text.to_string());
        self.timeline.lock().push((text.to_string(), true));

        let start = Instant::now();
        while start.elapsed() < self.hold && self.stop_epoch.load(Ordering::SeqCst) == epoch {
            std::thread::sleep(Duration::from_millis(1));
        }

        self.timeline.lock().push((text.to_string(), false));
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop_rendering(&self) {
        self.stop_epoch.fetch_add(1, Ordering::SeqCst);
    }
}

/// Completion stub with a fixed answer and an optional delay
pub struct StubCompletion {
    answer: Result<String, CompletionError>,
    delay: Duration,
    prompts: Mutex<Vec<String>>,
}

impl StubCompletion {
    pub fn answering(answer: &str) -> Arc<Self> {
        Self::with(Ok(answer.to_string()), Duration::ZERO)
    }

    pub fn failing(error: CompletionError) -> Arc<Self> {
        Self::with(Err(error), Duration::ZERO)
    }

    pub fn with(answer: Result<String, CompletionError>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            answer,
            delay,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

impl CompletionClient for StubCompletion {
    fn complete(&self, prompt: &str, _timeout: Duration) -> Result<String, CompletionError> {
        self.prompts.lock().push(prompt.to_string());
        std::thread::sleep(self.delay);
        self.answer.clone()
    }
}

/// Host that records every call instead of touching the system
pub struct RecordingHost {
    calls: Mutex<Vec<String>>,
    brightness: Mutex<u8>,
    failure: Mutex<Option<ActionError>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            brightness: Mutex::new(50),
            failure: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn set_brightness_level(&self, percent: u8) {
        *self.brightness.lock() = percent;
    }

    pub fn brightness_level(&self) -> u8 {
        *self.brightness.lock()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.failure.lock() = fail.then(|| ActionError::Command {
            program: "host".into(),
            reason: "refused".into(),
        });
    }

    /// Fail every following call with `error`
    pub fn fail_with(&self, error: ActionError) {
        *self.failure.lock() = Some(error);
    }

    fn record(&self, call: String) -> Result<(), ActionError> {
        self.calls.lock().push(call);
        match self.failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl HostActions for RecordingHost {
    fn launch(&self, program: &str) -> Result<(), ActionError> {
        self.record(format!("launch:{}", program))
    }

    fn open_path(&self, path: &Path) -> Result<(), ActionError> {
        self.record(format!("open_path:{}", path.display()))
    }

    fn open_url(&self, url: &str) -> Result<(), ActionError> {
        self.record(format!("open_url:{}", url))
    }

    fn volume(&self, step: VolumeStep, times: u32) -> Result<(), ActionError> {
        self.record(format!("volume:{:?}:{}", step, times))
    }

    fn brightness(&self) -> Result<u8, ActionError> {
        self.record("brightness".to_string())?;
        Ok(self.brightness_level())
    }

    fn set_brightness(&self, percent: u8) -> Result<(), ActionError> {
        self.record(format!("set_brightness:{}", percent))?;
        *self.brightness.lock() = percent;
        Ok(())
    }

    fn lock_workstation(&self) -> Result<(), ActionError> {
        self.record("lock".to_string())
    }

    fn power(&self, action: PowerAction) -> Result<(), ActionError> {
        self.record(format!("power:{:?}", action))
    }

    fn set_wallpaper(&self, path: &Path) -> Result<(), ActionError> {
        self.record(format!("wallpaper:{}", path.display()))
    }
}

/// An assistant wired to scripted collaborators
pub struct Harness {
    pub assistant: Assistant,
    pub transcript: TranscriptLog,
    pub renderer: Arc<RecordingRenderer>,
    pub capture: Arc<ScriptedCapture>,
    pub completion: Arc<StubCompletion>,
    pub host: Arc<RecordingHost>,
}

pub struct HarnessBuilder {
    mode: Mode,
    config: CopilotConfig,
    renderer: Arc<RecordingRenderer>,
    capture: Arc<ScriptedCapture>,
    completion: Arc<StubCompletion>,
    host: Arc<RecordingHost>,
    sleeper: Arc<dyn Sleeper>,
}

impl HarnessBuilder {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            config: CopilotConfig::default().with_timings(Timings::fast()),
            renderer: RecordingRenderer::instant(),
            capture: ScriptedCapture::silent(),
            completion: StubCompletion::answering("Rust is a systems programming language."),
            host: RecordingHost::new(),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    pub fn config(mut self, f: impl FnOnce(CopilotConfig) -> CopilotConfig) -> Self {
        self.config = f(self.config);
        self
    }

    pub fn renderer(mut self, renderer: Arc<RecordingRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn capture(mut self, capture: Arc<ScriptedCapture>) -> Self {
        self.capture = capture;
        self
    }

    pub fn completion(mut self, completion: Arc<StubCompletion>) -> Self {
        self.completion = completion;
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn build(self) -> Harness {
        let transcript = TranscriptLog::new();
        let assistant = AssistantBuilder::new()
            .with_config(self.config)
            .with_mode(self.mode)
            .with_transcript(Arc::new(transcript.clone()))
            .with_renderer(self.renderer.factory())
            .with_capture(self.capture.clone())
            .with_completion(self.completion.clone())
            .with_host(self.host.clone())
            .with_sleeper(self.sleeper)
            .build()
            .expect("assistant builds");

        Harness {
            assistant,
            transcript,
            renderer: self.renderer,
            capture: self.capture,
            completion: self.completion,
            host: self.host,
        }
    }
}

/// Poll `condition` until it holds, failing the test after `timeout`
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
