//! Assistant wiring and the external handle
//!
//! `AssistantBuilder` assembles a session from configuration and
//! collaborators; `Assistant::start` launches the listening loop and returns
//! an `AssistantHandle` for the front-end.

use crate::capture::{CommandCapture, NoCapture, VoiceCapture};
use crate::config::{read_api_key, CopilotConfig};
use crate::dispatch::{ActionRunner, CommandDispatcher, HostActions, SystemHost};
use crate::integration::controls::Controls;
use crate::integration::listener::{Iteration, ListeningLoop};
use crate::llm::{ChatCompletionsClient, CompletionClient};
use crate::messages::{Transcript, TranscriptLog};
use crate::session::{
    CommandQueue, Mode, Session, SessionSnapshot, SharedSession, Signal, SignalSet, Sleeper,
    TaskTracker, ThreadSleeper,
};
use crate::speech::{CommandRenderer, RendererFactory, SpeechController};
use crate::utils::channels::{event_channel, AssistantEvent, Status};
use crate::{CopilotError, Result};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// A fully wired assistant that has not started listening yet
pub struct Assistant {
    session: Session,
    speech: Arc<SpeechController>,
    controls: Controls,
    dispatcher: Arc<CommandDispatcher>,
    listener: ListeningLoop,
    events: Receiver<AssistantEvent>,
}

impl Assistant {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn speech(&self) -> &Arc<SpeechController> {
        &self.speech
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn dispatcher(&self) -> &Arc<CommandDispatcher> {
        &self.dispatcher
    }

    pub fn events(&self) -> &Receiver<AssistantEvent> {
        &self.events
    }

    /// Run a single listening-loop iteration on the calling thread
    pub fn step(&mut self) -> Iteration {
        self.listener.run_iteration()
    }

    /// Announce the initial mode and start the listening loop thread
    pub fn start(self) -> Result<AssistantHandle> {
        let Assistant {
            session,
            speech,
            controls,
            listener,
            events,
            ..
        } = self;

        match session.state.mode() {
            Mode::Voice => {
                session.events.emit(AssistantEvent::TextInput(false));
                session.resume_listening();
            }
            Mode::Chat => {
                session.events.emit(AssistantEvent::TextInput(true));
                session.status(Status::ChatMode);
            }
        }

        let loop_handle = thread::Builder::new()
            .name("listening-loop".to_string())
            .spawn(move || listener.run())
            .map_err(|e| CopilotError::Session(format!("Failed to start listening loop: {}", e)))?;
        info!("Assistant started in {} mode", session.state.mode());

        Ok(AssistantHandle {
            session,
            speech,
            controls,
            events,
            loop_handle: Some(loop_handle),
        })
    }
}

/// Front-end handle to a running assistant
pub struct AssistantHandle {
    session: Session,
    speech: Arc<SpeechController>,
    controls: Controls,
    events: Receiver<AssistantEvent>,
    loop_handle: Option<JoinHandle<()>>,
}

impl AssistantHandle {
    /// Queue typed input for the listening loop and show it in the transcript.
    ///
    /// Returns false for blank input.
    pub fn submit_text(&self, text: &str) -> bool {
        if self.session.queue.push(text).is_none() {
            return false;
        }
        self.session.append_user(text.trim());
        true
    }

    pub fn request_stop_chat(&self) {
        self.controls.request_stop_chat();
    }

    pub fn request_stop_all(&self) {
        self.controls.request_stop_all();
    }

    /// Returns the mode being switched to
    pub fn request_toggle_mode(&self) -> Mode {
        self.controls.request_toggle_mode()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.state.snapshot()
    }

    pub fn is_shutdown(&self) -> bool {
        self.session.signals.is_shutdown()
    }

    pub fn events(&self) -> &Receiver<AssistantEvent> {
        &self.events
    }

    /// Ask every component to stop; does not wait
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.session.signals.raise(Signal::Shutdown);
        self.session.status(Status::ShuttingDown);
        self.speech.stop();
    }

    /// Wait for the listening loop, all tasks and the last rendering to finish
    pub fn join(mut self) {
        if let Some(handle) = self.loop_handle.take() {
            if handle.join().is_err() {
                warn!("Listening loop panicked");
            }
        }
        self.session.tasks.wait_idle();
        self.speech.join();
    }
}

/// Builder for an `Assistant`; any collaborator not supplied is built from the config
pub struct AssistantBuilder {
    config: CopilotConfig,
    mode: Mode,
    transcript: Option<Arc<dyn Transcript>>,
    renderer: Option<RendererFactory>,
    capture: Option<Arc<dyn VoiceCapture>>,
    completion: Option<Arc<dyn CompletionClient>>,
    host: Option<Arc<dyn HostActions>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl AssistantBuilder {
    pub fn new() -> Self {
        Self {
            config: CopilotConfig::default(),
            mode: Mode::Voice,
            transcript: None,
            renderer: None,
            capture: None,
            completion: None,
            host: None,
            sleeper: None,
        }
    }

    pub fn with_config(mut self, config: CopilotConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_transcript(mut self, transcript: Arc<dyn Transcript>) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn with_renderer(mut self, factory: RendererFactory) -> Self {
        self.renderer = Some(factory);
        self
    }

    pub fn with_capture(mut self, capture: Arc<dyn VoiceCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn with_completion(mut self, completion: Arc<dyn CompletionClient>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn with_host(mut self, host: Arc<dyn HostActions>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    pub fn build(self) -> Result<Assistant> {
        let config = self.config;
        config.validate()?;

        let capture: Arc<dyn VoiceCapture> = match self.capture {
            Some(capture) => capture,
            None => match CommandCapture::from_command_line(&config.capture.command)
                .map_err(|e| CopilotError::Config(e.to_string()))?
            {
                Some(capture) => Arc::new(capture),
                None => {
                    warn!("No capture command configured, voice input disabled");
                    Arc::new(NoCapture)
                }
            },
        };
        let completion: Arc<dyn CompletionClient> = match self.completion {
            Some(completion) => completion,
            None => {
                let key = read_api_key(&config.completion.api_key_env);
                Arc::new(ChatCompletionsClient::new(&config.completion, key))
            }
        };
        let renderer = self
            .renderer
            .unwrap_or_else(|| CommandRenderer::factory(config.speech.command.clone()));
        let host: Arc<dyn HostActions> = match self.host {
            Some(host) => host,
            None => Arc::new(SystemHost::new()),
        };
        let transcript: Arc<dyn Transcript> = match self.transcript {
            Some(transcript) => transcript,
            None => Arc::new(TranscriptLog::new()),
        };
        let sleeper: Arc<dyn Sleeper> = match self.sleeper {
            Some(sleeper) => sleeper,
            None => Arc::new(ThreadSleeper),
        };

        let (events, receiver) = event_channel();
        let session = Session {
            state: SharedSession::with_mode(self.mode),
            signals: SignalSet::new(),
            queue: CommandQueue::new(),
            tasks: TaskTracker::new(),
            events,
            transcript,
            sleeper,
            timings: config.timings.clone(),
        };
        session.status(Status::Starting);

        let speech = Arc::new(SpeechController::new(session.clone(), renderer)?);
        let controls = Controls::new(session.clone(), Arc::clone(&speech));
        let actions = ActionRunner::new(host, config.actions.clone(), config.persona.clone());
        let dispatcher = Arc::new(CommandDispatcher::new(
            session.clone(),
            Arc::clone(&speech),
            completion,
            controls.clone(),
            actions,
            config.persona.clone(),
            config.exit,
        ));
        let listener = ListeningLoop::new(session.clone(), capture, Arc::clone(&dispatcher));

        Ok(Assistant {
            session,
            speech,
            controls,
            dispatcher,
            listener,
            events: receiver,
        })
    }
}

impl Default for AssistantBuilder {
    fn default() -> Self {
        Self::new()
    }
}
