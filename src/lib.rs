pub mod capture;
pub mod config;
pub mod dispatch;
pub mod integration;
pub mod llm;
pub mod messages;
pub mod session;
pub mod speech;
pub mod utils;

use dispatch::ActionError;
use llm::CompletionError;
use thiserror::Error;

pub use config::{CopilotConfig, ExitPolicy, Timings};
pub use integration::{Assistant, AssistantBuilder, AssistantHandle};
pub use session::{Mode, SessionSnapshot, Signal};
pub use utils::channels::{AssistantEvent, Status};

#[derive(Error, Debug, Clone)]
pub enum CopilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Speech output error: {0}")]
    Speech(String),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Session error: {0}")]
    Session(String),
}

impl From<std::io::Error> for CopilotError {
    fn from(e: std::io::Error) -> Self {
        CopilotError::Io(e.to_string())
    }
}

impl CopilotError {
    /// Sentence shown or spoken to the user in place of the failed result
    pub fn user_message(&self) -> String {
        match self {
            CopilotError::Config(_) => {
                "The configuration is invalid. Please check your settings.".to_string()
            }
            CopilotError::Speech(_) => {
                "Speech output is unavailable. Replies will be shown as text.".to_string()
            }
            CopilotError::Completion(e) => e.spoken_message().to_string(),
            CopilotError::Action(ActionError::Unsupported(what)) => {
                format!("Sorry, {} isn't available on this system.", what)
            }
            CopilotError::Action(_) => "Sorry, I couldn't complete that action.".to_string(),
            CopilotError::Io(_) => "A file could not be read.".to_string(),
            CopilotError::Session(_) => {
                "The assistant has stopped. Please restart it.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CopilotError>;
