//! OpenAI-compatible chat completions over blocking HTTP

use crate::config::CompletionConfig;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("API key not set")]
    MissingApiKey,

    #[error("rate limited")]
    RateLimited,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl CompletionError {
    /// Sentence spoken to the user instead of an answer
    pub fn spoken_message(&self) -> &'static str {
        match self {
            CompletionError::MissingApiKey => {
                "Sorry, the assistant service is unavailable right now."
            }
            CompletionError::RateLimited => "Rate limit reached, please wait a moment.",
            CompletionError::Status { .. } => "Sorry, the assistant service returned an error.",
            CompletionError::Transport(_) => "Sorry, I couldn't reach the assistant service.",
            CompletionError::Malformed(_) => {
                "Sorry, I couldn't understand the assistant service's reply."
            }
        }
    }
}

pub trait CompletionClient: Send + Sync {
    /// Send `prompt` as a single user message and return the answer text
    fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for `/v1/chat/completions` style endpoints (Groq by default)
pub struct ChatCompletionsClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    api_key: Option<String>,
}

impl ChatCompletionsClient {
    /// `api_key` is read once at startup; `None` makes every call fail with
    /// `MissingApiKey` without touching the network.
    pub fn new(config: &CompletionConfig, api_key: Option<String>) -> Self {
        if api_key.is_none() {
            warn!("{} not set, remote answers disabled", config.api_key_env);
        } else {
            info!("Completion client ready: {} via {}", config.model, config.endpoint);
        }
        Self {
            http: reqwest::blocking::Client::new(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key,
        }
    }
}

impl CompletionClient for ChatCompletionsClient {
    fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, CompletionError> {
        let key = self.api_key.as_deref().ok_or(CompletionError::MissingApiKey)?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
        };

        debug!("Requesting completion ({} chars)", prompt.len());
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(key)
            .json(&request)
            .timeout(timeout)
            .send()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CompletionError::RateLimited);
        }
        if !status.is_success() {
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_answer(&body)
    }
}

/// Extract the first choice's text from a chat completions response body
fn parse_answer(body: &str) -> Result<String, CompletionError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::Malformed(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| CompletionError::Malformed("no answer in response".into()))
}
