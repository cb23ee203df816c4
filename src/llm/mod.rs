//! Remote completion collaborator
//!
//! Stateless request/response: one prompt in, one answer out. Every failure
//! cause maps to a sentence the assistant can speak.

pub mod client;

pub use client::{ChatCompletionsClient, CompletionClient, CompletionError};
