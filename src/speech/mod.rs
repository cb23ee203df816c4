//! Speech output
//!
//! - `renderer`: the text-to-speech collaborator and utterance splitting
//! - `controller`: single-speaker rendering with preemption and reinit

pub mod controller;
pub mod renderer;

pub use controller::SpeechController;
pub use renderer::{
    split_utterances, CommandRenderer, RendererFactory, SilentRenderer, SpeechRenderer,
};
