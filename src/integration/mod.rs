//! Session wiring: controls, the listening loop and the assistant handle

pub mod assistant;
pub mod controls;
pub mod listener;

pub use assistant::{Assistant, AssistantBuilder, AssistantHandle};
pub use controls::Controls;
pub use listener::{Iteration, ListeningLoop};
