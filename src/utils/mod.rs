pub mod channels;

pub use channels::{event_channel, AssistantEvent, EventSink, Status};
