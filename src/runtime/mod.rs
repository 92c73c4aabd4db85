//! Event plumbing between agents and callers
//!
//! Agents run as separate tokio tasks and report progress through an
//! `EventSink`; the relay reads the matching `EventReceiver`.

pub mod channels;

pub use channels::{create_event_channel, EventReceiver, EventSender, EventSink};
