//! Conversation loop
//!
//! The engine drives model turns: prompt → model → tool calls → results →
//! model, until the model answers in plain text or a bound is hit.

mod config;
mod engine;
pub mod events;

pub use config::LoopConfig;
pub use engine::{LoopEngine, LoopState, RunReport, Termination};
pub use events::{EventReceiver, EventSender, LoopEvent};
