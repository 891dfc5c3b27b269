//! Loop events - progress published while a run is in flight
//!
//! The engine emits these on an optional unbounded channel; the CLI renders
//! them to the console. Sending never blocks and a closed receiver is ignored.

use serde::Serialize;
use tokio::sync::mpsc;

use super::Termination;

/// Sender half handed to the engine
pub type EventSender = mpsc::UnboundedSender<LoopEvent>;

/// Receiver half consumed by a renderer
pub type EventReceiver = mpsc::UnboundedReceiver<LoopEvent>;

/// Create a connected event channel
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Observable activity of one conversation run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum LoopEvent {
    /// A model turn is about to be requested
    IterationStarted { iteration: u32, max_iterations: u32 },

    /// The model answered
    ResponseReceived {
        iteration: u32,
        input_tokens: u64,
        output_tokens: u64,
        text: Option<String>,
        tool_calls: usize,
    },

    /// A tool call is about to be dispatched
    ToolCallStarted {
        iteration: u32,
        call_id: String,
        tool_name: String,
        args: serde_json::Value,
    },

    /// A tool call produced its envelope
    ToolCallCompleted {
        iteration: u32,
        call_id: String,
        tool_name: String,
        is_error: bool,
        response: serde_json::Value,
    },

    /// The run reached a terminal state
    Finished { iterations: u32, termination: Termination },
}

impl LoopEvent {
    /// Short name for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            LoopEvent::IterationStarted { .. } => "iteration_started",
            LoopEvent::ResponseReceived { .. } => "response_received",
            LoopEvent::ToolCallStarted { .. } => "tool_call_started",
            LoopEvent::ToolCallCompleted { .. } => "tool_call_completed",
            LoopEvent::Finished { .. } => "finished",
        }
    }
}
