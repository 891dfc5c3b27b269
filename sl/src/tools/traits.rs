//! Tool trait definition and result types

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::context::ToolContext;

/// Prefix carried by every tool-domain error string
pub const ERROR_PREFIX: &str = "Error: ";

/// A tool that can be called by the LLM
///
/// Implementations must never panic or propagate faults: every input,
/// valid or not, produces a [`ToolResult`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (matches the function name the model calls)
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Execute the tool
    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult;
}

/// Result of a tool execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(content: impl Into<String>) -> Self {
        debug!("ToolResult::success: called");
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// Create an error result, prefixed with `Error: `
    pub fn error(message: impl AsRef<str>) -> Self {
        debug!("ToolResult::error: called");
        Self {
            content: format!("{}{}", ERROR_PREFIX, message.as_ref()),
            is_error: true,
        }
    }
}

/// What the dispatcher produced for one tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The tool ran (its own result may still be a tool-domain error)
    Result(ToolResult),

    /// The call never reached a tool
    DispatchError(String),
}

/// A tool response ready to be sent back to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEnvelope {
    /// Provider call id this envelope answers
    pub call_id: String,

    pub tool_name: String,

    pub outcome: Outcome,
}

impl ResponseEnvelope {
    /// Text sent back to the model
    pub fn content(&self) -> &str {
        match &self.outcome {
            Outcome::Result(result) => &result.content,
            Outcome::DispatchError(message) => message,
        }
    }

    /// Whether the model should see this as an error
    pub fn is_error(&self) -> bool {
        match &self.outcome {
            Outcome::Result(result) => result.is_error,
            Outcome::DispatchError(_) => true,
        }
    }

    /// Structured payload used by providers with JSON function responses
    pub fn response_payload(&self) -> Value {
        match &self.outcome {
            Outcome::Result(result) => serde_json::json!({ "result": result.content }),
            Outcome::DispatchError(message) => serde_json::json!({ "error": message }),
        }
    }
}
