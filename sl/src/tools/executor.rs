//! ToolExecutor - routes model tool calls to the builtin tools

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::{ToolCall, ToolDefinition};

use super::builtin::{ExecuteScriptTool, ListDirectoryTool, ReadFileTool, WriteFileTool};
use super::{Outcome, ResponseEnvelope, Tool, ToolContext};

/// Argument keys only the dispatcher may supply; stripped from model input
pub const RESERVED_KEYS: &[&str] = &["working_directory", "sandbox_root"];

/// Manages tool execution for a run
pub struct ToolExecutor {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolExecutor {
    /// Create executor with the four sandboxed tools
    pub fn standard() -> Self {
        let mut executor = Self::empty();

        // File system tools
        executor.add_tool(Box::new(ListDirectoryTool));
        executor.add_tool(Box::new(ReadFileTool));
        executor.add_tool(Box::new(WriteFileTool));

        // Script execution
        executor.add_tool(Box::new(ExecuteScriptTool));

        executor
    }

    fn empty() -> Self {
        Self { tools: HashMap::new() }
    }

    fn add_tool(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Tool definitions for the LLM, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Route one tool call and package its outcome
    pub async fn dispatch(&self, tool_call: &ToolCall, ctx: &ToolContext) -> ResponseEnvelope {
        debug!(id = %tool_call.id, name = %tool_call.name, "ToolExecutor::dispatch: called");

        let outcome = match self.tools.get(&tool_call.name) {
            Some(tool) => {
                let input = sanitize_input(&tool_call.name, &tool_call.input);
                Outcome::Result(tool.execute(input, ctx).await)
            }
            None => {
                warn!(name = %tool_call.name, "Model called unknown function");
                Outcome::DispatchError(format!("Unknown function: {}", tool_call.name))
            }
        };

        ResponseEnvelope {
            call_id: tool_call.id.clone(),
            tool_name: tool_call.name.clone(),
            outcome,
        }
    }

    /// Dispatch multiple tool calls, sequentially in received order
    pub async fn dispatch_all(&self, tool_calls: &[ToolCall], ctx: &ToolContext) -> Vec<ResponseEnvelope> {
        debug!(count = tool_calls.len(), "ToolExecutor::dispatch_all: called");
        let mut envelopes = Vec::with_capacity(tool_calls.len());

        for call in tool_calls {
            envelopes.push(self.dispatch(call, ctx).await);
        }

        envelopes
    }

}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::standard()
    }
}

/// Copy the model's arguments, dropping any key reserved for the dispatcher
fn sanitize_input(tool_name: &str, input: &Value) -> Value {
    match input {
        Value::Object(map) => {
            let mut map = map.clone();
            for key in RESERVED_KEYS {
                if map.remove(*key).is_some() {
                    warn!(tool = %tool_name, %key, "Dropped reserved argument supplied by the model");
                }
            }
            Value::Object(map)
        }
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other.clone(),
    }
}
