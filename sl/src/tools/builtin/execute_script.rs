//! execute_script tool - run a script inside the sandbox

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{outside_error, required_str};
use crate::tools::runner::{self, ProcessSpec};
use crate::tools::{Tool, ToolContext, ToolResult};

/// Run a script with the configured interpreter
pub struct ExecuteScriptTool;

/// Parse the optional `args` parameter into a fresh vector
fn parse_args(input: &Value) -> Result<Vec<String>, ToolResult> {
    match input.get("args") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ToolResult::error("args must be an array of strings")),
        Some(_) => Err(ToolResult::error("args must be an array of strings")),
    }
}

#[async_trait]
impl Tool for ExecuteScriptTool {
    fn name(&self) -> &'static str {
        "execute_script"
    }

    fn description(&self) -> &'static str {
        "Executes a script file with optional command-line arguments, constrained to the working directory."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Script to execute, relative to the working directory"
                },
                "args": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Optional command-line arguments passed to the script"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ExecuteScriptTool::execute: called");
        let path = match required_str(&input, "path") {
            Ok(p) => p,
            Err(result) => {
                debug!("ExecuteScriptTool::execute: missing path parameter");
                return result;
            }
        };

        let full_path = match ctx.validate_path(path) {
            Ok(p) => p,
            Err(e) => {
                debug!(%e, "ExecuteScriptTool::execute: path validation failed");
                return outside_error("execute", path);
            }
        };

        let is_file = tokio::fs::metadata(&full_path).await.map(|m| m.is_file()).unwrap_or(false);
        if !is_file {
            debug!(?full_path, "ExecuteScriptTool::execute: script not found");
            return ToolResult::error(format!("File \"{}\" not found.", path));
        }

        let settings = &ctx.settings;
        let extension_matches = full_path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == settings.script_extension);
        if !extension_matches {
            debug!(?full_path, expected = %settings.script_extension, "ExecuteScriptTool::execute: wrong extension");
            return ToolResult::error(format!("\"{}\" is not a {} file.", path, settings.script_language));
        }

        let args = match parse_args(&input) {
            Ok(args) => args,
            Err(result) => {
                debug!("ExecuteScriptTool::execute: invalid args");
                return result;
            }
        };

        let spec = ProcessSpec {
            interpreter: settings.interpreter.clone(),
            script: full_path,
            args,
            cwd: ctx.root().path().to_path_buf(),
            timeout: settings.exec_timeout,
            max_output_chars: settings.max_output_chars,
        };

        runner::run(&spec).await
    }
}
