//! read_file tool - read file contents with a character cap

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{outside_error, required_str};
use crate::tools::{Tool, ToolContext, ToolResult};

/// Read a file's contents
pub struct ReadFileTool;

/// Keep the first `max` characters, appending the truncation marker when cut
fn truncate_chars(content: String, max: usize, path: &str) -> String {
    match content.char_indices().nth(max) {
        Some((cut, _)) => format!(
            "{}[...File \"{}\" truncated at {} characters]",
            &content[..cut],
            path,
            max
        ),
        None => content,
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Reads and returns the contents of a file, constrained to the working directory."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File to read, relative to the working directory"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ReadFileTool::execute: called");
        let path = match required_str(&input, "path") {
            Ok(p) => p,
            Err(result) => {
                debug!("ReadFileTool::execute: missing path parameter");
                return result;
            }
        };

        let full_path = match ctx.validate_path(path) {
            Ok(p) => p,
            Err(e) => {
                debug!(%e, "ReadFileTool::execute: path validation failed");
                return outside_error("read", path);
            }
        };

        let is_file = tokio::fs::metadata(&full_path).await.map(|m| m.is_file()).unwrap_or(false);
        if !is_file {
            debug!(?full_path, "ReadFileTool::execute: not a regular file");
            return ToolResult::error(format!("File not found or is not a regular file: \"{}\"", path));
        }

        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(c) => c,
            Err(e) => {
                debug!(%e, "ReadFileTool::execute: read failed");
                return ToolResult::error(format!("Failed to read \"{}\": {}", path, e));
            }
        };

        debug!(len = content.len(), "ReadFileTool::execute: file read");
        ToolResult::success(truncate_chars(content, ctx.settings.max_file_chars, path))
    }
}
