//! write_file tool - write content to a file

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{outside_error, required_str};
use crate::tools::{Tool, ToolContext, ToolResult};

/// Write content to a file
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Writes or overwrites a file with the given content, constrained to the working directory. Creates parent directories if needed."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File to write, relative to the working directory"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write to the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "WriteFileTool::execute: called");
        let path = match required_str(&input, "path") {
            Ok(p) => p,
            Err(result) => {
                debug!("WriteFileTool::execute: missing path parameter");
                return result;
            }
        };

        let content = match required_str(&input, "content") {
            Ok(c) => {
                debug!(content_len = %c.len(), "WriteFileTool::execute: content parameter found");
                c
            }
            Err(result) => {
                debug!("WriteFileTool::execute: missing content parameter");
                return result;
            }
        };

        let full_path = match ctx.validate_path(path) {
            Ok(p) => {
                debug!(?p, "WriteFileTool::execute: path validated");
                p
            }
            Err(e) => {
                debug!(%e, "WriteFileTool::execute: path validation failed");
                return outside_error("write to", path);
            }
        };

        if let Some(parent) = full_path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            debug!(%e, "WriteFileTool::execute: failed to create parent directories");
            return ToolResult::error(format!("Failed to write \"{}\": {}", path, e));
        }

        if let Err(e) = tokio::fs::write(&full_path, content).await {
            debug!(%e, "WriteFileTool::execute: failed to write file");
            return ToolResult::error(format!("Failed to write \"{}\": {}", path, e));
        }

        let written = content.chars().count();
        debug!(%written, "WriteFileTool::execute: file written");
        ToolResult::success(format!(
            "Successfully wrote to \"{}\" ({} characters written)",
            path, written
        ))
    }
}
