//! list_directory tool - list entries with size and kind

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::outside_error;
use crate::tools::{Tool, ToolContext, ToolResult};

/// Returned for a directory with no entries
pub const EMPTY_DIRECTORY: &str = "(empty directory)";

/// List files and directories in a path
pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &'static str {
        "list_directory"
    }

    fn description(&self) -> &'static str {
        "Lists files in the specified directory along with their sizes, constrained to the working directory."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list, relative to the working directory (default: .)"
                }
            }
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ListDirectoryTool::execute: called");
        let path = input["path"].as_str().unwrap_or(".");
        debug!(%path, "ListDirectoryTool::execute: path parameter");

        let full_path = match ctx.validate_path(path) {
            Ok(p) => {
                debug!(?p, "ListDirectoryTool::execute: path validated");
                p
            }
            Err(e) => {
                debug!(%e, "ListDirectoryTool::execute: path validation failed");
                return outside_error("list", path);
            }
        };

        let is_dir = tokio::fs::metadata(&full_path).await.map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            debug!(?full_path, "ListDirectoryTool::execute: not a directory");
            return ToolResult::error(format!("\"{}\" is not a directory", path));
        }

        let mut dir = match tokio::fs::read_dir(&full_path).await {
            Ok(d) => d,
            Err(e) => {
                debug!(%e, "ListDirectoryTool::execute: failed to read directory");
                return ToolResult::error(format!("Failed to list \"{}\": {}", path, e));
            }
        };

        let mut entries: Vec<(String, u64, bool)> = Vec::new();
        loop {
            let entry = match dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    debug!(%e, "ListDirectoryTool::execute: error while iterating");
                    return ToolResult::error(format!("Failed to list \"{}\": {}", path, e));
                }
            };

            let name = entry.file_name().to_string_lossy().to_string();
            let entry_path = entry.path();

            // Follow symlinks for size and kind, like stat(2), unless the target leaves the sandbox
            let contained = ctx.resolve(&entry_path.to_string_lossy()).contained;
            let metadata = if contained {
                tokio::fs::metadata(&entry_path).await
            } else {
                debug!(%name, "ListDirectoryTool::execute: entry points outside, not following");
                tokio::fs::symlink_metadata(&entry_path).await
            };
            let metadata = match metadata {
                Ok(m) => m,
                Err(_) => {
                    debug!(%name, "ListDirectoryTool::execute: failed to get metadata, skipping entry");
                    continue;
                }
            };
            entries.push((name, metadata.len(), metadata.is_dir()));
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(entries_count = %entries.len(), "ListDirectoryTool::execute: entries collected");

        if entries.is_empty() {
            return ToolResult::success(EMPTY_DIRECTORY);
        }

        let lines: Vec<String> = entries
            .iter()
            .map(|(name, size, is_dir)| format!("- {}: file_size={} bytes, is_dir={}", name, size, is_dir))
            .collect();

        ToolResult::success(lines.join("\n"))
    }
}
