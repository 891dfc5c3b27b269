//! Built-in tools for the agent loop

mod execute_script;
mod list_directory;
mod read_file;
mod write_file;

pub use execute_script::ExecuteScriptTool;
pub use list_directory::ListDirectoryTool;
pub use read_file::ReadFileTool;
pub use write_file::WriteFileTool;

use serde_json::Value;

use crate::tools::ToolResult;

/// Pull a required string parameter, or the `{name} is required` error
pub(crate) fn required_str<'a>(input: &'a Value, name: &str) -> Result<&'a str, ToolResult> {
    input[name]
        .as_str()
        .ok_or_else(|| ToolResult::error(format!("{} is required", name)))
}

/// Containment error shared by every tool, phrased with the tool's verb
pub(crate) fn outside_error(verb: &str, path: &str) -> ToolResult {
    ToolResult::error(format!(
        "Cannot {} \"{}\" as it is outside the permitted working directory",
        verb, path
    ))
}
