//! Tool error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised inside the tool layer before they are rendered into a `ToolResult`
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Path {path} escapes sandbox {root}")]
    SandboxViolation { path: PathBuf, root: PathBuf },

    #[error("Sandbox root {path} is not usable: {reason}")]
    InvalidSandbox { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_violation_message() {
        let err = ToolError::SandboxViolation {
            path: PathBuf::from("/etc/passwd"),
            root: PathBuf::from("/tmp/sandbox"),
        };

        let msg = err.to_string();
        assert!(msg.contains("/etc/passwd"));
        assert!(msg.contains("/tmp/sandbox"));
    }

    #[test]
    fn test_invalid_sandbox_message() {
        let err = ToolError::InvalidSandbox {
            path: PathBuf::from("/nope"),
            reason: "not a directory".to_string(),
        };

        assert_eq!(err.to_string(), "Sandbox root /nope is not usable: not a directory");
    }
}
