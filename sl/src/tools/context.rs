//! ToolContext - execution context for tools

use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::ToolError;
use super::guard::{Resolution, SandboxRoot, resolve_and_check};

/// Default cap on characters returned by read_file
pub const DEFAULT_MAX_FILE_CHARS: usize = 10_000;

/// Default cap on characters kept per captured process stream
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 30_000;

/// Default wall-clock limit for execute_script
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(30);

/// Limits and interpreter settings shared by every tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    /// read_file truncation length, in characters
    pub max_file_chars: usize,

    /// Per-stream cap on captured subprocess output, in characters
    pub max_output_chars: usize,

    /// Hard timeout for execute_script
    pub exec_timeout: Duration,

    /// Interpreter binary used by execute_script
    pub interpreter: String,

    /// File extension (without the dot) execute_script accepts
    pub script_extension: String,

    /// Language label used in the wrong-extension error
    pub script_language: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            max_file_chars: DEFAULT_MAX_FILE_CHARS,
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
            interpreter: "python3".to_string(),
            script_extension: "py".to_string(),
            script_language: "Python".to_string(),
        }
    }
}

/// Execution context for tools - scoped to a single sandbox root
///
/// The root is supplied by whoever builds the context (the CLI, a test), never
/// by the model. Every path a tool touches goes through [`ToolContext::validate_path`].
#[derive(Clone)]
pub struct ToolContext {
    /// Sandbox root - all file ops constrained here
    root: SandboxRoot,

    /// Limits and interpreter settings
    pub settings: ToolSettings,
}

impl ToolContext {
    /// Create a new tool context with default settings
    pub fn new(root: SandboxRoot) -> Self {
        debug!(%root, "ToolContext::new: called");
        Self {
            root,
            settings: ToolSettings::default(),
        }
    }

    /// Create a tool context with explicit settings
    pub fn with_settings(root: SandboxRoot, settings: ToolSettings) -> Self {
        debug!(%root, ?settings, "ToolContext::with_settings: called");
        Self { root, settings }
    }

    /// The sandbox root
    pub fn root(&self) -> &SandboxRoot {
        &self.root
    }

    /// Resolve a model-supplied path without judging it
    pub fn resolve(&self, relative: &str) -> Resolution {
        resolve_and_check(&self.root, relative)
    }

    /// Validate path is within the sandbox (sandbox enforcement)
    pub fn validate_path(&self, relative: &str) -> Result<PathBuf, ToolError> {
        debug!(%relative, "ToolContext::validate_path: called");
        let resolution = self.resolve(relative);

        if resolution.contained {
            debug!(path = ?resolution.path, "ToolContext::validate_path: path is within sandbox");
            Ok(resolution.path)
        } else {
            debug!(path = ?resolution.path, "ToolContext::validate_path: sandbox violation detected");
            Err(ToolError::SandboxViolation {
                path: resolution.path,
                root: self.root.path().to_path_buf(),
            })
        }
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("root", &self.root)
            .field("interpreter", &self.settings.interpreter)
            .field("exec_timeout", &self.settings.exec_timeout)
            .finish()
    }
}
