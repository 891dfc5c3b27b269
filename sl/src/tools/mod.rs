//! Tool system for the agent loop
//!
//! Tools give the model file system access and script execution. Every run
//! gets one `ToolContext` scoped to a sandbox root; tools cannot escape it.

mod context;
mod error;
mod executor;
mod guard;
mod traits;

pub mod builtin;
pub mod runner;

pub use context::{DEFAULT_EXEC_TIMEOUT, DEFAULT_MAX_FILE_CHARS, DEFAULT_MAX_OUTPUT_CHARS, ToolContext, ToolSettings};
pub use error::ToolError;
pub use executor::{RESERVED_KEYS, ToolExecutor};
pub use guard::{Resolution, SandboxRoot, resolve_and_check};
pub use traits::{ERROR_PREFIX, Outcome, ResponseEnvelope, Tool, ToolResult};
