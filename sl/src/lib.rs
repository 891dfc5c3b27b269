//! sandloop - a sandboxed tool-calling agent loop
//!
//! A conversation loop sends a prompt to an LLM, lets the model request a
//! small set of filesystem and script-execution tools, and feeds the results
//! back until the model answers in plain text or a bound is hit. Every tool is
//! confined to a single sandbox root.
//!
//! # Modules
//!
//! - [`tools`] - PathGuard, the four built-in tools, process runner and dispatcher
//! - [`llm`] - LLM client trait plus Anthropic and Gemini implementations
//! - [`r#loop`] - Conversation engine and progress events
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod llm;
pub mod tools;

// Note: 'loop' is a reserved keyword, so we use r#loop
#[path = "loop/mod.rs"]
pub mod r#loop;

// Re-export commonly used types
pub use config::{Config, LlmConfig};
pub use llm::{
    AnthropicClient, CompletionRequest, CompletionResponse, GeminiClient, LlmClient, LlmError, create_client,
};
pub use r#loop::{LoopConfig, LoopEngine, LoopEvent, RunReport, Termination};
pub use tools::{SandboxRoot, Tool, ToolContext, ToolError, ToolExecutor, ToolResult};
