//! Loop configuration types

use std::time::Duration;

use tracing::debug;

use crate::config::{Config, DEFAULT_SYSTEM_PROMPT};

/// Settings for one conversation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopConfig {
    /// System prompt sent with every model turn
    pub system_prompt: String,

    /// Model turns allowed before giving up
    pub max_iterations: u32,

    /// Max tokens requested per response
    pub max_tokens: u32,

    /// Outer bound on one model round-trip
    pub model_timeout: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: 20,
            max_tokens: 8192,
            model_timeout: Duration::from_secs(600),
        }
    }
}

impl LoopConfig {
    /// Build from the application config
    pub fn from_config(config: &Config) -> Self {
        debug!(max_iterations = config.agent.max_iterations, "LoopConfig::from_config: called");
        Self {
            system_prompt: config.agent.system_prompt.clone(),
            max_iterations: config.agent.max_iterations,
            max_tokens: config.llm.max_tokens,
            model_timeout: Duration::from_millis(config.agent.model_timeout_ms),
        }
    }
}
