//! sandloop configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tools::{DEFAULT_MAX_FILE_CHARS, DEFAULT_MAX_OUTPUT_CHARS, ToolSettings};

/// Default system prompt for the agent
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI coding agent.
When a user asks a question or makes a request, make a function call plan.
You can perform the following operations:
- List files and directories
- Read file contents
- Execute scripts with optional arguments
- Write or overwrite files

All paths you provide should be relative to the working directory.
You do not need to specify the working directory in your function calls
as it is automatically injected for security reasons.

When executing scripts, if no arguments are specified by the user,
proceed with an empty arguments list. Do not ask for clarification.
";

/// Main sandloop configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Sandbox and tool limits
    pub sandbox: SandboxConfig,

    /// Conversation loop settings
    pub agent: AgentConfig,

    /// Log level (overridden by --log-level)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that the API key environment variable is set.
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        let var = self.llm.api_key_env();
        if std::env::var(&var).is_err() {
            return Err(eyre::eyre!("LLM API key not found. Set the {} environment variable.", var));
        }
        if self.agent.max_iterations == 0 {
            return Err(eyre::eyre!("agent.max-iterations must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .sandloop.yml
        let local_config = PathBuf::from(".sandloop.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/sandloop/sandloop.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("sandloop").join("sandloop.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
///
/// `model`, `api-key-env` and `base-url` default per provider when unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "anthropic" or "gemini"
    pub provider: String,

    /// Model identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env", skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// API base URL
    #[serde(rename = "base-url", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: None,
            api_key_env: None,
            base_url: None,
            max_tokens: 8192,
            timeout_ms: 300_000,
        }
    }
}

impl LlmConfig {
    fn is_gemini(&self) -> bool {
        self.provider == "gemini"
    }

    /// Model, or the provider's default
    pub fn model(&self) -> String {
        self.model.clone().unwrap_or_else(|| {
            if self.is_gemini() {
                "gemini-2.0-flash-001".to_string()
            } else {
                "claude-sonnet-4-20250514".to_string()
            }
        })
    }

    /// API key variable, or the provider's default
    pub fn api_key_env(&self) -> String {
        self.api_key_env.clone().unwrap_or_else(|| {
            if self.is_gemini() {
                "GEMINI_API_KEY".to_string()
            } else {
                "ANTHROPIC_API_KEY".to_string()
            }
        })
    }

    /// Base URL, or the provider's default
    pub fn base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            if self.is_gemini() {
                "https://generativelanguage.googleapis.com".to_string()
            } else {
                "https://api.anthropic.com".to_string()
            }
        })
    }

    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        let var = self.api_key_env();
        let key = std::env::var(&var).context(format!("Environment variable {} is not set", var))?;
        if key.trim().is_empty() {
            return Err(eyre::eyre!("Environment variable {} is empty", var));
        }
        Ok(key)
    }

    /// HTTP request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Sandbox and tool limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Directory all tools are confined to
    pub root: PathBuf,

    /// Interpreter used by execute_script
    pub interpreter: String,

    /// Script extension execute_script accepts (without the dot)
    #[serde(rename = "script-extension")]
    pub script_extension: String,

    /// Language name shown in the wrong-extension error
    #[serde(rename = "script-language")]
    pub script_language: String,

    /// Hard timeout for execute_script in seconds
    #[serde(rename = "exec-timeout-secs")]
    pub exec_timeout_secs: u64,

    /// read_file truncation length in characters
    #[serde(rename = "max-file-chars")]
    pub max_file_chars: usize,

    /// Per-stream cap on captured script output in characters
    #[serde(rename = "max-output-chars")]
    pub max_output_chars: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let tools = ToolSettings::default();
        Self {
            root: PathBuf::from("./workspace"),
            interpreter: tools.interpreter,
            script_extension: tools.script_extension,
            script_language: tools.script_language,
            exec_timeout_secs: tools.exec_timeout.as_secs(),
            max_file_chars: DEFAULT_MAX_FILE_CHARS,
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
        }
    }
}

impl SandboxConfig {
    /// Tool settings derived from this section
    pub fn tool_settings(&self) -> ToolSettings {
        ToolSettings {
            max_file_chars: self.max_file_chars,
            max_output_chars: self.max_output_chars,
            exec_timeout: Duration::from_secs(self.exec_timeout_secs),
            interpreter: self.interpreter.clone(),
            script_extension: self.script_extension.trim_start_matches('.').to_string(),
            script_language: self.script_language.clone(),
        }
    }
}

/// Conversation loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model turns allowed before giving up
    #[serde(rename = "max-iterations")]
    pub max_iterations: u32,

    /// Outer bound on one model round-trip, in milliseconds
    #[serde(rename = "model-timeout-ms")]
    pub model_timeout_ms: u64,

    /// System prompt sent with every turn
    #[serde(rename = "system-prompt")]
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            model_timeout_ms: 600_000,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.agent.max_iterations, 20);
        assert_eq!(config.sandbox.exec_timeout_secs, 30);
        assert_eq!(config.sandbox.max_file_chars, 10_000);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_llm_config_defaults_per_provider() {
        let anthropic = LlmConfig::default();
        assert!(anthropic.model().contains("sonnet"));
        assert_eq!(anthropic.api_key_env(), "ANTHROPIC_API_KEY");
        assert_eq!(anthropic.base_url(), "https://api.anthropic.com");

        let gemini = LlmConfig {
            provider: "gemini".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(gemini.model(), "gemini-2.0-flash-001");
        assert_eq!(gemini.api_key_env(), "GEMINI_API_KEY");
        assert!(gemini.base_url().contains("generativelanguage"));
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  provider: gemini
  model: gemini-2.5-pro
  api-key-env: MY_API_KEY
  max-tokens: 4096
  timeout-ms: 60000

sandbox:
  root: ./calculator
  exec-timeout-secs: 5
  max-file-chars: 500

agent:
  max-iterations: 7
  model-timeout-ms: 90000

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model(), "gemini-2.5-pro");
        assert_eq!(config.llm.api_key_env(), "MY_API_KEY");
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.sandbox.root, PathBuf::from("./calculator"));
        assert_eq!(config.sandbox.exec_timeout_secs, 5);
        assert_eq!(config.agent.max_iterations, 7);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
sandbox:
  interpreter: python3.12
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.sandbox.interpreter, "python3.12");
        assert_eq!(config.sandbox.script_extension, "py");
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.agent.system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_tool_settings_from_sandbox() {
        let sandbox = SandboxConfig {
            script_extension: ".sh".to_string(),
            exec_timeout_secs: 3,
            ..SandboxConfig::default()
        };

        let settings = sandbox.tool_settings();
        assert_eq!(settings.script_extension, "sh");
        assert_eq!(settings.exec_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("custom.yml");
        fs::write(&path, "agent:\n  max-iterations: 3\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.agent.max_iterations, 3);
    }

    #[test]
    fn test_load_explicit_path_missing_fails() {
        let missing = PathBuf::from("/definitely/not/here.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    #[serial]
    fn test_validate_requires_api_key() {
        let config = Config {
            llm: LlmConfig {
                api_key_env: Some("SANDLOOP_TEST_KEY_UNSET".to_string()),
                ..LlmConfig::default()
            },
            ..Config::default()
        };

        // SAFETY: serialized with the other env-mutating tests
        unsafe { std::env::remove_var("SANDLOOP_TEST_KEY_UNSET") };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("SANDLOOP_TEST_KEY_UNSET"));
    }

    #[test]
    #[serial]
    fn test_get_api_key_reads_env() {
        let config = LlmConfig {
            api_key_env: Some("SANDLOOP_TEST_KEY_SET".to_string()),
            ..LlmConfig::default()
        };

        // SAFETY: serialized with the other env-mutating tests
        unsafe { std::env::set_var("SANDLOOP_TEST_KEY_SET", "sk-test") };
        assert_eq!(config.get_api_key().unwrap(), "sk-test");
        unsafe { std::env::remove_var("SANDLOOP_TEST_KEY_SET") };
    }
}
