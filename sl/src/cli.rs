//! CLI definitions and console rendering

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use crate::r#loop::{EventReceiver, LoopEvent, Termination};

/// sandloop - sandboxed tool-calling agent
#[derive(Debug, Parser)]
#[command(
    name = "sl",
    about = "Run a tool-calling agent confined to one working directory",
    version
)]
pub struct Cli {
    /// Request for the agent
    #[arg(value_name = "PROMPT")]
    pub prompt: String,

    /// Print iteration headers, token usage and full tool traffic
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to config file
    #[arg(short, long, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)")]
    pub log_level: Option<String>,

    /// Sandbox root (overrides sandbox.root)
    #[arg(short, long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Maximum model turns (overrides agent.max-iterations)
    #[arg(short, long)]
    pub max_iterations: Option<u32>,
}

/// Result of checking the script interpreter
pub struct InterpreterCheck {
    pub name: String,
    pub available: bool,
    pub version: Option<String>,
}

impl InterpreterCheck {
    /// Check if an interpreter is on PATH and get its version
    pub fn check(name: &str) -> Self {
        debug!(name, "InterpreterCheck::check: called");
        let result = std::process::Command::new(name).arg("--version").output();

        match result {
            Ok(output) if output.status.success() => {
                debug!(name, "InterpreterCheck::check: interpreter available");
                // Some interpreters print their version on stderr
                let text = format!(
                    "{} {}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                );
                Self {
                    name: name.to_string(),
                    available: true,
                    version: Some(parse_version(&text)),
                }
            }
            _ => {
                debug!(name, "InterpreterCheck::check: interpreter not available");
                Self {
                    name: name.to_string(),
                    available: false,
                    version: None,
                }
            }
        }
    }
}

/// Parse version from command output (extracts first version-like string)
fn parse_version(output: &str) -> String {
    debug!(%output, "parse_version: called");
    for word in output.split_whitespace() {
        let word = word.trim_start_matches('v');
        if word.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            let version: String = word.chars().take_while(|c| c.is_ascii_digit() || *c == '.').collect();
            if !version.is_empty() {
                debug!(%version, "parse_version: found version");
                return version;
            }
        }
    }
    debug!("parse_version: no version found, returning unknown");
    "unknown".to_string()
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sandloop")
        .join("logs")
        .join("sandloop.log")
}

/// Generate the after_help text with the interpreter check and log location
pub fn generate_after_help(interpreter: &str) -> String {
    debug!(interpreter, "generate_after_help: called");
    let check = InterpreterCheck::check(interpreter);

    let mut help = String::new();
    help.push_str("Interpreter:\n");
    let icon = if check.available { "\u{2705}" } else { "\u{274C}" };
    let version = check.version.as_deref().unwrap_or("not found");
    help.push_str(&format!("  {} {:<10} {}\n", icon, check.name, version));

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}

/// Render one loop event as console lines, if it has any
pub fn render_event(event: &LoopEvent, verbose: bool) -> Option<String> {
    match event {
        LoopEvent::IterationStarted { iteration, .. } if verbose => {
            Some(format!("\n=== Iteration {} ===", iteration).bold().to_string())
        }
        LoopEvent::ResponseReceived {
            input_tokens,
            output_tokens,
            ..
        } if verbose => Some(format!(
            "Prompt tokens: {}\nResponse tokens: {}",
            input_tokens, output_tokens
        )),
        LoopEvent::ToolCallStarted { tool_name, args, .. } => {
            if verbose {
                Some(format!("Calling function: {}({})", tool_name.cyan(), args))
            } else {
                Some(format!(" - Calling function: {}", tool_name))
            }
        }
        LoopEvent::ToolCallCompleted {
            response, is_error, ..
        } if verbose => {
            let line = format!("-> {}", response);
            Some(if *is_error { line.red().to_string() } else { line })
        }
        _ => None,
    }
}

/// Final console line for a finished run, plus the process exit code
pub fn render_termination(termination: &Termination, verbose: bool) -> (Option<String>, i32) {
    debug!(?termination, verbose, "render_termination: called");
    match termination {
        Termination::FinalText(text) => (Some(text.clone()), 0),
        Termination::NoOp => {
            let line = verbose.then(|| "No function calls or text response.".to_string());
            (line, 0)
        }
        Termination::MaxIterationsExhausted { .. } => (
            Some("Maximum iterations reached without a final response.".yellow().to_string()),
            0,
        ),
        Termination::Fatal { message } => (Some(format!("Error: {}", message).red().to_string()), 1),
        Termination::Cancelled => (Some("Interrupted.".to_string()), 130),
    }
}

/// Print events as they arrive until the engine drops its sender
pub async fn print_events(mut rx: EventReceiver, verbose: bool) {
    debug!(verbose, "print_events: called");
    while let Some(event) = rx.recv().await {
        if let Some(text) = render_event(&event, verbose) {
            println!("{}", text);
        }
    }
    debug!("print_events: channel closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_cli_parse_prompt_only() {
        let cli = Cli::parse_from(["sl", "fix the bug"]);
        assert_eq!(cli.prompt, "fix the bug");
        assert!(!cli.verbose);
        assert!(cli.workdir.is_none());
        assert!(cli.max_iterations.is_none());
    }

    #[test]
    fn test_cli_parse_all_options() {
        let cli = Cli::parse_from([
            "sl", "-v", "-c", "cfg.yml", "-l", "debug", "-w", "calculator", "-m", "5", "run tests",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("cfg.yml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.workdir, Some(PathBuf::from("calculator")));
        assert_eq!(cli.max_iterations, Some(5));
        assert_eq!(cli.prompt, "run tests");
    }

    #[test]
    fn test_cli_requires_prompt() {
        assert!(Cli::try_parse_from(["sl"]).is_err());
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("Python 3.12.1"), "3.12.1");
        assert_eq!(parse_version("node v20.1.0"), "20.1.0");
        assert_eq!(parse_version("no digits here"), "unknown");
    }

    #[test]
    fn test_render_tool_call_quiet_and_verbose() {
        plain();
        let event = LoopEvent::ToolCallStarted {
            iteration: 1,
            call_id: "c1".to_string(),
            tool_name: "read_file".to_string(),
            args: serde_json::json!({"path": "main.py"}),
        };

        assert_eq!(
            render_event(&event, false).as_deref(),
            Some(" - Calling function: read_file")
        );
        assert_eq!(
            render_event(&event, true).as_deref(),
            Some(r#"Calling function: read_file({"path":"main.py"})"#)
        );
    }

    #[test]
    fn test_render_quiet_hides_iteration_details() {
        let started = LoopEvent::IterationStarted {
            iteration: 1,
            max_iterations: 20,
        };
        let response = LoopEvent::ResponseReceived {
            iteration: 1,
            input_tokens: 100,
            output_tokens: 20,
            text: None,
            tool_calls: 1,
        };
        assert!(render_event(&started, false).is_none());
        assert!(render_event(&response, false).is_none());
    }

    #[test]
    fn test_render_verbose_tokens() {
        plain();
        let response = LoopEvent::ResponseReceived {
            iteration: 1,
            input_tokens: 100,
            output_tokens: 20,
            text: None,
            tool_calls: 1,
        };
        assert_eq!(
            render_event(&response, true).as_deref(),
            Some("Prompt tokens: 100\nResponse tokens: 20")
        );
    }

    #[test]
    fn test_render_termination_exit_codes() {
        plain();
        assert_eq!(
            render_termination(&Termination::FinalText("hi".to_string()), false),
            (Some("hi".to_string()), 0)
        );
        assert_eq!(render_termination(&Termination::NoOp, false), (None, 0));
        assert_eq!(
            render_termination(&Termination::NoOp, true).0.as_deref(),
            Some("No function calls or text response.")
        );
        assert_eq!(
            render_termination(&Termination::MaxIterationsExhausted { iterations: 20 }, false),
            (Some("Maximum iterations reached without a final response.".to_string()), 0)
        );
        assert_eq!(
            render_termination(
                &Termination::Fatal {
                    message: "boom".to_string()
                },
                false
            ),
            (Some("Error: boom".to_string()), 1)
        );
        assert_eq!(
            render_termination(&Termination::Cancelled, false),
            (Some("Interrupted.".to_string()), 130)
        );
    }
}
