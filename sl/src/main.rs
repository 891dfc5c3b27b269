//! sl - sandboxed tool-calling agent
//!
//! CLI entry point: runs one prompt to completion inside the sandbox root.

use std::fs;
use std::path::Path;

use clap::{CommandFactory, FromArgMatches};
use eyre::{Context, Result};
use tracing::{debug, info};

use sandloop::cli::{Cli, generate_after_help, get_log_path, print_events, render_termination};
use sandloop::config::{Config, SandboxConfig};
use sandloop::llm::create_client;
use sandloop::r#loop::{LoopConfig, LoopEngine, events};
use sandloop::tools::{SandboxRoot, ToolContext};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

/// Resolves once Ctrl-C is received; never resolves if the handler can't be installed
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    debug!("shutdown_signal: Ctrl-C received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Build command with dynamic after_help that shows the interpreter check
    let cmd = Cli::command().after_help(generate_after_help(&SandboxConfig::default().interpreter));
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    if let Some(workdir) = &cli.workdir {
        debug!(?workdir, "main: overriding sandbox root");
        config.sandbox.root = workdir.clone();
    }
    if let Some(max) = cli.max_iterations {
        debug!(max, "main: overriding max_iterations");
        config.agent.max_iterations = max;
    }

    config.validate()?;
    info!(
        "sandloop loaded config: provider={}, model={}",
        config.llm.provider,
        config.llm.model()
    );

    let root = open_sandbox(&config.sandbox.root)?;
    let ctx = ToolContext::with_settings(root, config.sandbox.tool_settings());
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;

    let (tx, rx) = events::channel();
    let printer = tokio::spawn(print_events(rx, cli.verbose));

    let mut engine = LoopEngine::new(LoopConfig::from_config(&config), llm, ctx).with_events(tx);
    let report = engine.run_until(&cli.prompt, shutdown_signal()).await;

    // Closing the channel lets the printer drain and exit
    drop(engine);
    if let Err(e) = printer.await {
        debug!(error = %e, "main: printer task failed");
    }

    info!(
        run_id = %report.run_id,
        iterations = report.iterations,
        input_tokens = report.usage.input_tokens,
        output_tokens = report.usage.output_tokens,
        elapsed_ms = report.elapsed().num_milliseconds(),
        "Run complete"
    );

    let (line, code) = render_termination(&report.termination, cli.verbose);
    if let Some(line) = line {
        if code == 0 {
            println!("{}", line);
        } else {
            eprintln!("{}", line);
        }
    }
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Canonicalize the sandbox root, creating it first if it does not exist
fn open_sandbox(root: &Path) -> Result<SandboxRoot> {
    debug!(?root, "open_sandbox: called");
    if !root.exists() {
        info!("Creating sandbox root {}", root.display());
        fs::create_dir_all(root).context(format!("Failed to create sandbox root {}", root.display()))?;
    }
    SandboxRoot::new(root).context("Failed to open sandbox root")
}
