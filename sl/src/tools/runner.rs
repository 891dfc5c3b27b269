//! Process runner - interpreter subprocess with a hard timeout
//!
//! stdout and stderr are captured separately and never merged. The script runs
//! in its own process group, which is killed once the run is over whether it
//! exited or timed out. On timeout the child is reaped before returning.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use super::ToolResult;

/// Returned when the process ran cleanly and printed nothing
pub const NO_OUTPUT: &str = "No output produced.";

/// Everything needed to run one script
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub interpreter: String,
    pub script: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
    pub max_output_chars: usize,
}

/// Run `interpreter script args...` and render the outcome as a tool result
pub async fn run(spec: &ProcessSpec) -> ToolResult {
    debug!(interpreter = %spec.interpreter, script = ?spec.script, args = ?spec.args, cwd = ?spec.cwd, "run: called");

    let mut command = tokio::process::Command::new(&spec.interpreter);
    command
        .arg(&spec.script)
        .args(&spec.args)
        .current_dir(&spec.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    command.process_group(0);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            debug!(error = %e, "run: spawn failed");
            return ToolResult::error(format!("executing script: {}", e));
        }
    };
    let pid = child.id();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // One deadline covers the exit and both pipes; a background process
    // holding a pipe open counts against the timeout
    let outcome = tokio::time::timeout(spec.timeout, async {
        let (status, stdout, stderr) = tokio::join!(child.wait(), read_stream(stdout), read_stream(stderr));
        status.map(|status| (status, stdout, stderr))
    })
    .await;

    // Anything the script left behind in its group goes with it
    kill_process_group(pid);

    match outcome {
        Ok(Ok((status, stdout, stderr))) => {
            debug!(?status, stdout_len = stdout.len(), stderr_len = stderr.len(), "run: process exited");
            ToolResult::success(format_output(
                &String::from_utf8_lossy(&stdout),
                &String::from_utf8_lossy(&stderr),
                exit_code(status),
                spec.max_output_chars,
            ))
        }
        Ok(Err(e)) => {
            debug!(error = %e, "run: wait failed");
            ToolResult::error(format!("executing script: {}", e))
        }
        Err(_) => {
            warn!(script = ?spec.script, timeout = ?spec.timeout, "Script timed out, killing process");
            if let Err(e) = child.kill().await {
                debug!(error = %e, "run: child already reaped");
            }
            ToolResult::error(format!(
                "executing script: Process timed out after {}",
                format_secs(spec.timeout)
            ))
        }
    }
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream
        && let Err(e) = stream.read_to_end(&mut buf).await
    {
        debug!(error = %e, "read_stream: read failed");
    }
    buf
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) {
        // ESRCH just means the group is already gone
        if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
            debug!(%pid, error = %e, "kill_process_group: killpg failed");
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Exit code, or the negated signal number for signal-terminated processes
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }

    -1
}

fn format_secs(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

/// Cap a stream at `max` characters, appending a marker when cut
fn cap_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}\n[... output truncated at {} characters]", &text[..cut], max),
        None => text.to_string(),
    }
}

/// Compose the STDOUT / STDERR / exit-code report
pub fn format_output(stdout: &str, stderr: &str, code: i32, max_output_chars: usize) -> String {
    let mut parts = Vec::new();

    if !stdout.is_empty() {
        parts.push(format!("STDOUT:\n{}", cap_chars(stdout, max_output_chars)));
    }
    if !stderr.is_empty() {
        parts.push(format!("STDERR:\n{}", cap_chars(stderr, max_output_chars)));
    }
    if code != 0 {
        parts.push(format!("Process exited with code {}", code));
    }

    if parts.is_empty() {
        NO_OUTPUT.to_string()
    } else {
        parts.join("\n")
    }
}
