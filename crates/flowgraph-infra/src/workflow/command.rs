//! Shell command runner backing CLI nodes.
//!
//! Commands run through `sh -c` in their own process group so that
//! cancellation can take down the whole pipeline, not only the shell.
//! Captured stdout (followed by stderr, when non-empty) is capped at a byte
//! limit; anything past it is dropped and a truncation marker is appended.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Default cap on captured output, in bytes.
pub const DEFAULT_OUTPUT_LIMIT: usize = 100_000;

/// Exit code reported when the process was terminated by a signal.
const SIGNAL_EXIT_CODE: i32 = -1;

/// Output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub output: String,
    pub exit_code: i32,
    pub truncated: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("command cancelled")]
    Cancelled,

    #[error("failed to spawn shell: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to wait for command: {0}")]
    Wait(#[source] std::io::Error),
}

/// Runs shell commands with cancellation and an output cap.
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    output_limit: usize,
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_LIMIT)
    }
}

impl ShellCommandRunner {
    pub fn new(output_limit: usize) -> Self {
        Self { output_limit }
    }

    pub fn output_limit(&self) -> usize {
        self.output_limit
    }

    /// Run `command` under `sh -c`, optionally inside `cwd`.
    ///
    /// Returns [`CommandError::Cancelled`] once `cancel` trips; the process
    /// group has been killed and reaped by then.
    pub async fn run(
        &self,
        command: &str,
        cancel: &CancellationToken,
        cwd: Option<&Path>,
    ) -> Result<CommandOutput, CommandError> {
        if cancel.is_cancelled() {
            return Err(CommandError::Cancelled);
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(CommandError::Spawn)?;
        tracing::debug!(pid = ?child.id(), command, "command started");

        let limit = self.output_limit;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let collect = async {
            tokio::join!(read_capped(stdout, limit), read_capped(stderr, limit))
        };

        let ((out, out_truncated), (err, err_truncated)) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                terminate(&mut child).await;
                return Err(CommandError::Cancelled);
            }
            captured = collect => captured,
        };

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                terminate(&mut child).await;
                return Err(CommandError::Cancelled);
            }
            status = child.wait() => status.map_err(CommandError::Wait)?,
        };

        let mut output = String::from_utf8_lossy(&out).into_owned();
        if !err.is_empty() {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&String::from_utf8_lossy(&err));
        }
        let truncated = out_truncated || err_truncated || output.len() > limit;
        if output.len() > limit {
            truncate_at_char_boundary(&mut output, limit);
        }
        if truncated {
            tracing::warn!(limit, command, "command output truncated");
            output.push_str(&truncation_marker(limit));
        }

        let exit_code = status.code().unwrap_or(SIGNAL_EXIT_CODE);
        tracing::debug!(exit_code, bytes = output.len(), "command finished");
        Ok(CommandOutput {
            output,
            exit_code,
            truncated,
        })
    }
}

/// Quote `arg` for safe interpolation into a POSIX shell command.
pub fn escape_shell_arg(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

fn truncation_marker(limit: usize) -> String {
    format!("\n... [output truncated at {limit} bytes]")
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

/// Read to EOF, keeping at most `limit` bytes. The rest is drained so the
/// child never blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, limit: usize) -> (Vec<u8>, bool) {
    let Some(mut reader) = reader else {
        return (Vec::new(), false);
    };
    let mut kept = Vec::new();
    let mut truncated = false;
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(kept.len());
                if n > room {
                    truncated = true;
                }
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
            Err(err) => {
                tracing::debug!("stopped reading command output: {err}");
                break;
            }
        }
    }
    (kept, truncated)
}

/// Kill the child's process group, then the child itself, and reap it.
async fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        kill_process_group(pid).await;
    }
    if let Err(err) = child.start_kill() {
        tracing::debug!("failed to kill command: {err}");
    }
    let _ = child.wait().await;
    tracing::info!("command cancelled");
}

#[cfg(unix)]
async fn kill_process_group(pid: u32) {
    let group = format!("-{pid}");
    let killed = Command::new("kill")
        .args(["-s", "KILL", "--", group.as_str()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(err) = killed {
        tracing::debug!(pid, "failed to signal process group: {err}");
    }
}

#[cfg(not(unix))]
async fn kill_process_group(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let runner = ShellCommandRunner::default();
        let out = runner
            .run("echo hello; exit 3", &CancellationToken::new(), None)
            .await
            .unwrap();
        assert_eq!(out.output, "hello\n");
        assert_eq!(out.exit_code, 3);
        assert!(!out.truncated);
    }

    #[tokio::test]
    async fn test_stderr_appended_after_stdout() {
        let out = ShellCommandRunner::default()
            .run("printf out; printf err >&2", &CancellationToken::new(), None)
            .await
            .unwrap();
        assert_eq!(out.output, "out\nerr");
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn test_runs_in_cwd() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("marker.txt"), "found").await.unwrap();
        let out = ShellCommandRunner::default()
            .run("cat marker.txt", &CancellationToken::new(), Some(dir.path()))
            .await
            .unwrap();
        assert_eq!(out.output, "found");
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let out = ShellCommandRunner::new(10)
            .run("printf 'abcdefghijklmnopqrstuvwxyz'", &CancellationToken::new(), None)
            .await
            .unwrap();
        assert!(out.truncated);
        assert_eq!(out.output, format!("abcdefghij{}", truncation_marker(10)));
    }

    #[tokio::test]
    async fn test_cancel_kills_process_group() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = ShellCommandRunner::default()
            .run("sleep 30 | cat", &cancel, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_already_cancelled_does_not_spawn() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = ShellCommandRunner::default()
            .run("echo never", &cancel, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Cancelled));
    }

    #[test]
    fn test_escape_shell_arg() {
        assert_eq!(escape_shell_arg("plain"), "'plain'");
        assert_eq!(escape_shell_arg(""), "''");
        assert_eq!(escape_shell_arg("it's $HOME"), r"'it'\''s $HOME'");
    }

    #[tokio::test]
    async fn test_escaped_arg_round_trips_through_shell() {
        let arg = "a 'quoted' $VAR; rm -rf /";
        let out = ShellCommandRunner::default()
            .run(&format!("printf %s {}", escape_shell_arg(arg)), &CancellationToken::new(), None)
            .await
            .unwrap();
        assert_eq!(out.output, arg);
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let mut s = "héllo".to_string();
        truncate_at_char_boundary(&mut s, 2);
        assert_eq!(s, "h");
    }
}
