// src/system/executor.rs

use crate::CancellationToken;
use log::Level;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error("Command '{0}' was not found.")]
    NotFound(String),
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, #[source] std::io::Error),
    #[error("Command '{command}' exited with a non-zero error code ({code:?}).")]
    NonZeroExitStatus { command: String, code: Option<i32> },
    #[error("Command '{0}' was interrupted.")]
    Interrupted(String),
}

/// Runs external programs on behalf of commands.
///
/// Every launch uses the project directory as working directory when one is
/// set, and every long wait can be interrupted through the process
/// [`CancellationToken`].
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    project_dir: Option<PathBuf>,
    cancellation: CancellationToken,
}

impl ShellExecutor {
    pub fn new(project_dir: Option<PathBuf>, cancellation: CancellationToken) -> Self {
        Self {
            project_dir,
            cancellation,
        }
    }

    pub fn project_dir(&self) -> Option<&Path> {
        self.project_dir.as_deref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    fn command(&self, program: &str, args: &[&str]) -> Command {
        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null());
        if let Some(dir) = &self.project_dir {
            command.current_dir(dunce::simplified(dir));
        }
        command
    }

    /// Runs a command to completion and returns its captured stdout.
    ///
    /// Stdout and stderr lines are also streamed to the debug log as they
    /// arrive. A missing binary is reported as [`ExecutionError::NotFound`].
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<String, ExecutionError> {
        let display = display_command(program, args);
        if program.trim().is_empty() {
            return Err(ExecutionError::EmptyCommand);
        }
        if self.cancellation.is_cancelled() {
            return Err(ExecutionError::Interrupted(display));
        }

        log::debug!("Running '{}'", display);
        let mut child = self
            .command(program, args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(program, &display, e))?;

        let stdout = child.stdout.take().map(|out| {
            let name = program.to_string();
            tokio::spawn(async move { collect_lines(out, &name, Level::Debug).await })
        });
        let stderr = child.stderr.take().map(|err| {
            let name = program.to_string();
            tokio::spawn(async move { collect_lines(err, &name, Level::Debug).await })
        });

        let status = self.wait_or_cancel(&mut child, &display).await?;

        let output = match stdout {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        if let Some(task) = stderr {
            let _ = task.await;
        }

        if !status.success() {
            return Err(ExecutionError::NonZeroExitStatus {
                command: display,
                code: status.code(),
            });
        }
        Ok(output)
    }

    /// Like [`run`](Self::run) but returns `Ok(None)` when the binary is not
    /// installed, so callers can tell "not installed" from a real failure.
    pub async fn cmdinfo(
        &self,
        program: &str,
        args: &[&str],
    ) -> Result<Option<String>, ExecutionError> {
        match self.run(program, args).await {
            Ok(output) => Ok(Some(output.trim().to_string())),
            Err(ExecutionError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Starts a long-running process with piped output and returns it
    /// without waiting. The child is killed if its handle is dropped.
    pub fn spawn(
        &self,
        program: &str,
        args: &[&str],
        envs: &[(&str, &str)],
    ) -> Result<Child, ExecutionError> {
        let display = display_command(program, args);
        if program.trim().is_empty() {
            return Err(ExecutionError::EmptyCommand);
        }

        log::debug!("Spawning '{}'", display);
        self.command(program, args)
            .envs(envs.iter().copied())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(program, &display, e))
    }

    async fn wait_or_cancel(
        &self,
        child: &mut Child,
        display: &str,
    ) -> Result<ExitStatus, ExecutionError> {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => {
                log::debug!("Cancellation requested, killing '{}' (PID: {:?})...", display, child.id());
                if let Err(e) = child.kill().await {
                    log::warn!("Failed to kill child process '{}': {}", display, e);
                }
                Err(ExecutionError::Interrupted(display.to_string()))
            }
            status = child.wait() => {
                status.map_err(|e| ExecutionError::CommandFailed(display.to_string(), e))
            }
        }
    }
}

fn spawn_error(program: &str, display: &str, e: std::io::Error) -> ExecutionError {
    if e.kind() == ErrorKind::NotFound {
        ExecutionError::NotFound(program.to_string())
    } else {
        ExecutionError::CommandFailed(display.to_string(), e)
    }
}

fn display_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Reads a stream line by line, logging each line at `level` and returning
/// the whole text. Invalid UTF-8 is replaced rather than ending the read, so
/// the writer never sees its pipe close early.
pub(crate) async fn collect_lines<R>(reader: R, name: &str, level: Level) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut collected = String::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end_matches(['\n', '\r']);
                log::log!(level, "[{}] {}", name, line);
                collected.push_str(line);
                collected.push('\n');
            }
            Err(e) => {
                log::debug!("[{}] stopped reading output: {}", name, e);
                break;
            }
        }
    }
    collected
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let shell = ShellExecutor::new(None, CancellationToken::new());
        let output = shell.run("sh", &["-c", "echo hello; echo oops >&2"]).await.unwrap();
        assert_eq!(output, "hello\n");
    }

    #[tokio::test]
    async fn test_run_uses_project_dir_as_cwd() {
        let dir = tempdir().unwrap();
        let shell = ShellExecutor::new(Some(dir.path().to_path_buf()), CancellationToken::new());
        let output = shell.run("pwd", &[]).await.unwrap();
        assert_eq!(
            dunce::canonicalize(output.trim()).unwrap(),
            dunce::canonicalize(dir.path()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_run_reports_non_zero_exit() {
        let shell = ShellExecutor::new(None, CancellationToken::new());
        let err = shell.run("sh", &["-c", "exit 3"]).await.unwrap_err();
        assert!(matches!(err, ExecutionError::NonZeroExitStatus { code: Some(3), .. }));
    }

    #[tokio::test]
    async fn test_cmdinfo_missing_binary_is_none() {
        let shell = ShellExecutor::new(None, CancellationToken::new());
        let info = shell.cmdinfo("ionic-test-binary-that-does-not-exist", &["-v"]).await.unwrap();
        assert_eq!(info, None);
    }

    #[tokio::test]
    async fn test_cmdinfo_trims_output() {
        let shell = ShellExecutor::new(None, CancellationToken::new());
        let info = shell.cmdinfo("sh", &["-c", "echo '  6.4.1  '"]).await.unwrap();
        assert_eq!(info.as_deref(), Some("6.4.1"));
    }

    #[tokio::test]
    async fn test_run_keeps_output_after_invalid_utf8() {
        let shell = ShellExecutor::new(None, CancellationToken::new());
        let output = shell
            .run("sh", &["-c", "printf 'a\\377b\\n'; echo 6.4.1"])
            .await
            .unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines, vec!["a\u{FFFD}b", "6.4.1"]);
    }

    #[tokio::test]
    async fn test_cmdinfo_survives_invalid_utf8() {
        let shell = ShellExecutor::new(None, CancellationToken::new());
        let info = shell
            .cmdinfo("sh", &["-c", "printf '\\377\\n'; echo 6.4.1"])
            .await
            .unwrap()
            .unwrap();
        assert!(info.ends_with("6.4.1"), "got {info:?}");
    }

    #[tokio::test]
    async fn test_collect_lines_handles_crlf_and_missing_final_newline() {
        let input: &[u8] = b"first\r\nsecond";
        let text = collect_lines(input, "test", Level::Trace).await;
        assert_eq!(text, "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_cmdinfo_propagates_real_failures() {
        let shell = ShellExecutor::new(None, CancellationToken::new());
        assert!(shell.cmdinfo("sh", &["-c", "exit 1"]).await.is_err());
    }

    #[tokio::test]
    async fn test_run_is_interrupted_by_cancellation() {
        let token = CancellationToken::new();
        let shell = ShellExecutor::new(None, token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), shell.run("sleep", &["30"]))
            .await
            .expect("run should stop once cancelled");
        assert!(matches!(result, Err(ExecutionError::Interrupted(_))));
        canceller.await.unwrap();
    }

    #[test]
    fn test_empty_command_is_rejected() {
        let shell = ShellExecutor::new(None, CancellationToken::new());
        assert!(matches!(shell.spawn("  ", &[], &[]), Err(ExecutionError::EmptyCommand)));
    }
}
