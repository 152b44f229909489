//! Builder for executing external tool commands.
//!
//! [`ToolCommand::execute`] captures the whole output and treats a non-zero
//! exit as an error; it is meant for short-lived helpers such as ffprobe.
//! [`ToolCommand::execute_streaming`] is for the long-running encoder and
//! muxer: output lines are delivered as they arrive, the caller decides what
//! a non-zero exit means, and the process is killed on cancellation.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use df_core::{Error, Result};

/// Default timeout for captured execution: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Capacity of the line channel between the pipe readers and the consumer.
const LINE_BUFFER: usize = 256;

/// Output captured from [`ToolCommand::execute`].
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// Result of [`ToolCommand::execute_streaming`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutput {
    /// Exit code, or `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    /// Every stdout line, in order.
    pub stdout: Vec<String>,
    /// Every stderr line, in order.
    pub stderr: Vec<String>,
}

impl ExecutionOutput {
    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Both streams joined into one log, stdout first.
    pub fn combined_log(&self) -> String {
        self.stdout
            .iter()
            .chain(self.stderr.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One line read from a child process pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use df_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> df_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "quiet", "-print_format", "json", "-show_format"])
///     .arg("/path/to/video.mkv")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    ///
    /// Captured execution defaults to 5 minutes; streaming execution has no
    /// limit unless one is set here.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = Some(d);
        self
    }

    /// The argument list.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// The program path.
    pub fn get_program(&self) -> &PathBuf {
        &self.program
    }

    /// Human-readable command line. Arguments containing whitespace or
    /// quotes are double-quoted.
    pub fn rendered(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .map(|a| quote(&a))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// [`Error::Tool`] if spawning fails, the process times out, or it exits
    /// with a non-zero status (message includes stderr).
    pub async fn execute(&self) -> Result<ToolOutput> {
        let tool = self.tool_name();
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| Error::tool(&tool, format!("failed to spawn: {e}")))?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(Error::tool(
                        tool,
                        format!(
                            "exited with status {}: {}",
                            output.status,
                            tool_output.stderr.trim()
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(Error::tool(tool, format!("I/O error waiting for process: {e}"))),
            // The child future is dropped here and kill_on_drop reaps it.
            Err(_elapsed) => Err(Error::tool(tool, format!("timed out after {timeout:?}"))),
        }
    }

    /// Execute the command, delivering output lines to the callbacks as they
    /// arrive.
    ///
    /// Each pipe has its own reader task feeding a bounded channel; the
    /// callbacks run on the calling task. Per-stream order is preserved,
    /// ordering across the two streams is not.
    ///
    /// A non-zero exit is not an error. Cancelling `cancel` kills the process
    /// group and returns [`Error::Cancelled`].
    pub async fn execute_streaming<O, E>(
        &self,
        mut on_stdout: O,
        mut on_stderr: E,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutput>
    where
        O: FnMut(&str) + Send,
        E: FnMut(&str) + Send,
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let tool = self.tool_name();
        tracing::debug!(tool = %tool, command = %self.rendered(), "spawning");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so descendants can be signalled together.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::tool(&tool, format!("failed to spawn: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::tool(&tool, "stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::tool(&tool, "stderr was not captured"))?;

        let (tx, mut rx) = mpsc::channel(LINE_BUFFER);
        let stdout_task = tokio::spawn(forward_lines(stdout, tx.clone(), OutputLine::Stdout));
        let stderr_task = tokio::spawn(forward_lines(stderr, tx, OutputLine::Stderr));

        let deadline = async {
            match self.timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(deadline);

        let mut output = ExecutionOutput::default();

        // Drain until both readers have hung up.
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    terminate(&mut child, &tool).await;
                    stdout_task.abort();
                    stderr_task.abort();
                    tracing::info!(tool = %tool, "process cancelled");
                    return Err(Error::Cancelled);
                }
                _ = &mut deadline => {
                    terminate(&mut child, &tool).await;
                    stdout_task.abort();
                    stderr_task.abort();
                    return Err(Error::tool(tool, format!("timed out after {:?}", self.timeout)));
                }
                line = rx.recv() => match line {
                    Some(OutputLine::Stdout(line)) => {
                        on_stdout(&line);
                        output.stdout.push(line);
                    }
                    Some(OutputLine::Stderr(line)) => {
                        on_stderr(&line);
                        output.stderr.push(line);
                    }
                    None => break,
                },
            }
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                terminate(&mut child, &tool).await;
                tracing::info!(tool = %tool, "process cancelled");
                return Err(Error::Cancelled);
            }
            _ = &mut deadline => {
                terminate(&mut child, &tool).await;
                return Err(Error::tool(tool, format!("timed out after {:?}", self.timeout)));
            }
            status = child.wait() => status
                .map_err(|e| Error::tool(&tool, format!("I/O error waiting for process: {e}")))?,
        };

        let _ = stdout_task.await;
        let _ = stderr_task.await;

        output.exit_code = status.code().unwrap_or(-1);
        tracing::debug!(tool = %tool, exit_code = output.exit_code, "process exited");
        Ok(output)
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::Sender<OutputLine>, wrap: fn(String) -> OutputLine)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(wrap(line)).await.is_err() {
            break;
        }
    }
}

/// Kill the child's process group, then the child itself. Failures are
/// logged only.
async fn terminate(child: &mut Child, tool: &str) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            tracing::debug!(tool, error = %e, "killpg failed");
        }
    }

    if let Err(e) = child.kill().await {
        tracing::debug!(tool, error = %e, "kill failed");
    }
}

fn quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '"') {
        return arg.to_string();
    }
    format!("\"{}\"", arg.replace('"', "\\\""))
}
