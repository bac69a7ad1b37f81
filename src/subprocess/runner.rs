use async_trait::async_trait;
use futures::stream::Stream;
use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

use super::error::ProcessError;

/// A fully described child process invocation.
///
/// `env` and `working_dir` are pass-through spawn options. The three stdio
/// channels are owned by the runner: they are always piped so input can be
/// delivered and output collected, and callers cannot override them.
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    /// Payload written to the child's stdin before the pipe is closed.
    pub stdin: Option<Vec<u8>>,
}

/// Collected result of a completed (or timed-out) run.
///
/// The buffers are populated exactly once, after both output pipes reached
/// end-of-stream and the wait finished.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration: Duration,
}

impl ProcessOutput {
    /// Stdout decoded lossily as UTF-8.
    pub fn stdout_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// Stderr decoded lossily as UTF-8.
    pub fn stderr_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Error(i32),
    Signal(i32),
    /// The wait deadline elapsed before the child exited. The output buffers
    /// hold whatever had been produced up to that point.
    Timeout,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Success => Some(0),
            ExitStatus::Error(code) => Some(*code),
            _ => None,
        }
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, ExitStatus::Timeout)
    }
}

pub type ProcessStreamItem = Result<String, ProcessError>;
pub type ProcessStreamFut = Pin<Box<dyn Stream<Item = ProcessStreamItem> + Send>>;
pub type ProcessStatusFut =
    Pin<Box<dyn Future<Output = Result<ExitStatus, ProcessError>> + Send>>;

/// Live handles for the streaming consumption mode.
///
/// Each line stream is finite, ending at that channel's end-of-stream, and is
/// not restartable: it consumes the underlying pipe, so it must not be mixed
/// with full-buffer collection on the same channel within one process
/// lifetime.
pub struct ProcessStream {
    pub stdout: ProcessStreamFut,
    pub stderr: ProcessStreamFut,
    pub status: ProcessStatusFut,
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion, collecting both output channels.
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError>;

    /// Spawn and hand back lazy per-channel line streams plus a status future.
    async fn run_streaming(&self, command: ProcessCommand) -> Result<ProcessStream, ProcessError>;
}

pub struct TokioProcessRunner;

impl TokioProcessRunner {
    /// Normalize a line by removing the trailing newline
    fn normalize_line(mut line: String) -> String {
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        line
    }

    /// Create a lazy line stream from a buffered reader
    fn create_line_stream<R>(reader: BufReader<R>) -> ProcessStreamFut
    where
        R: tokio::io::AsyncRead + Send + Unpin + 'static,
    {
        use tokio::io::AsyncBufReadExt;

        Box::pin(futures::stream::unfold(reader, |mut reader| async move {
            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) => None, // EOF
                Ok(_) => Some((Ok(Self::normalize_line(line)), reader)),
                Err(e) => Some((Err(ProcessError::Io(e)), reader)),
            }
        })) as ProcessStreamFut
    }

    /// Configure the command with pass-through options and runner-owned stdio
    fn configure_command(command: &ProcessCommand) -> Command {
        let mut cmd = Command::new(&command.program);

        // Keep anything the child spawns in one group so a kill on timeout
        // reaches it too.
        #[cfg(unix)]
        cmd.process_group(0);

        cmd.args(&command.args);
        for (key, value) in &command.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        // All three channels belong to the runner; caller overrides are not
        // part of the surface.
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        // An abandoned child must not linger as a zombie.
        cmd.kill_on_drop(true);

        cmd
    }

    /// Spawn the child, mapping a missing executable to `CommandNotFound`
    fn spawn_child(command: &ProcessCommand) -> Result<Child, ProcessError> {
        Self::log_command_start(command);
        Self::configure_command(command).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProcessError::CommandNotFound(command.program.clone())
            } else {
                ProcessError::Spawn {
                    command: format!("{} {}", command.program, command.args.join(" ")),
                    source: e,
                }
            }
        })
    }

    /// Deliver the stdin payload and close the pipe to signal end-of-input.
    ///
    /// A child that exits before reading everything produces a broken pipe;
    /// partial or no delivery is acceptable, so that is swallowed.
    async fn write_stdin(mut stdin: ChildStdin, data: &[u8]) -> Result<(), ProcessError> {
        if let Err(e) = stdin.write_all(data).await {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                tracing::debug!("Child closed stdin early; {} bytes undelivered", data.len());
                return Ok(());
            }
            return Err(ProcessError::Io(e));
        }
        if let Err(e) = stdin.shutdown().await {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(ProcessError::Io(e));
            }
        }
        Ok(())
    }

    /// Take ownership of an output pipe, converting None to an error
    fn take_pipe<T>(pipe: Option<T>, name: &'static str) -> Result<T, ProcessError> {
        pipe.ok_or(ProcessError::PipeUnavailable(name))
    }

    /// Drain one output pipe to completion on its own task.
    ///
    /// One task per channel: a sequential read-then-read can deadlock when the
    /// child fills the OS buffer of the channel nobody is reading yet.
    fn spawn_drain<R>(mut reader: R) -> JoinHandle<std::io::Result<Vec<u8>>>
    where
        R: tokio::io::AsyncRead + Send + Unpin + 'static,
    {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).await?;
            Ok(buf)
        })
    }

    async fn join_drain(
        task: JoinHandle<std::io::Result<Vec<u8>>>,
    ) -> Result<Vec<u8>, ProcessError> {
        match task.await {
            Ok(Ok(buf)) => Ok(buf),
            Ok(Err(e)) => Err(ProcessError::Io(e)),
            Err(e) => Err(ProcessError::Io(std::io::Error::other(e))),
        }
    }

    /// Wait for exit, bounded by `timeout` if given.
    ///
    /// On expiry the child is killed so the drain tasks reach end-of-stream
    /// and can be joined; the outcome is `ExitStatus::Timeout`, not an error.
    async fn wait_child(
        child: &mut Child,
        timeout: Option<Duration>,
    ) -> Result<ExitStatus, ProcessError> {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(Ok(status)) => Ok(Self::parse_exit_status(status)),
                Ok(Err(e)) => Err(ProcessError::Io(e)),
                Err(_) => {
                    Self::kill_child(child);
                    let _ = child.wait().await; // reap; completes promptly after the kill
                    Ok(ExitStatus::Timeout)
                }
            },
            None => child
                .wait()
                .await
                .map(Self::parse_exit_status)
                .map_err(ProcessError::Io),
        }
    }

    /// Kill the child and everything it spawned.
    ///
    /// The child was placed in its own process group, so signaling the group
    /// also closes pipe write ends held by grandchildren; without that the
    /// drain tasks could outlive the deadline waiting for end-of-stream.
    fn kill_child(child: &mut Child) {
        #[cfg(unix)]
        if let Some(pid) = child.id() {
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;
            let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }
        let _ = child.start_kill();
    }

    fn parse_exit_status(status: std::process::ExitStatus) -> ExitStatus {
        if status.success() {
            ExitStatus::Success
        } else if let Some(code) = status.code() {
            ExitStatus::Error(code)
        } else {
            Self::parse_signal_status(status)
        }
    }

    #[cfg(unix)]
    fn parse_signal_status(status: std::process::ExitStatus) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            ExitStatus::Signal(signal)
        } else {
            ExitStatus::Error(1)
        }
    }

    #[cfg(not(unix))]
    fn parse_signal_status(_status: std::process::ExitStatus) -> ExitStatus {
        ExitStatus::Error(1)
    }

    fn log_command_start(command: &ProcessCommand) {
        tracing::debug!(
            "Spawning child process: {} {}",
            command.program,
            command.args.join(" ")
        );
        if let Some(ref dir) = command.working_dir {
            tracing::trace!("Working directory: {:?}", dir);
        }
        if let Some(ref stdin) = command.stdin {
            tracing::trace!("Stdin payload: {} bytes", stdin.len());
        }
    }

    fn log_result(result: &ProcessOutput, command: &ProcessCommand) {
        let command_str = format!("{} {}", command.program, command.args.join(" "));
        match &result.status {
            ExitStatus::Success => {
                tracing::debug!(
                    "Child completed successfully in {:?}: {}",
                    result.duration,
                    command_str
                );
                tracing::trace!("Stdout length: {} bytes", result.stdout.len());
                tracing::trace!("Stderr length: {} bytes", result.stderr.len());
            }
            ExitStatus::Error(code) => {
                tracing::debug!(
                    "Child exited with code {} in {:?}: {}",
                    code,
                    result.duration,
                    command_str
                );
            }
            ExitStatus::Signal(signal) => {
                tracing::warn!(
                    "Child terminated by signal {} in {:?}: {}",
                    signal,
                    result.duration,
                    command_str
                );
            }
            ExitStatus::Timeout => {
                tracing::warn!(
                    "Child did not exit within the deadline ({:?} elapsed): {}",
                    result.duration,
                    command_str
                );
            }
        }
    }

    /// Create the status future handed out by `run_streaming`
    fn create_status_future(mut child: Child, timeout: Option<Duration>) -> ProcessStatusFut {
        Box::pin(async move { Self::wait_child(&mut child, timeout).await })
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: ProcessCommand) -> Result<ProcessOutput, ProcessError> {
        let start = Instant::now();

        let mut child = Self::spawn_child(&command)?;

        // Drains start before the stdin transfer: a child that produces more
        // than a pipe buffer of output while still reading its input would
        // otherwise deadlock against the write below.
        let stdout = Self::take_pipe(child.stdout.take(), "stdout")?;
        let stderr = Self::take_pipe(child.stderr.take(), "stderr")?;
        let stdout_task = Self::spawn_drain(stdout);
        let stderr_task = Self::spawn_drain(stderr);

        // Closing the write end (with or without a payload) gives the child
        // its end-of-input.
        match (child.stdin.take(), command.stdin.as_deref()) {
            (Some(stdin), Some(data)) => Self::write_stdin(stdin, data).await?,
            (pipe, _) => drop(pipe),
        }

        let status = Self::wait_child(&mut child, command.timeout).await?;

        // Both drains are joined before the result is assembled, even on the
        // timeout path (the kill above closed the pipes).
        let stdout = Self::join_drain(stdout_task).await?;
        let stderr = Self::join_drain(stderr_task).await?;

        let result = ProcessOutput {
            status,
            stdout,
            stderr,
            duration: start.elapsed(),
        };
        Self::log_result(&result, &command);
        Ok(result)
    }

    async fn run_streaming(&self, mut command: ProcessCommand) -> Result<ProcessStream, ProcessError> {
        let mut child = Self::spawn_child(&command)?;

        // The transfer runs on its own task: an echoing child fills its
        // stdout while still reading input, and the caller cannot start
        // consuming the streams until this method returns. Awaiting the
        // write here would deadlock for payloads beyond the pipe buffer.
        match (child.stdin.take(), command.stdin.take()) {
            (Some(stdin), Some(data)) => {
                tokio::spawn(async move {
                    if let Err(e) = Self::write_stdin(stdin, &data).await {
                        tracing::debug!("Stdin transfer failed: {}", e);
                    }
                });
            }
            (pipe, _) => drop(pipe),
        }

        let stdout = Self::take_pipe(child.stdout.take(), "stdout")?;
        let stderr = Self::take_pipe(child.stderr.take(), "stderr")?;

        Ok(ProcessStream {
            stdout: Self::create_line_stream(BufReader::new(stdout)),
            stderr: Self::create_line_stream(BufReader::new(stderr)),
            status: Self::create_status_future(child, command.timeout),
        })
    }
}
