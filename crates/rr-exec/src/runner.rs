//! Blocking-style consumers of an execution stream
//!
//! [`run`] buffers output per origin and returns it once the command is done;
//! [`run_realtime`] hands every line to a callback as it arrives. Both return
//! only after the terminal outcome. A timeout is reported through
//! `timed_out`, never as an error.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;

use rr_core::{Connector, ExecError, ExitStatus, Origin, RemoteSession};

use crate::stream::{ExecEvent, ExecutionStream};

/// Command used to run a script fed on stdin
const SCRIPT_SHELL: &str = "sh -s";

/// Buffered result of a remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    /// Every stdout line, each followed by `\n`
    pub stdout: String,
    /// Every stderr line, each followed by `\n`
    pub stderr: String,
    /// The deadline fired before the output drained
    pub timed_out: bool,
    /// Exit status, when the command finished
    pub exit_status: Option<ExitStatus>,
}

impl RunOutput {
    /// Finished in time with exit status 0
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_status.is_some_and(|s| s.success())
    }
}

/// Result of a streamed command whose lines went to a callback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatus {
    /// The deadline fired before the output drained
    pub timed_out: bool,
    /// Exit status, when the command finished
    pub exit_status: Option<ExitStatus>,
}

impl RunStatus {
    /// Finished in time with exit status 0
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_status.is_some_and(|s| s.success())
    }
}

/// Drain `stream`, passing each line to `handler` in delivery order.
pub async fn consume<F>(mut stream: ExecutionStream, mut handler: F) -> Result<RunStatus, ExecError>
where
    F: FnMut(&str, Origin),
{
    while let Some(event) = stream.next_event().await {
        match event {
            ExecEvent::Line(line) => handler(line.text(), line.origin()),
            ExecEvent::Finished(outcome) => {
                if let Some(err) = outcome.err {
                    return Err(err);
                }
                return Ok(RunStatus {
                    timed_out: outcome.timed_out,
                    exit_status: outcome.exit_status,
                });
            }
        }
    }
    Err(ExecError::StreamClosed)
}

/// Drain `stream` into per-origin buffers.
pub async fn collect(stream: ExecutionStream) -> Result<RunOutput, ExecError> {
    let mut stdout = String::new();
    let mut stderr = String::new();
    let status = consume(stream, |text, origin| {
        let buf = match origin {
            Origin::Stdout => &mut stdout,
            Origin::Stderr => &mut stderr,
        };
        buf.push_str(text);
        buf.push('\n');
    })
    .await?;

    Ok(RunOutput {
        stdout,
        stderr,
        timed_out: status.timed_out,
        exit_status: status.exit_status,
    })
}

/// Run `command` on `session` and buffer its output.
pub async fn run(
    session: Box<dyn RemoteSession>,
    command: &str,
    timeout_secs: i64,
) -> Result<RunOutput, ExecError> {
    collect(ExecutionStream::start(session, command, timeout_secs).await?).await
}

/// Run `command` on `session`, calling `handler` for every line.
pub async fn run_realtime<F>(
    session: Box<dyn RemoteSession>,
    command: &str,
    timeout_secs: i64,
    handler: F,
) -> Result<RunStatus, ExecError>
where
    F: FnMut(&str, Origin),
{
    consume(
        ExecutionStream::start(session, command, timeout_secs).await?,
        handler,
    )
    .await
}

/// Runs commands on fresh sessions from one connector
#[derive(Clone)]
pub struct Runner {
    connector: Arc<dyn Connector>,
}

impl Runner {
    /// Create a runner for `connector`
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Connector sessions are opened from
    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// Start `command` on a new session and return its event stream
    pub async fn stream(&self, command: &str, timeout_secs: i64) -> Result<ExecutionStream, ExecError> {
        let session = self.connector.connect().await?;
        tracing::debug!("Running on {}: {}", self.connector.target(), command);
        ExecutionStream::start(session, command, timeout_secs).await
    }

    /// Run `command` and buffer its output
    pub async fn run(&self, command: &str, timeout_secs: i64) -> Result<RunOutput, ExecError> {
        collect(self.stream(command, timeout_secs).await?).await
    }

    /// Run `command`, calling `handler` for every line
    pub async fn run_realtime<F>(
        &self,
        command: &str,
        timeout_secs: i64,
        handler: F,
    ) -> Result<RunStatus, ExecError>
    where
        F: FnMut(&str, Origin),
    {
        consume(self.stream(command, timeout_secs).await?, handler).await
    }

    /// Run a multi-line script through the remote shell.
    ///
    /// The script is written to the shell's stdin, so it is not subject to
    /// command-line quoting or length limits.
    pub async fn run_script<F>(
        &self,
        script: &str,
        timeout_secs: i64,
        handler: F,
    ) -> Result<RunStatus, ExecError>
    where
        F: FnMut(&str, Origin),
    {
        let session = self.connector.connect().await?;
        tracing::debug!(
            "Running {}-byte script on {}",
            script.len(),
            self.connector.target()
        );
        let input = Bytes::copy_from_slice(script.as_bytes());
        let stream =
            ExecutionStream::start_with_input(session, SCRIPT_SHELL, Some(input), timeout_secs)
                .await?;
        consume(stream, handler).await
    }

    /// Read a local script file and run it with [`run_script`](Self::run_script)
    pub async fn run_script_file<F>(
        &self,
        path: &Path,
        timeout_secs: i64,
        handler: F,
    ) -> Result<RunStatus, ExecError>
    where
        F: FnMut(&str, Origin),
    {
        let script = tokio::fs::read_to_string(path).await?;
        self.run_script(&script, timeout_secs, handler).await
    }
}
