//! Remote session trait

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::SessionError;
use crate::types::ExitStatus;

/// Readable half of a remote pipe (stdout or stderr)
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Writable half of a remote pipe (stdin)
pub type ByteSink = Box<dyn AsyncWrite + Send + Unpin>;

/// One authenticated session able to run a single command
///
/// Pipes must be taken before [`start`](RemoteSession::start); each pipe can
/// be taken once. A session is owned by exactly one operation and is never
/// shared between concurrent jobs.
#[async_trait]
pub trait RemoteSession: Send {
    /// Take the command's standard output
    fn stdout_pipe(&mut self) -> Result<ByteStream, SessionError>;

    /// Take the command's standard error
    fn stderr_pipe(&mut self) -> Result<ByteStream, SessionError>;

    /// Take the command's standard input
    ///
    /// Dropping or shutting down the sink sends EOF to the remote command.
    fn stdin_pipe(&mut self) -> Result<ByteSink, SessionError>;

    /// Start `command` without waiting for it
    async fn start(&mut self, command: &str) -> Result<(), SessionError>;

    /// Wait for the started command to exit
    async fn wait(&mut self) -> Result<ExitStatus, SessionError>;

    /// Start `command` and wait for it, failing on a non-zero exit status
    async fn run(&mut self, command: &str) -> Result<(), SessionError> {
        self.start(command).await?;
        let status = self.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(SessionError::ExitStatus(status.code()))
        }
    }

    /// Release the session
    async fn close(&mut self) -> Result<(), SessionError>;
}
