//! One command on one russh session channel
//!
//! Pipes handed to callers are in-memory duplex halves. After `start`, a
//! pump task owns the channel: it routes channel data to the stdout and
//! stderr pipes, forwards stdin to the channel, and records the exit status.
//! Output for a pipe nobody took is discarded.

use std::io;

use async_trait::async_trait;
use russh::client::{Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use rr_core::{ByteSink, ByteStream, ExitStatus, RemoteSession, SessionError};

use crate::connector::ClientHandler;

/// Buffer between the pump and a pipe's reader or writer.
const PIPE_BUFFER: usize = 64 * 1024;

/// Extended data type code for stderr
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// A russh-backed [`RemoteSession`]
pub struct RusshSession {
    handle: Handle<ClientHandler>,
    channel: Option<Channel<Msg>>,
    stdout: Option<DuplexStream>,
    stderr: Option<DuplexStream>,
    stdin: Option<DuplexStream>,
    pump: Option<PumpTask>,
}

/// Pump task handle that aborts the task when dropped, so a session dropped
/// without `wait` or `close` never leaves its channel running.
struct PumpTask(JoinHandle<Result<Option<u32>, SessionError>>);

impl Drop for PumpTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl RusshSession {
    pub(crate) fn new(handle: Handle<ClientHandler>, channel: Channel<Msg>) -> Self {
        Self {
            handle,
            channel: Some(channel),
            stdout: None,
            stderr: None,
            stdin: None,
            pump: None,
        }
    }

    fn ensure_not_started(&self) -> Result<(), SessionError> {
        if self.channel.is_none() {
            Err(SessionError::AlreadyStarted)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteSession for RusshSession {
    fn stdout_pipe(&mut self) -> Result<ByteStream, SessionError> {
        self.ensure_not_started()?;
        if self.stdout.is_some() {
            return Err(SessionError::PipeTaken("stdout"));
        }
        let (ours, theirs) = tokio::io::duplex(PIPE_BUFFER);
        self.stdout = Some(ours);
        Ok(Box::new(theirs))
    }

    fn stderr_pipe(&mut self) -> Result<ByteStream, SessionError> {
        self.ensure_not_started()?;
        if self.stderr.is_some() {
            return Err(SessionError::PipeTaken("stderr"));
        }
        let (ours, theirs) = tokio::io::duplex(PIPE_BUFFER);
        self.stderr = Some(ours);
        Ok(Box::new(theirs))
    }

    fn stdin_pipe(&mut self) -> Result<ByteSink, SessionError> {
        self.ensure_not_started()?;
        if self.stdin.is_some() {
            return Err(SessionError::PipeTaken("stdin"));
        }
        let (ours, theirs) = tokio::io::duplex(PIPE_BUFFER);
        self.stdin = Some(ours);
        Ok(Box::new(theirs))
    }

    async fn start(&mut self, command: &str) -> Result<(), SessionError> {
        let channel = self.channel.take().ok_or(SessionError::AlreadyStarted)?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| SessionError::Channel(e.to_string()))?;
        tracing::debug!("exec: {}", command);

        self.pump = Some(PumpTask(tokio::spawn(pump(
            channel,
            self.stdout.take(),
            self.stderr.take(),
            self.stdin.take(),
        ))));
        Ok(())
    }

    async fn wait(&mut self) -> Result<ExitStatus, SessionError> {
        let mut pump = self.pump.take().ok_or(SessionError::NotStarted)?;
        let status = (&mut pump.0)
            .await
            .map_err(|e| SessionError::Channel(format!("channel task failed: {e}")))??;
        status.map(ExitStatus).ok_or(SessionError::NoExitStatus)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        drop(self.pump.take());
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| SessionError::Channel(e.to_string()))
    }
}

/// Move bytes between the channel and the local pipes until the channel closes.
///
/// Returns the exit status, if the server sent one.
async fn pump(
    mut channel: Channel<Msg>,
    mut stdout: Option<DuplexStream>,
    mut stderr: Option<DuplexStream>,
    mut stdin: Option<DuplexStream>,
) -> Result<Option<u32>, SessionError> {
    enum Step {
        Remote(Option<ChannelMsg>),
        Input(io::Result<usize>),
    }

    let mut exit_status = None;
    let mut buf = vec![0u8; PIPE_BUFFER];

    loop {
        let step = match stdin.as_mut() {
            Some(input) => tokio::select! {
                msg = channel.wait() => Step::Remote(msg),
                read = input.read(&mut buf) => Step::Input(read),
            },
            None => Step::Remote(channel.wait().await),
        };

        match step {
            Step::Input(Ok(0)) | Step::Input(Err(_)) => {
                stdin = None;
                channel
                    .eof()
                    .await
                    .map_err(|e| SessionError::Channel(e.to_string()))?;
            }
            Step::Input(Ok(n)) => {
                channel
                    .data(&buf[..n])
                    .await
                    .map_err(|e| SessionError::Channel(e.to_string()))?;
            }
            Step::Remote(Some(ChannelMsg::Data { data })) => {
                deliver(&mut stdout, &data, "stdout").await;
            }
            Step::Remote(Some(ChannelMsg::ExtendedData { data, ext })) => {
                if ext == SSH_EXTENDED_DATA_STDERR {
                    deliver(&mut stderr, &data, "stderr").await;
                }
            }
            Step::Remote(Some(ChannelMsg::ExitStatus { exit_status: code })) => {
                exit_status = Some(code);
            }
            Step::Remote(Some(ChannelMsg::Eof)) => {
                // Readers see EOF once the write halves are dropped
                stdout = None;
                stderr = None;
            }
            Step::Remote(Some(ChannelMsg::Close)) | Step::Remote(None) => break,
            Step::Remote(Some(_)) => {}
        }
    }

    Ok(exit_status)
}

async fn deliver(pipe: &mut Option<DuplexStream>, data: &[u8], name: &str) {
    if let Some(writer) = pipe.as_mut() {
        if let Err(e) = writer.write_all(data).await {
            tracing::debug!("{} reader went away: {}", name, e);
            *pipe = None;
        }
    }
}
