//! One remote command as a stream of output lines plus a terminal outcome
//!
//! # Event ordering
//!
//! A single driver task owns the event channel. It forwards lines from the
//! [`LineMultiplexer`] while racing two conditions:
//!
//! 1. both pipes drained, or
//! 2. the deadline elapsed.
//!
//! Whichever is ready first decides the outcome. A command that closes its
//! pipes and keeps running has completed; its exit status is collected within
//! whatever remains of the deadline and left unset if none arrives. On timeout
//! the driver emits one synthetic stderr line naming the command. It then
//! publishes exactly one [`ExecEvent::Finished`] and closes the channel, so
//! every line a consumer sees precedes the outcome and nothing follows it.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::Instant;

use rr_core::{
    bounded_timeout, ExecError, ExecutionOutcome, Origin, RemoteSession, SessionError, TaggedLine,
};

use crate::multiplexer::LineMultiplexer;

/// Events buffered between the driver and a slow consumer.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on releasing the session once the outcome is known.
const SESSION_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// One item of an execution's event stream
#[derive(Debug)]
pub enum ExecEvent {
    /// A line of output
    Line(TaggedLine),
    /// The terminal outcome; always the last event
    Finished(ExecutionOutcome),
}

/// A running remote command
///
/// Yields [`ExecEvent::Line`]s followed by exactly one
/// [`ExecEvent::Finished`], after which the stream ends.
pub struct ExecutionStream {
    events: mpsc::Receiver<ExecEvent>,
}

impl ExecutionStream {
    /// Start `command` on `session` with a deadline of `timeout_secs`.
    ///
    /// `timeout_secs <= 0` means practically unbounded. Pipe and start
    /// failures are returned here and no stream is produced.
    pub async fn start(
        session: Box<dyn RemoteSession>,
        command: &str,
        timeout_secs: i64,
    ) -> Result<Self, ExecError> {
        Self::start_with_input(session, command, None, timeout_secs).await
    }

    /// Like [`start`](Self::start), feeding `input` to the command's stdin
    /// and closing it afterwards.
    pub async fn start_with_input(
        mut session: Box<dyn RemoteSession>,
        command: &str,
        input: Option<Bytes>,
        timeout_secs: i64,
    ) -> Result<Self, ExecError> {
        let wants_stdin = input.is_some();
        let setup = async {
            let stdout = session.stdout_pipe()?;
            let stderr = session.stderr_pipe()?;
            let stdin = if wants_stdin {
                Some(session.stdin_pipe()?)
            } else {
                None
            };
            session.start(command).await?;
            Ok::<_, SessionError>((stdout, stderr, stdin))
        };

        let (stdout, stderr, stdin) = match setup.await {
            Ok(pipes) => pipes,
            Err(e) => {
                release(session.as_mut()).await;
                return Err(ExecError::Setup(e));
            }
        };
        tracing::debug!("Started remote command: {}", command);

        if let (Some(mut sink), Some(payload)) = (stdin, input) {
            tokio::spawn(async move {
                if let Err(e) = sink.write_all(&payload).await {
                    tracing::debug!("Failed to write command input: {}", e);
                }
                let _ = sink.shutdown().await;
            });
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mux = LineMultiplexer::new(stdout, stderr);
        tokio::spawn(drive(
            session,
            mux,
            command.to_string(),
            bounded_timeout(timeout_secs),
            events_tx,
        ));

        Ok(Self { events: events_rx })
    }

    /// Next event, or `None` after the outcome has been delivered
    pub async fn next_event(&mut self) -> Option<ExecEvent> {
        self.events.recv().await
    }
}

impl Stream for ExecutionStream {
    type Item = ExecEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<ExecEvent>> {
        self.events.poll_recv(cx)
    }
}

/// Text of the synthetic stderr line emitted on timeout
pub fn timeout_message(command: &str) -> String {
    format!("Run command timeout: {command}")
}

async fn drive(
    mut session: Box<dyn RemoteSession>,
    mut mux: LineMultiplexer,
    command: String,
    timeout: Duration,
    events: mpsc::Sender<ExecEvent>,
) {
    let deadline = Instant::now() + timeout;
    let drained = tokio::select! {
        _ = forward_lines(&mut mux, &events) => true,
        _ = tokio::time::sleep_until(deadline) => false,
    };
    drop(mux);

    let outcome = if drained {
        match tokio::time::timeout_at(deadline, session.wait()).await {
            Ok(Ok(status)) => ExecutionOutcome::completed(Some(status)),
            Ok(Err(e)) => ExecutionOutcome::failed(ExecError::Wait(e)),
            Err(_) => {
                tracing::debug!("No exit status before the deadline: {}", command);
                ExecutionOutcome::completed(None)
            }
        }
    } else {
        tracing::debug!("Remote command timed out after {:?}: {}", timeout, command);
        let notice = TaggedLine::new(timeout_message(&command), Origin::Stderr);
        let _ = events.send(ExecEvent::Line(notice)).await;
        ExecutionOutcome::timed_out()
    };

    release(session.as_mut()).await;
    let _ = events.send(ExecEvent::Finished(outcome)).await;
}

async fn forward_lines(mux: &mut LineMultiplexer, events: &mpsc::Sender<ExecEvent>) {
    while let Some(line) = mux.next().await {
        if events.send(ExecEvent::Line(line)).await.is_err() {
            tracing::debug!("Execution stream dropped before output drained");
            break;
        }
    }
}

async fn release(session: &mut dyn RemoteSession) {
    match tokio::time::timeout(SESSION_CLOSE_TIMEOUT, session.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("Failed to close session: {}", e),
        Err(_) => tracing::debug!("Timed out closing session"),
    }
}
