//! In-memory sessions for tests
//!
//! `FakeConnector` hands out `FakeSession`s whose behavior is chosen per
//! command by a responder closure, and records what every session was asked
//! to do so tests can assert on it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use crate::error::{ConnectionError, SessionError};
use crate::traits::{ByteSink, ByteStream, Connector, RemoteSession};
use crate::types::ExitStatus;

const PIPE_BUFFER: usize = 64 * 1024;

/// Scripted behavior of one remote command
#[derive(Debug, Clone, Default)]
pub struct FakeResponse {
    stdout: String,
    stderr: String,
    exit_status: u32,
    delay: Duration,
    linger: Duration,
    hang: bool,
    fail_start: bool,
}

impl FakeResponse {
    /// A command that prints nothing and exits 0
    pub fn ok() -> Self {
        Self::default()
    }

    /// Bytes written to stdout
    pub fn stdout(mut self, text: impl Into<String>) -> Self {
        self.stdout = text.into();
        self
    }

    /// Bytes written to stderr
    pub fn stderr(mut self, text: impl Into<String>) -> Self {
        self.stderr = text.into();
        self
    }

    /// Exit status reported by `wait`
    pub fn exit_status(mut self, status: u32) -> Self {
        self.exit_status = status;
        self
    }

    /// Hold back the exit status this long after writing the output
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Keep both pipes open this long after writing the output
    pub fn linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    /// Never close the pipes or report an exit status
    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Fail `start` instead of running
    pub fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }
}

type Responder = Arc<dyn Fn(&str) -> FakeResponse + Send + Sync>;

#[derive(Debug, Default)]
struct Journal {
    opened: usize,
    closed: usize,
    commands: Vec<String>,
    stdin: Vec<(String, Vec<u8>)>,
}

/// Connector producing [`FakeSession`]s
#[derive(Clone)]
pub struct FakeConnector {
    responder: Responder,
    journal: Arc<Mutex<Journal>>,
    unreachable: bool,
}

impl FakeConnector {
    /// Respond to each command with `responder(command)`
    pub fn new(responder: impl Fn(&str) -> FakeResponse + Send + Sync + 'static) -> Self {
        Self {
            responder: Arc::new(responder),
            journal: Arc::default(),
            unreachable: false,
        }
    }

    /// Respond to every command the same way
    pub fn always(response: FakeResponse) -> Self {
        Self::new(move |_| response.clone())
    }

    /// A connector whose host cannot be reached
    pub fn unreachable() -> Self {
        let mut connector = Self::always(FakeResponse::ok());
        connector.unreachable = true;
        connector
    }

    /// A session sharing this connector's responder and journal
    pub fn session(&self) -> FakeSession {
        self.journal().opened += 1;
        FakeSession::new(Arc::clone(&self.responder), Arc::clone(&self.journal))
    }

    /// Sessions opened so far
    pub fn opened(&self) -> usize {
        self.journal().opened
    }

    /// Sessions closed so far
    pub fn closed(&self) -> usize {
        self.journal().closed
    }

    /// Every command started, in start order
    pub fn commands(&self) -> Vec<String> {
        self.journal().commands.clone()
    }

    /// Stdin received by the first command starting with `prefix`
    pub fn stdin_for(&self, prefix: &str) -> Option<Vec<u8>> {
        self.journal()
            .stdin
            .iter()
            .find(|(command, _)| command.starts_with(prefix))
            .map(|(_, bytes)| bytes.clone())
    }

    fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().expect("journal poisoned")
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<Box<dyn RemoteSession>, ConnectionError> {
        if self.unreachable {
            return Err(ConnectionError::ConnectFailed {
                address: self.target(),
                reason: "unreachable".to_string(),
            });
        }
        Ok(Box::new(self.session()))
    }

    fn target(&self) -> String {
        "fake@localhost:22".to_string()
    }
}

/// In-memory session driven by a [`FakeResponse`]
pub struct FakeSession {
    responder: Responder,
    journal: Arc<Mutex<Journal>>,
    stdout: Option<DuplexStream>,
    stderr: Option<DuplexStream>,
    stdin: Option<DuplexStream>,
    taken: [bool; 3],
    started: bool,
    response: FakeResponse,
    feeders: Vec<JoinHandle<()>>,
    collector: Option<JoinHandle<()>>,
}

impl FakeSession {
    fn new(responder: Responder, journal: Arc<Mutex<Journal>>) -> Self {
        Self {
            responder,
            journal,
            stdout: None,
            stderr: None,
            stdin: None,
            taken: [false; 3],
            started: false,
            response: FakeResponse::default(),
            feeders: Vec::new(),
            collector: None,
        }
    }

    fn take_pipe(&mut self, index: usize, name: &'static str) -> Result<DuplexStream, SessionError> {
        if self.started {
            return Err(SessionError::AlreadyStarted);
        }
        if self.taken[index] {
            return Err(SessionError::PipeTaken(name));
        }
        self.taken[index] = true;
        let (ours, theirs) = tokio::io::duplex(PIPE_BUFFER);
        match index {
            0 => self.stdout = Some(ours),
            1 => self.stderr = Some(ours),
            _ => self.stdin = Some(ours),
        }
        Ok(theirs)
    }
}

fn feed(mut pipe: DuplexStream, content: String, linger: Duration, hang: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let _ = pipe.write_all(content.as_bytes()).await;
        if hang {
            std::future::pending::<()>().await;
        }
        if !linger.is_zero() {
            tokio::time::sleep(linger).await;
        }
        drop(pipe);
    })
}

#[async_trait]
impl RemoteSession for FakeSession {
    fn stdout_pipe(&mut self) -> Result<ByteStream, SessionError> {
        Ok(Box::new(self.take_pipe(0, "stdout")?))
    }

    fn stderr_pipe(&mut self) -> Result<ByteStream, SessionError> {
        Ok(Box::new(self.take_pipe(1, "stderr")?))
    }

    fn stdin_pipe(&mut self) -> Result<ByteSink, SessionError> {
        Ok(Box::new(self.take_pipe(2, "stdin")?))
    }

    async fn start(&mut self, command: &str) -> Result<(), SessionError> {
        if self.started {
            return Err(SessionError::AlreadyStarted);
        }
        let response = (self.responder)(command);
        if response.fail_start {
            return Err(SessionError::Channel(format!("exec refused: {command}")));
        }
        self.started = true;
        self.journal
            .lock()
            .expect("journal poisoned")
            .commands
            .push(command.to_string());

        if let Some(pipe) = self.stdout.take() {
            self.feeders
                .push(feed(pipe, response.stdout.clone(), response.linger, response.hang));
        }
        if let Some(pipe) = self.stderr.take() {
            self.feeders
                .push(feed(pipe, response.stderr.clone(), response.linger, response.hang));
        }
        if let Some(mut pipe) = self.stdin.take() {
            let journal = Arc::clone(&self.journal);
            let command = command.to_string();
            self.collector = Some(tokio::spawn(async move {
                let mut received = Vec::new();
                let _ = pipe.read_to_end(&mut received).await;
                journal
                    .lock()
                    .expect("journal poisoned")
                    .stdin
                    .push((command, received));
            }));
        }
        self.response = response;
        Ok(())
    }

    async fn wait(&mut self) -> Result<ExitStatus, SessionError> {
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        if let Some(collector) = self.collector.take() {
            let _ = collector.await;
        }
        for feeder in self.feeders.drain(..) {
            let _ = feeder.await;
        }
        if !self.response.delay.is_zero() {
            tokio::time::sleep(self.response.delay).await;
        }
        if self.response.hang {
            std::future::pending::<()>().await;
        }
        Ok(ExitStatus(self.response.exit_status))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        for feeder in self.feeders.drain(..) {
            feeder.abort();
        }
        self.journal.lock().expect("journal poisoned").closed += 1;
        Ok(())
    }
}
