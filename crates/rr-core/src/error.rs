//! Core error types for remote-run

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while establishing an authenticated session
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Private key could not be read or parsed
    #[error("Private key not usable at {path}: {reason}")]
    KeyNotFound { path: PathBuf, reason: String },

    /// No configured method was accepted by the server
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// No password, key or agent was available to try
    #[error("No authentication method available")]
    NoAuthMethod,

    /// TCP/SSH dial did not complete in time
    #[error("Connection to {address} timed out after {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    /// Dial or handshake failure
    #[error("Failed to connect to {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    /// Session channel could not be opened
    #[error("Failed to open session channel: {0}")]
    ChannelOpen(String),
}

/// Errors raised by a [`RemoteSession`](crate::RemoteSession)
#[derive(Error, Debug)]
pub enum SessionError {
    /// A pipe was requested twice
    #[error("{0} pipe already taken")]
    PipeTaken(&'static str),

    /// Pipes can only be opened before the command starts
    #[error("Command already started")]
    AlreadyStarted,

    /// `wait` called before `start`
    #[error("Command not started")]
    NotStarted,

    /// The remote command ran but exited non-zero
    #[error("Remote command exited with status {0}")]
    ExitStatus(u32),

    /// The remote side closed the channel without an exit status
    #[error("Channel closed without exit status")]
    NoExitStatus,

    /// Transport failure on the underlying channel
    #[error("Channel error: {0}")]
    Channel(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the execution engine
///
/// A timeout is never an `ExecError`; it is reported through
/// [`ExecutionOutcome::timed_out`](crate::ExecutionOutcome).
#[derive(Error, Debug)]
pub enum ExecError {
    /// Could not reach the host
    #[error("{0}")]
    Connect(#[from] ConnectionError),

    /// Pipe-open or command-start failure
    #[error("Failed to start remote command: {0}")]
    Setup(#[from] SessionError),

    /// Failure while collecting the exit status after output drained
    #[error("Failed to collect exit status: {0}")]
    Wait(SessionError),

    /// The event stream ended without a terminal outcome
    #[error("Execution stream closed before completion")]
    StreamClosed,

    /// Local I/O (e.g. reading a script file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a transfer job or the orchestrator
#[derive(Error, Debug)]
pub enum TransferError {
    /// Local directory to copy does not exist
    #[error("no such dir: {}", .0.display())]
    NoSuchDir(PathBuf),

    /// Local path is neither a regular file nor a directory
    #[error("invalid local path: {}", .0.display())]
    InvalidSource(PathBuf),

    /// Remote path cannot be expressed as a shell word
    #[error("remote path cannot be quoted: {0:?}")]
    Unquotable(String),

    /// Archive creation failed
    #[error("create tgz pack for ({}) error: {reason}", .path.display())]
    Archive { path: PathBuf, reason: String },

    /// File upload failed
    #[error("upload {} -> {remote} error: {reason}", .local.display())]
    Upload {
        local: PathBuf,
        remote: String,
        reason: String,
    },

    /// Remote extraction failed
    #[error("extract tgz error in {remote}: {reason}")]
    Extract { remote: String, reason: String },

    /// Remote extraction did not finish in time
    #[error("copy timeout error: {} -> {remote}", .local.display())]
    ExtractTimeout { local: PathBuf, remote: String },

    /// Shared orchestration deadline expired
    #[error("transfer timeout error: {completed}/{total} jobs finished")]
    Timeout { completed: usize, total: usize },

    /// A job task ended without reporting
    #[error("transfer task for {} failed: {reason}", .path.display())]
    Task { path: PathBuf, reason: String },

    /// Remote helper command failed
    #[error("remote command error: {0}")]
    Remote(#[from] ExecError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConnectionError> for TransferError {
    fn from(e: ConnectionError) -> Self {
        TransferError::Remote(ExecError::Connect(e))
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_such_dir_message() {
        let err = TransferError::NoSuchDir(PathBuf::from("/local/missing"));
        assert_eq!(err.to_string(), "no such dir: /local/missing");
    }

    #[test]
    fn test_exec_error_wraps_into_transfer_error() {
        let err: TransferError = ExecError::StreamClosed.into();
        assert!(matches!(err, TransferError::Remote(ExecError::StreamClosed)));
    }

    #[test]
    fn test_connection_error_reaches_transfer_error() {
        let err: TransferError = ConnectionError::NoAuthMethod.into();
        assert!(matches!(
            err,
            TransferError::Remote(ExecError::Connect(ConnectionError::NoAuthMethod))
        ));
    }
}
