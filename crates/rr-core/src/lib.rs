//! rr-core: Core abstractions and configuration for remote-run
//!
//! This crate provides the shared types, capability traits, error types and
//! configuration structures used by the execution engine, the transfer
//! orchestrator, the SSH backend and the CLI.

pub mod config;
pub mod error;
pub mod time;
pub mod traits;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{ConfigError, ConnectionError, ExecError, SessionError, TransferError};
pub use traits::{with_session, ArchiveTool, ByteSink, ByteStream, Connector, FileTransfer, RemoteSession};
pub use types::{
    bounded_timeout, ExecutionOutcome, ExitStatus, Origin, TaggedLine, TransferJob,
    UNBOUNDED_TIMEOUT,
};
