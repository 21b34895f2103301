//! rr-exec: Remote command execution for remote-run
//!
//! Runs one command per session and exposes its output as a single ordered
//! event stream:
//!
//! - [`LineMultiplexer`] fans two byte streams into tagged lines
//! - [`ExecutionStream`] races output completion against a deadline
//! - [`runner`] consumes a stream by buffering or by per-line callback
//! - [`local`] runs helper commands on the local machine

pub mod local;
pub mod multiplexer;
pub mod runner;
pub mod stream;

pub use multiplexer::LineMultiplexer;
pub use runner::{collect, consume, run, run_realtime, RunOutput, RunStatus, Runner};
pub use stream::{timeout_message, ExecEvent, ExecutionStream};
