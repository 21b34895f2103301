//! Core trait definitions

mod connection;
mod session;
mod transfer;

pub use connection::{with_session, Connector, SessionFuture};
pub use session::{ByteSink, ByteStream, RemoteSession};
pub use transfer::{ArchiveTool, FileTransfer};
