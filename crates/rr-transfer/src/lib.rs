//! rr-transfer: Concurrent transfers for remote-run
//!
//! - [`TransferOrchestrator`] fans a batch of jobs out to one task each and
//!   aggregates them under a shared deadline
//! - [`DirectorySync`] copies a directory as archive, upload, extract
//! - [`ScpUpload`] uploads a single file with the scp sink protocol
//! - [`TarArchiver`] builds and unpacks tar.gz archives
//! - [`TransferClient`] dispatches one local path to the right strategy

pub mod archive;
pub mod client;
pub mod directory;
pub mod orchestrator;
pub mod paths;
pub mod scp;

pub use archive::TarArchiver;
pub use client::TransferClient;
pub use directory::{DirectorySync, REMOTE_OUTPUT_TARGET};
pub use orchestrator::{TransferOrchestrator, TransferReport};
pub use scp::ScpUpload;
