//! File transfer and archive capabilities

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::TransferError;

/// Uploads one local regular file to a remote path
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// Copy `local` to `remote`, which must include the destination file name
    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransferError>;
}

/// Creates and unpacks compressed archives
#[async_trait]
pub trait ArchiveTool: Send + Sync {
    /// Pack `source` into a uniquely named archive next to it and return its path
    async fn archive(&self, source: &Path) -> Result<PathBuf, TransferError>;

    /// Shell command that unpacks `archive_name` inside `dest_dir` on the remote side
    fn extract_command(&self, archive_name: &str, dest_dir: &str) -> Result<String, TransferError>;

    /// Unpack a local archive into a local directory
    async fn extract_local(&self, archive: &Path, dest_dir: &Path) -> Result<(), TransferError>;
}
