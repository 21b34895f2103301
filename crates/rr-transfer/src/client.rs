//! Single-path copy operations

use std::io;
use std::path::Path;
use std::sync::Arc;

use rr_core::{Connector, FileTransfer, TransferError};
use rr_exec::Runner;

use crate::directory::DirectorySync;
use crate::paths::{quote, unique_token};
use crate::scp::ScpUpload;

/// Staging directory for [`TransferClient::safe_copy`]
const REMOTE_STAGING_DIR: &str = "/tmp";

/// Copies local files and directories to one remote host
#[derive(Clone)]
pub struct TransferClient {
    runner: Runner,
    uploader: Arc<dyn FileTransfer>,
    directories: DirectorySync,
}

impl TransferClient {
    /// Client using scp upload and `tar` over `connector`
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            runner: Runner::new(Arc::clone(&connector)),
            uploader: Arc::new(ScpUpload::new(Arc::clone(&connector))),
            directories: DirectorySync::new(connector),
        }
    }

    /// Client with explicit parts
    pub fn with_parts(
        connector: Arc<dyn Connector>,
        uploader: Arc<dyn FileTransfer>,
        directories: DirectorySync,
    ) -> Self {
        Self {
            runner: Runner::new(connector),
            uploader,
            directories,
        }
    }

    /// Copy `local` to `remote`, dispatching on what `local` is.
    ///
    /// A directory is synced *into* the remote directory `remote`; a regular
    /// file is uploaded *as* `remote`, which must include the file name.
    pub async fn copy(
        &self,
        local: &Path,
        remote: &str,
        timeout_secs: i64,
        verbose: bool,
    ) -> Result<(), TransferError> {
        let metadata = match tokio::fs::metadata(local).await {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(TransferError::NoSuchDir(local.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            self.directories
                .sync(local, remote, timeout_secs, verbose)
                .await
        } else if metadata.is_file() {
            self.uploader.upload(local, remote).await
        } else {
            Err(TransferError::InvalidSource(local.to_path_buf()))
        }
    }

    /// Upload a file to a staging path first, then move it into place.
    ///
    /// `remote` is never left half-written. The staged copy is removed
    /// whether or not the move succeeded. Directories go through the regular
    /// directory sync with no deadline.
    pub async fn safe_copy(&self, local: &Path, remote: &str) -> Result<(), TransferError> {
        if local.is_dir() {
            return self.directories.sync(local, remote, -1, false).await;
        }

        let staged = format!("{}/{}", REMOTE_STAGING_DIR, unique_token(local));
        let result = self.stage_and_move(local, &staged, remote).await;

        match quote(&staged) {
            Ok(quoted) => match self.runner.run(&format!("rm -f {quoted}"), -1).await {
                Ok(out) if out.success() => {}
                Ok(out) => tracing::warn!("Failed to remove {}: {:?}", staged, out.exit_status),
                Err(e) => tracing::warn!("Failed to remove {}: {}", staged, e),
            },
            Err(e) => tracing::warn!("Skipping cleanup of {}: {}", staged, e),
        }
        result
    }

    async fn stage_and_move(&self, local: &Path, staged: &str, remote: &str) -> Result<(), TransferError> {
        self.uploader.upload(local, staged).await?;

        let command = format!("mv {} {}", quote(staged)?, quote(remote)?);
        let out = self.runner.run(&command, -1).await?;
        if !out.success() {
            return Err(TransferError::Upload {
                local: local.to_path_buf(),
                remote: remote.to_string(),
                reason: format!("move into place failed: {}", out.stderr.trim()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::testing::{FakeConnector, FakeResponse};

    fn client(connector: &FakeConnector) -> TransferClient {
        TransferClient::new(Arc::new(connector.clone()))
    }

    #[tokio::test]
    async fn test_copy_missing_path() {
        let connector = FakeConnector::always(FakeResponse::ok());
        let err = client(&connector)
            .copy(Path::new("/local/missing"), "/remote/x", 10, false)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no such dir: /local/missing");
        assert_eq!(connector.opened(), 0);
    }

    #[tokio::test]
    async fn test_copy_file_uploads_directly() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.conf");
        std::fs::write(&file, "k=v").unwrap();
        let connector = FakeConnector::always(FakeResponse::ok());

        client(&connector)
            .copy(&file, "/etc/app.conf", 10, false)
            .await
            .unwrap();
        assert_eq!(connector.commands(), vec!["scp -t /etc/app.conf"]);
    }

    #[tokio::test]
    async fn test_safe_copy_stages_then_moves() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.conf");
        std::fs::write(&file, "k=v").unwrap();
        let connector = FakeConnector::always(FakeResponse::ok());

        client(&connector)
            .safe_copy(&file, "/etc/app.conf")
            .await
            .unwrap();

        let commands = connector.commands();
        assert_eq!(commands.len(), 3);
        let staged = commands[0].strip_prefix("scp -t ").unwrap().to_string();
        assert!(staged.starts_with("/tmp/"));
        assert_eq!(commands[1], format!("mv {staged} /etc/app.conf"));
        assert_eq!(commands[2], format!("rm -f {staged}"));
    }

    #[tokio::test]
    async fn test_safe_copy_removes_staged_file_on_failed_move() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.conf");
        std::fs::write(&file, "k=v").unwrap();
        let connector = FakeConnector::new(|command| {
            if command.starts_with("mv ") {
                FakeResponse::ok().stderr("mv: denied\n").exit_status(1)
            } else {
                FakeResponse::ok()
            }
        });

        let err = client(&connector)
            .safe_copy(&file, "/etc/app.conf")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("mv: denied"));
        assert!(connector.commands().last().unwrap().starts_with("rm -f /tmp/"));
    }
}
