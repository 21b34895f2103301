//! Directory synchronization: archive, upload, extract, clean up
//!
//! The archive exists both locally and remotely only for the duration of one
//! [`DirectorySync::sync`] call. Both copies are removed on every path once
//! the archive was created; removal failures are logged and never replace
//! the sync result.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rr_core::{ArchiveTool, Connector, FileTransfer, Origin, TransferError};
use rr_exec::Runner;

use crate::archive::TarArchiver;
use crate::paths::{join_remote, quote, remove_trailing_slash};
use crate::scp::ScpUpload;

/// Log target for remote output echoed in verbose mode
pub const REMOTE_OUTPUT_TARGET: &str = "remote_output";

/// Copies a local directory into a remote directory
#[derive(Clone)]
pub struct DirectorySync {
    runner: Runner,
    uploader: Arc<dyn FileTransfer>,
    archiver: Arc<dyn ArchiveTool>,
}

impl DirectorySync {
    /// Sync over `connector` using scp upload and `tar`
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        let uploader = Arc::new(ScpUpload::new(Arc::clone(&connector)));
        Self::with_parts(connector, uploader, Arc::new(TarArchiver))
    }

    /// Sync with explicit upload and archive implementations
    pub fn with_parts(
        connector: Arc<dyn Connector>,
        uploader: Arc<dyn FileTransfer>,
        archiver: Arc<dyn ArchiveTool>,
    ) -> Self {
        Self {
            runner: Runner::new(connector),
            uploader,
            archiver,
        }
    }

    /// Copy `local_dir` into `remote_dir`, which must already exist.
    ///
    /// The result is `<remote_dir>/<basename of local_dir>`. `timeout_secs`
    /// bounds the remote extraction; zero or negative means unbounded. With
    /// `verbose`, remote stderr lines are logged at info level under
    /// [`REMOTE_OUTPUT_TARGET`].
    pub async fn sync(
        &self,
        local_dir: &Path,
        remote_dir: &str,
        timeout_secs: i64,
        verbose: bool,
    ) -> Result<(), TransferError> {
        let local_dir = PathBuf::from(remove_trailing_slash(&local_dir.to_string_lossy()));
        let remote_dir = remove_trailing_slash(remote_dir);

        if !local_dir.exists() {
            return Err(TransferError::NoSuchDir(local_dir));
        }
        if !local_dir.is_dir() {
            return Err(TransferError::InvalidSource(local_dir));
        }

        let archive_path = self.archiver.archive(&local_dir).await?;
        let archive_name = match archive_path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => {
                self.remove_local(&archive_path).await;
                return Err(TransferError::Archive {
                    path: local_dir,
                    reason: "archive path has no file name".to_string(),
                });
            }
        };
        let remote_archive = join_remote(remote_dir, &archive_name);

        let result = self
            .upload_and_extract(
                &local_dir,
                &archive_path,
                &archive_name,
                remote_dir,
                &remote_archive,
                timeout_secs,
                verbose,
            )
            .await;

        self.remove_local(&archive_path).await;
        self.remove_remote(&remote_archive, timeout_secs).await;

        match &result {
            Ok(()) => tracing::info!("Synced {} -> {}", local_dir.display(), remote_dir),
            Err(e) => tracing::debug!("Sync {} -> {} failed: {}", local_dir.display(), remote_dir, e),
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn upload_and_extract(
        &self,
        local_dir: &Path,
        archive_path: &Path,
        archive_name: &str,
        remote_dir: &str,
        remote_archive: &str,
        timeout_secs: i64,
        verbose: bool,
    ) -> Result<(), TransferError> {
        self.uploader.upload(archive_path, remote_archive).await?;

        let command = self.archiver.extract_command(archive_name, remote_dir)?;
        let status = self
            .runner
            .run_realtime(&command, timeout_secs, |line, origin| {
                if verbose && origin == Origin::Stderr {
                    tracing::info!(target: REMOTE_OUTPUT_TARGET, "{}", line);
                }
            })
            .await
            .map_err(|e| TransferError::Extract {
                remote: remote_dir.to_string(),
                reason: e.to_string(),
            })?;

        if status.timed_out {
            return Err(TransferError::ExtractTimeout {
                local: local_dir.to_path_buf(),
                remote: remote_dir.to_string(),
            });
        }
        match status.exit_status {
            Some(code) if code.success() => Ok(()),
            Some(code) => Err(TransferError::Extract {
                remote: remote_dir.to_string(),
                reason: code.to_string(),
            }),
            None => Err(TransferError::Extract {
                remote: remote_dir.to_string(),
                reason: "no exit status".to_string(),
            }),
        }
    }

    async fn remove_local(&self, archive_path: &Path) {
        if let Err(e) = tokio::fs::remove_file(archive_path).await {
            tracing::warn!(
                "Failed to remove local archive {}: {}",
                archive_path.display(),
                e
            );
        }
    }

    async fn remove_remote(&self, remote_archive: &str, timeout_secs: i64) {
        let command = match quote(remote_archive) {
            Ok(quoted) => format!("rm -f {quoted}"),
            Err(e) => {
                tracing::warn!("Skipping remote cleanup: {}", e);
                return;
            }
        };
        match self.runner.run(&command, timeout_secs).await {
            Ok(out) if out.success() => {}
            Ok(out) => tracing::warn!(
                "Remote cleanup of {} did not finish cleanly: timed_out={} {:?}",
                remote_archive,
                out.timed_out,
                out.exit_status
            ),
            Err(e) => tracing::warn!("Remote cleanup of {} failed: {}", remote_archive, e),
        }
    }
}
