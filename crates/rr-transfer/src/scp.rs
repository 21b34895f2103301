//! Single-file upload using the scp sink protocol
//!
//! The remote side runs `scp -t <dest>`. We send one control record,
//! `C<mode> <size> <name>\n`, followed by exactly `size` bytes of content
//! and a single NUL byte, then close stdin.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use rr_core::{with_session, Connector, FileTransfer, RemoteSession, SessionError, TransferError};

use crate::paths::{quote, remote_basename};

/// [`FileTransfer`] speaking the scp sink protocol over a fresh session per file
#[derive(Clone)]
pub struct ScpUpload {
    connector: Arc<dyn Connector>,
}

impl ScpUpload {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl FileTransfer for ScpUpload {
    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransferError> {
        let upload_err = |reason: String| TransferError::Upload {
            local: local.to_path_buf(),
            remote: remote.to_string(),
            reason,
        };

        let metadata = tokio::fs::metadata(local)
            .await
            .map_err(|e| upload_err(e.to_string()))?;
        if !metadata.is_file() {
            return Err(TransferError::InvalidSource(local.to_path_buf()));
        }
        let header = control_record(file_mode(&metadata), metadata.len(), remote_basename(remote));
        let command = format!("scp -t {}", quote(remote)?);

        tracing::debug!("Uploading {} -> {}", local.display(), remote);
        let local_path = local.to_path_buf();
        let remote_path = remote.to_string();
        with_session(self.connector.as_ref(), move |session| {
            Box::pin(async move {
                let sent = send_file(session, &command, &header, &local_path).await;
                sent.map_err(|e| TransferError::Upload {
                    local: local_path,
                    remote: remote_path,
                    reason: e.to_string(),
                })
            })
        })
        .await
    }
}

/// `C<mode> <size> <name>\n`
fn control_record(mode: u32, size: u64, name: &str) -> String {
    format!("C{:04o} {} {}\n", mode & 0o7777, size, name)
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

/// Platforms without unix permissions send a plain rw-r--r--
#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> u32 {
    0o644
}

async fn send_file(
    session: &mut dyn RemoteSession,
    command: &str,
    header: &str,
    local: &Path,
) -> Result<(), SessionError> {
    let mut file = tokio::fs::File::open(local).await?;
    let mut stdin = session.stdin_pipe()?;
    session.start(command).await?;

    let written = async {
        stdin.write_all(header.as_bytes()).await?;
        tokio::io::copy(&mut file, &mut stdin).await?;
        stdin.write_all(b"\0").await?;
        stdin.shutdown().await
    }
    .await;
    drop(stdin);

    // The exit status explains a failed write better than the write error
    let status = session.wait().await?;
    if !status.success() {
        return Err(SessionError::ExitStatus(status.code()));
    }
    written.map_err(SessionError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::testing::{FakeConnector, FakeResponse};

    fn write_file(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();
        }
        path
    }

    #[test]
    fn test_control_record() {
        assert_eq!(control_record(0o644, 12, "a.txt"), "C0644 12 a.txt\n");
        assert_eq!(control_record(0o100755, 0, "run"), "C0755 0 run\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_upload_sends_scp_stream() {
        let dir = tempfile::tempdir().unwrap();
        let local = write_file(dir.path(), "notes.txt", b"hello");
        let connector = FakeConnector::always(FakeResponse::ok());

        ScpUpload::new(Arc::new(connector.clone()))
            .upload(&local, "/srv/data/renamed.txt")
            .await
            .unwrap();

        assert_eq!(connector.commands(), vec!["scp -t /srv/data/renamed.txt"]);
        assert_eq!(
            connector.stdin_for("scp -t"),
            Some(b"C0640 5 renamed.txt\nhello\0".to_vec())
        );
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_upload_remote_failure() {
        let dir = tempfile::tempdir().unwrap();
        let local = write_file(dir.path(), "f", b"x");
        let connector =
            FakeConnector::always(FakeResponse::ok().stderr("scp: denied\n").exit_status(1));

        let err = ScpUpload::new(Arc::new(connector.clone()))
            .upload(&local, "/root/f")
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Upload { .. }));
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_upload_missing_local_file_does_not_connect() {
        let dir = tempfile::tempdir().unwrap();
        let connector = FakeConnector::always(FakeResponse::ok());

        let err = ScpUpload::new(Arc::new(connector.clone()))
            .upload(&dir.path().join("absent"), "/tmp/absent")
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Upload { .. }));
        assert_eq!(connector.opened(), 0);
    }

    #[tokio::test]
    async fn test_upload_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let connector = FakeConnector::always(FakeResponse::ok());

        let err = ScpUpload::new(Arc::new(connector))
            .upload(dir.path(), "/tmp/x")
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidSource(_)));
    }
}
