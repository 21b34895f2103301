//! tar.gz archives via the system `tar`

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use rr_core::{ArchiveTool, TransferError};
use rr_exec::local;

use crate::paths::{archive_name, quote};

/// [`ArchiveTool`] backed by the `tar` binary on both ends
#[derive(Debug, Clone, Copy, Default)]
pub struct TarArchiver;

impl TarArchiver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArchiveTool for TarArchiver {
    async fn archive(&self, source: &Path) -> Result<PathBuf, TransferError> {
        let archive_err = |reason: String| TransferError::Archive {
            path: source.to_path_buf(),
            reason,
        };

        let dirname = source
            .file_name()
            .ok_or_else(|| archive_err("path has no final component".to_string()))?;
        let parent = match source.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let archive_path = parent.join(archive_name(source));

        let out = local::run_program(
            "tar",
            [
                OsStr::new("czf"),
                archive_path.as_os_str(),
                OsStr::new("-C"),
                parent.as_os_str(),
                dirname,
            ],
        )
        .await
        .map_err(|e| archive_err(e.to_string()))?;

        if !out.success() {
            // tar may leave a truncated file behind
            let _ = tokio::fs::remove_file(&archive_path).await;
            return Err(archive_err(format!(
                "{}: {}",
                out.status,
                out.output.trim()
            )));
        }

        tracing::debug!("Created archive {}", archive_path.display());
        Ok(archive_path)
    }

    fn extract_command(&self, archive_name: &str, dest_dir: &str) -> Result<String, TransferError> {
        Ok(format!(
            "cd {} && tar xf {}",
            quote(dest_dir)?,
            quote(archive_name)?
        ))
    }

    async fn extract_local(&self, archive: &Path, dest_dir: &Path) -> Result<(), TransferError> {
        if !dest_dir.is_dir() {
            return Err(TransferError::NoSuchDir(dest_dir.to_path_buf()));
        }
        let out = local::run_program(
            "tar",
            [
                OsStr::new("xzf"),
                archive.as_os_str(),
                OsStr::new("-C"),
                dest_dir.as_os_str(),
            ],
        )
        .await?;
        if !out.success() {
            return Err(TransferError::Extract {
                remote: dest_dir.display().to_string(),
                reason: format!("{}: {}", out.status, out.output.trim()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree(root: &Path) -> PathBuf {
        let dir = root.join("site");
        std::fs::create_dir_all(dir.join("assets")).unwrap();
        std::fs::write(dir.join("index.html"), "<h1>hi</h1>").unwrap();
        std::fs::write(dir.join("assets").join("app.js"), "run()").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_archive_and_extract_local() {
        let src = tempfile::tempdir().unwrap();
        let dir = sample_tree(src.path());

        let archive = TarArchiver.archive(&dir).await.unwrap();
        assert_eq!(archive.parent(), Some(src.path()));
        assert!(archive
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|n| n.ends_with("_site.tar.gz")));

        let dest = tempfile::tempdir().unwrap();
        TarArchiver
            .extract_local(&archive, dest.path())
            .await
            .unwrap();
        let restored = std::fs::read_to_string(dest.path().join("site/assets/app.js")).unwrap();
        assert_eq!(restored, "run()");
    }

    #[tokio::test]
    async fn test_archive_missing_dir_fails() {
        let src = tempfile::tempdir().unwrap();
        let err = TarArchiver
            .archive(&src.path().join("absent"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Archive { .. }));
        assert_eq!(std::fs::read_dir(src.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_extract_local_requires_dest_dir() {
        let src = tempfile::tempdir().unwrap();
        let err = TarArchiver
            .extract_local(&src.path().join("a.tar.gz"), &src.path().join("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::NoSuchDir(_)));
    }

    #[test]
    fn test_extract_command_quotes_paths() {
        let cmd = TarArchiver
            .extract_command("abc_my dir.tar.gz", "/opt/www")
            .unwrap();
        assert!(cmd.starts_with("cd /opt/www && tar xf "));
        assert_eq!(
            shlex::split(&cmd).unwrap(),
            vec!["cd", "/opt/www", "&&", "tar", "xf", "abc_my dir.tar.gz"]
        );
    }
}
