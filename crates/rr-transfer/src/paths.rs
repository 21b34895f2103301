//! Path and naming helpers

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

use rr_core::time::current_time_nanos;
use rr_core::TransferError;

/// Disambiguates names generated within the same clock tick.
static NAME_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Strip one trailing `/`, leaving a bare root untouched.
///
/// ```
/// use rr_transfer::paths::remove_trailing_slash;
///
/// assert_eq!(remove_trailing_slash("/srv/app/"), "/srv/app");
/// assert_eq!(remove_trailing_slash("/"), "/");
/// ```
pub fn remove_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Hex digest unique to `path` and this moment
pub fn unique_token(path: &Path) -> String {
    let seq = NAME_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(format!("_{}_{}", current_time_nanos(), seq).as_bytes());
    hex::encode(hasher.finalize())
}

/// Archive file name for `dir`: `<token>_<dirname>.tar.gz`
pub fn archive_name(dir: &Path) -> String {
    let dirname = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    format!("{}_{}.tar.gz", unique_token(dir), dirname)
}

/// Join a remote directory and a file name with exactly one `/`
pub fn join_remote(dir: &str, name: &str) -> String {
    let dir = remove_trailing_slash(dir);
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Quote `word` for a POSIX shell command line
pub fn quote(word: &str) -> Result<String, TransferError> {
    shlex::try_quote(word)
        .map(|q| q.into_owned())
        .map_err(|_| TransferError::Unquotable(word.to_string()))
}

/// Final path component of a remote path
pub fn remote_basename(remote: &str) -> &str {
    let trimmed = remove_trailing_slash(remote);
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}
