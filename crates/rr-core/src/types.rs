//! Core domain types

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExecError;

/// Deadline used when a caller asks for "no timeout".
///
/// Large but finite, so every wait still goes through a timer.
pub const UNBOUNDED_TIMEOUT: Duration = Duration::from_secs(24 * 3600);

/// Convert a caller-supplied timeout in seconds into a deadline.
///
/// Zero or negative values mean "practically unbounded", never "zero wait".
pub fn bounded_timeout(timeout_secs: i64) -> Duration {
    if timeout_secs <= 0 {
        UNBOUNDED_TIMEOUT
    } else {
        Duration::from_secs(timeout_secs.unsigned_abs())
    }
}

/// Which output stream of the remote command a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Stdout => write!(f, "stdout"),
            Origin::Stderr => write!(f, "stderr"),
        }
    }
}

/// One line of output tagged with its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedLine {
    text: String,
    origin: Origin,
}

impl TaggedLine {
    /// Create a new tagged line
    pub fn new(text: impl Into<String>, origin: Origin) -> Self {
        Self {
            text: text.into(),
            origin,
        }
    }

    /// Line text without the trailing newline
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Stream the line was read from
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Consume the line, returning its text
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Exit status reported by the remote command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitStatus(pub u32);

impl ExitStatus {
    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.0 == 0
    }

    /// Raw status code
    pub fn code(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exit status {}", self.0)
    }
}

/// Terminal result of one remote command execution
///
/// Exactly one outcome is produced per execution: either the output
/// drained (`timed_out == false`) or the deadline fired first.
#[derive(Debug, Default)]
pub struct ExecutionOutcome {
    /// The deadline elapsed before both output streams drained
    pub timed_out: bool,
    /// Exit status, when the command finished and reported one
    pub exit_status: Option<ExitStatus>,
    /// Failure while finalizing a command that otherwise ran
    pub err: Option<ExecError>,
}

impl ExecutionOutcome {
    /// Outcome for a command whose output drained in time
    pub fn completed(exit_status: Option<ExitStatus>) -> Self {
        Self {
            timed_out: false,
            exit_status,
            err: None,
        }
    }

    /// Outcome for a command whose deadline fired first
    pub fn timed_out() -> Self {
        Self {
            timed_out: true,
            exit_status: None,
            err: None,
        }
    }

    /// Outcome for a command whose exit status could not be collected
    pub fn failed(err: ExecError) -> Self {
        Self {
            timed_out: false,
            exit_status: None,
            err: Some(err),
        }
    }
}

/// One (local path, remote path) pair to be synchronized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    /// Local file or directory
    pub local_path: PathBuf,
    /// Remote destination: a file path for files, a directory for directories
    pub remote_path: String,
}

impl TransferJob {
    /// Create a new transfer job
    pub fn new(local_path: impl Into<PathBuf>, remote_path: impl Into<String>) -> Self {
        Self {
            local_path: local_path.into(),
            remote_path: remote_path.into(),
        }
    }
}

impl fmt::Display for TransferJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.local_path.display(), self.remote_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_timeout_non_positive_is_unbounded() {
        assert_eq!(bounded_timeout(0), UNBOUNDED_TIMEOUT);
        assert_eq!(bounded_timeout(-1), UNBOUNDED_TIMEOUT);
        assert_eq!(bounded_timeout(i64::MIN), UNBOUNDED_TIMEOUT);
    }

    #[test]
    fn test_bounded_timeout_positive() {
        assert_eq!(bounded_timeout(5), Duration::from_secs(5));
    }

    #[test]
    fn test_exit_status() {
        assert!(ExitStatus(0).success());
        assert!(!ExitStatus(2).success());
        assert_eq!(ExitStatus(2).to_string(), "exit status 2");
    }

    #[test]
    fn test_transfer_job_display() {
        let job = TransferJob::new("/srv/app", "/opt");
        assert_eq!(job.to_string(), "/srv/app -> /opt");
    }
}
