//! Execution and transfer defaults

use serde::{Deserialize, Serialize};

/// Timeouts and verbosity applied when the caller does not override them
///
/// Timeouts are in seconds; zero or negative means "practically unbounded".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Deadline for a single remote command
    pub command_timeout_secs: i64,

    /// Shared deadline for a batch of transfers
    pub transfer_timeout_secs: i64,

    /// Echo remote diagnostics while transferring
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 0,
            transfer_timeout_secs: -1,
            verbose: false,
        }
    }
}
