//! SSH connection configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::error::ConfigError;

/// Default dial timeout when none is configured
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How to reach and authenticate against one host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Remote host name or address
    pub host: String,

    /// SSH server port
    pub port: u16,

    /// Remote user name (defaults to the local user)
    pub user: String,

    /// Password authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Private key file for public key authentication
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,

    /// Try identities from the agent at `SSH_AUTH_SOCK`
    pub use_agent: bool,

    /// Maximum time for the TCP connection and handshake
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 22,
            user: whoami::username(),
            password: None,
            private_key_path: None,
            use_agent: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl SshConfig {
    /// Create a config for `user@host` with default settings
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            ..Default::default()
        }
    }

    /// `host:port` address to dial
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `user@host:port`, used in log lines
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }

    /// Check that the config can be used to connect
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingField("ssh.host".to_string()));
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::MissingField("ssh.user".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("ssh.port must be non-zero".to_string()));
        }
        if self.password.is_none() && self.private_key_path.is_none() && !self.use_agent {
            return Err(ConfigError::Invalid(
                "no authentication method: set a password, a private key or enable the agent"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
