//! Outbound SSH connections
//!
//! Dials the configured host, authenticates, and opens one session channel
//! per [`Connector::connect`] call.

use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh_keys::key::PublicKey;

use rr_core::config::SshConfig;
use rr_core::{ConfigError, ConnectionError, Connector, RemoteSession};

use crate::session::RusshSession;

/// Opens authenticated russh sessions to one host
#[derive(Clone)]
pub struct SshConnector {
    config: SshConfig,
    client_config: Arc<Config>,
}

impl SshConnector {
    /// Create a connector, rejecting configs that cannot authenticate
    pub fn new(config: SshConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            client_config: Arc::new(Config::default()),
        })
    }

    /// Connection settings
    pub fn config(&self) -> &SshConfig {
        &self.config
    }

    async fn dial(&self) -> Result<Handle<ClientHandler>, ConnectionError> {
        let address = self.config.address();
        tracing::debug!("Connecting to {}", address);

        tokio::time::timeout(
            self.config.connect_timeout,
            client::connect(Arc::clone(&self.client_config), address.as_str(), ClientHandler),
        )
        .await
        .map_err(|_| ConnectionError::Timeout {
            address: address.clone(),
            timeout: self.config.connect_timeout,
        })?
        .map_err(|e| ConnectionError::ConnectFailed {
            address: address.clone(),
            reason: e.to_string(),
        })
    }

    /// Try password, key file and agent identities in that order.
    async fn authenticate(&self, handle: &mut Handle<ClientHandler>) -> Result<(), ConnectionError> {
        let user = self.config.user.as_str();
        let auth_err = |e: russh::Error| ConnectionError::ConnectFailed {
            address: self.config.address(),
            reason: format!("authentication error: {e}"),
        };
        let mut attempted = false;

        if let Some(password) = &self.config.password {
            attempted = true;
            if handle
                .authenticate_password(user, password)
                .await
                .map_err(auth_err)?
            {
                tracing::debug!("Authenticated {} with password", user);
                return Ok(());
            }
            tracing::debug!("Password rejected for {}", user);
        }

        if let Some(key_path) = &self.config.private_key_path {
            attempted = true;
            let key = russh_keys::load_secret_key(key_path, None).map_err(|e| {
                ConnectionError::KeyNotFound {
                    path: key_path.clone(),
                    reason: e.to_string(),
                }
            })?;
            if handle
                .authenticate_publickey(user, Arc::new(key))
                .await
                .map_err(auth_err)?
            {
                tracing::debug!("Authenticated {} with key {}", user, key_path.display());
                return Ok(());
            }
            tracing::debug!("Key {} rejected for {}", key_path.display(), user);
        }

        if self.config.use_agent && self.authenticate_with_agent(handle, &mut attempted).await {
            return Ok(());
        }

        if attempted {
            Err(ConnectionError::AuthenticationFailed {
                user: user.to_string(),
            })
        } else {
            Err(ConnectionError::NoAuthMethod)
        }
    }

    #[cfg(unix)]
    async fn authenticate_with_agent(
        &self,
        handle: &mut Handle<ClientHandler>,
        attempted: &mut bool,
    ) -> bool {
        use russh_keys::agent::client::AgentClient;

        let mut agent = match AgentClient::connect_env().await {
            Ok(agent) => agent,
            Err(e) => {
                tracing::debug!("ssh-agent unavailable: {}", e);
                return false;
            }
        };
        let identities = match agent.request_identities().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::debug!("ssh-agent refused to list identities: {}", e);
                return false;
            }
        };

        let user = self.config.user.as_str();
        for key in identities {
            *attempted = true;
            let fingerprint = key.fingerprint();
            let (returned, result) = handle.authenticate_future(user, key, agent).await;
            agent = returned;
            if matches!(result, Ok(true)) {
                tracing::debug!("Authenticated {} with agent key {}", user, fingerprint);
                return true;
            }
        }
        false
    }

    #[cfg(not(unix))]
    async fn authenticate_with_agent(
        &self,
        _handle: &mut Handle<ClientHandler>,
        _attempted: &mut bool,
    ) -> bool {
        tracing::debug!("ssh-agent is not supported on this platform");
        false
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self) -> Result<Box<dyn RemoteSession>, ConnectionError> {
        let mut handle = self.dial().await?;
        self.authenticate(&mut handle).await?;

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| ConnectionError::ChannelOpen(e.to_string()))?;
        tracing::debug!("Opened session channel to {}", self.target());

        Ok(Box::new(RusshSession::new(handle, channel)))
    }

    fn target(&self) -> String {
        self.config.target()
    }
}

/// russh client callbacks
pub(crate) struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = anyhow::Error;

    /// Host keys are accepted; verification policy belongs to the caller's
    /// network setup. The fingerprint is logged for auditing.
    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!("Server host key: {}", server_public_key.fingerprint());
        Ok(true)
    }
}
