//! Effective settings: config file values overridden by flags and env

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use rr_core::config::{self, ConfigFile};
use rr_core::ConfigError;
use rr_transfer::REMOTE_OUTPUT_TARGET;

/// Connection flags shared by every remote command
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Remote host
    #[arg(short = 'H', long, global = true, env = "RR_HOST")]
    pub host: Option<String>,

    /// SSH port
    #[arg(short, long, global = true, env = "RR_PORT")]
    pub port: Option<u16>,

    /// Remote user
    #[arg(short, long, global = true, env = "RR_USER")]
    pub user: Option<String>,

    /// Private key file
    #[arg(short = 'i', long = "identity", global = true, env = "RR_IDENTITY")]
    pub identity: Option<PathBuf>,

    /// Password (prefer a key or the agent)
    #[arg(long, global = true, env = "RR_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Do not try identities from ssh-agent
    #[arg(long, global = true)]
    pub no_agent: bool,
}

/// Resolve the config file path
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Load the config file, falling back to defaults when it does not exist,
/// then apply `overrides`.
pub fn load(explicit: Option<&Path>, overrides: &ConnectionArgs) -> Result<ConfigFile> {
    let path = config_path(explicit);
    let mut file = match config::load_config::<ConfigFile>(&path) {
        Ok(file) => file,
        Err(ConfigError::NotFound(_)) if explicit.is_none() => {
            tracing::debug!("No config at {:?}, using defaults", path);
            ConfigFile::default()
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to load config file: {:?}", path))
        }
    };
    apply(&mut file, overrides);
    Ok(file)
}

/// Apply command-line overrides to a loaded config
pub fn apply(file: &mut ConfigFile, overrides: &ConnectionArgs) {
    let ssh = &mut file.ssh;
    if let Some(host) = &overrides.host {
        ssh.host = host.clone();
    }
    if let Some(port) = overrides.port {
        ssh.port = port;
    }
    if let Some(user) = &overrides.user {
        ssh.user = user.clone();
    }
    if let Some(identity) = &overrides.identity {
        ssh.private_key_path = Some(identity.clone());
    }
    if let Some(password) = &overrides.password {
        ssh.password = Some(password.clone());
    }
    if overrides.no_agent {
        ssh.use_agent = false;
    }
}

/// Tracing filter for the CLI's verbosity flags.
///
/// With `remote_output`, remote output echoed by transfers is shown at info
/// level even when the base level is quieter; `quiet` wins over it.
pub fn log_filter(quiet: bool, verbose: u8, remote_output: bool) -> String {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    if remote_output && !quiet && verbose == 0 {
        format!("{level},{REMOTE_OUTPUT_TARGET}=info")
    } else {
        level.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_default_config_uses_defaults() {
        let mut file = ConfigFile::default();
        apply(&mut file, &ConnectionArgs::default());
        assert_eq!(file.ssh.port, 22);
        assert!(file.ssh.use_agent);
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(load(Some(&path), &ConnectionArgs::default()).is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[ssh]\nhost = \"db\"\nuser = \"ops\"\nport = 2200\n\n[run]\ncommand_timeout_secs = 30\n",
        )
        .unwrap();

        let overrides = ConnectionArgs {
            host: Some("web".to_string()),
            identity: Some(PathBuf::from("/keys/id")),
            no_agent: true,
            ..Default::default()
        };
        let file = load(Some(&path), &overrides).unwrap();

        assert_eq!(file.ssh.host, "web");
        assert_eq!(file.ssh.user, "ops");
        assert_eq!(file.ssh.port, 2200);
        assert_eq!(file.ssh.private_key_path, Some(PathBuf::from("/keys/id")));
        assert!(!file.ssh.use_agent);
        assert_eq!(file.run.command_timeout_secs, 30);
    }

    #[test]
    fn test_log_filter_levels() {
        assert_eq!(log_filter(false, 0, false), "warn");
        assert_eq!(log_filter(false, 1, false), "info");
        assert_eq!(log_filter(false, 2, true), "debug");
        assert_eq!(log_filter(false, 5, false), "trace");
        assert_eq!(log_filter(true, 3, false), "error");
    }

    #[test]
    fn test_log_filter_shows_remote_output_when_verbose_in_config() {
        assert_eq!(log_filter(false, 0, true), "warn,remote_output=info");
        assert_eq!(log_filter(true, 0, true), "error");
    }

    #[test]
    fn test_verbose_config_enables_remote_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[ssh]\nhost = \"db\"\n\n[run]\nverbose = true\n").unwrap();

        let file = load(Some(&path), &ConnectionArgs::default()).unwrap();
        assert!(file.run.verbose);
        let filter = log_filter(false, 0, file.run.verbose);
        assert!(filter
            .parse::<tracing_subscriber::EnvFilter>()
            .is_ok());
        assert!(filter.contains("remote_output=info"));
    }
}
