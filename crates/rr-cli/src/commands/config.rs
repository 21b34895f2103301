//! Config command implementations

use std::path::Path;

use anyhow::{Context, Result};

use rr_core::config::SshConfig;

use crate::output::{print_error, print_info, print_success, print_warning};
use crate::settings::config_path;

/// Print the config file contents
pub fn config_show(explicit: Option<&Path>) -> Result<()> {
    let path = config_path(explicit);

    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Run 'remote-run config init' to create one");
        return Ok(());
    }

    print_info(&format!("Configuration file: {:?}", path));
    println!();

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    println!("{}", content);

    Ok(())
}

/// Print the config file path
pub fn config_path_command(explicit: Option<&Path>) {
    println!("{}", config_path(explicit).display());
}

/// Write a commented default config
pub fn config_init(explicit: Option<&Path>, force: bool) -> Result<()> {
    let path = config_path(explicit);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory: {:?}", dir))?;
    }
    std::fs::write(&path, default_config_template())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Created configuration file: {:?}", path));
    Ok(())
}

fn default_config_template() -> String {
    format!(
        r#"# remote-run configuration

[ssh]
host = "localhost"
port = 22
user = {user}
# password = "..."
# private_key_path = "~/.ssh/id_ed25519"
use_agent = true
# Seconds, or a string such as "30s" or "2m"
connect_timeout = 10

[run]
# Zero or negative means no practical limit
command_timeout_secs = 0
transfer_timeout_secs = -1
# Log remote stderr while extracting archives
verbose = false
"#,
        user = toml::Value::String(SshConfig::default().user)
    )
}
