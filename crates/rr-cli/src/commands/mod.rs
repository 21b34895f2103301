//! CLI command implementations

mod config;
mod exec;
mod transfer;

pub use config::{config_init, config_path_command, config_show};
pub use exec::{inline_script_command, run_command, script_command, stream_command};
pub use transfer::{copy_command, copy_many_command, parse_mappings, safe_copy_command};
