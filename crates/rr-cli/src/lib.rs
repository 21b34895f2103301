//! remote-run: Command-line interface
//!
//! Provides the `remote-run` binary for running commands and copying files
//! on a remote host over SSH.

pub mod commands;
pub mod output;
pub mod settings;
