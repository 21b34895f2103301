//! rr-ssh: SSH transport for remote-run
//!
//! [`SshConnector`] dials a host with russh, authenticates with the
//! configured password, key file or agent, and hands out one
//! [`RusshSession`] per connection. Each session runs a single command on
//! a fresh `session` channel.

mod connector;
mod session;

pub use connector::SshConnector;
pub use session::RusshSession;
