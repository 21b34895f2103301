//! Helper commands on the local machine
//!
//! Used for archive creation and extraction. Programs run directly with
//! their arguments, never through a shell.

use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

/// Exit status plus stdout followed by stderr
#[derive(Debug, Clone)]
pub struct LocalOutput {
    pub status: ExitStatus,
    pub output: String,
}

impl LocalOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Run `program` with `args` directly, without a shell.
pub async fn run_program<I, S>(program: &str, args: I) -> io::Result<LocalOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args);
    tracing::debug!("Running local program: {:?}", cmd.as_std());
    capture(&mut cmd).await
}

async fn capture(cmd: &mut Command) -> io::Result<LocalOutput> {
    let out = cmd.stdin(Stdio::null()).output().await?;
    let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
    output.push_str(&String::from_utf8_lossy(&out.stderr));
    Ok(LocalOutput {
        status: out.status,
        output,
    })
}
