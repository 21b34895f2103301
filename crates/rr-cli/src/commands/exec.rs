//! Remote execution commands

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};

use rr_exec::{ExecEvent, Runner, RunStatus};

use crate::output::{print_line, print_warning};

/// Run `command`, print its buffered output, and fail on a non-zero exit
pub async fn run_command(runner: &Runner, command: &str, timeout_secs: i64) -> Result<()> {
    let output = runner
        .run(command, timeout_secs)
        .await
        .with_context(|| format!("Failed to run on {}", runner.connector().target()))?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.stdout.as_bytes())?;
    stdout.flush()?;
    drop(stdout);
    std::io::stderr().write_all(output.stderr.as_bytes())?;

    check_status(RunStatus {
        timed_out: output.timed_out,
        exit_status: output.exit_status,
    })
}

/// Run `command`, printing each line as soon as it arrives
pub async fn stream_command(runner: &Runner, command: &str, timeout_secs: i64) -> Result<()> {
    let mut stream = runner
        .stream(command, timeout_secs)
        .await
        .with_context(|| format!("Failed to start on {}", runner.connector().target()))?;

    while let Some(event) = stream.next_event().await {
        match event {
            ExecEvent::Line(line) => print_line(line.text(), line.origin()),
            ExecEvent::Finished(outcome) => {
                if let Some(err) = outcome.err {
                    return Err(err.into());
                }
                return check_status(RunStatus {
                    timed_out: outcome.timed_out,
                    exit_status: outcome.exit_status,
                });
            }
        }
    }
    bail!("Remote command ended without a result")
}

/// Run a local script file on the remote shell
pub async fn script_command(runner: &Runner, file: &Path, timeout_secs: i64) -> Result<()> {
    let status = runner
        .run_script_file(file, timeout_secs, print_line)
        .await
        .with_context(|| format!("Failed to run script {:?}", file))?;
    check_status(status)
}

/// Run an inline script on the remote shell
pub async fn inline_script_command(runner: &Runner, script: &str, timeout_secs: i64) -> Result<()> {
    let status = runner
        .run_script(script, timeout_secs, print_line)
        .await
        .context("Failed to run script")?;
    check_status(status)
}

fn check_status(status: RunStatus) -> Result<()> {
    if status.timed_out {
        print_warning("Remote command timed out");
        bail!("Remote command timed out");
    }
    match status.exit_status {
        Some(code) if code.success() => Ok(()),
        Some(code) => bail!("Remote command failed with {}", code),
        None => bail!("Remote command reported no exit status"),
    }
}
