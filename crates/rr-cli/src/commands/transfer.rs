//! Copy commands

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use rr_transfer::{TransferClient, TransferOrchestrator};

use crate::output::{format_report, print_error, print_success};

/// Copy one local file or directory
pub async fn copy_command(
    client: &TransferClient,
    local: &Path,
    remote: &str,
    timeout_secs: i64,
    verbose: bool,
) -> Result<()> {
    client.copy(local, remote, timeout_secs, verbose).await?;
    print_success(&format!("Copied {} -> {}", local.display(), remote));
    Ok(())
}

/// Copy a file through a staging path so the destination is never partial
pub async fn safe_copy_command(client: &TransferClient, local: &Path, remote: &str) -> Result<()> {
    client.safe_copy(local, remote).await?;
    print_success(&format!("Copied {} -> {}", local.display(), remote));
    Ok(())
}

/// Copy several `LOCAL=REMOTE` pairs concurrently
pub async fn copy_many_command(
    orchestrator: &TransferOrchestrator,
    pairs: &[String],
    timeout_secs: i64,
    verbose: bool,
) -> Result<()> {
    let mappings = parse_mappings(pairs)?;
    let report = orchestrator.copy_many(mappings, timeout_secs, verbose).await;
    let summary = format_report(&report);
    if report.is_success() {
        print_success(&summary);
        Ok(())
    } else {
        print_error(&summary);
        report.into_result()?;
        Ok(())
    }
}

/// Parse `LOCAL=REMOTE` pairs; a local path may appear only once
pub fn parse_mappings(pairs: &[String]) -> Result<HashMap<PathBuf, String>> {
    let mut mappings = HashMap::with_capacity(pairs.len());
    for pair in pairs {
        let Some((local, remote)) = pair.split_once('=') else {
            bail!("Expected LOCAL=REMOTE, got {:?}", pair);
        };
        if local.is_empty() || remote.is_empty() {
            bail!("Expected LOCAL=REMOTE, got {:?}", pair);
        }
        if mappings
            .insert(PathBuf::from(local), remote.to_string())
            .is_some()
        {
            bail!("Local path given twice: {}", local);
        }
    }
    Ok(mappings)
}
