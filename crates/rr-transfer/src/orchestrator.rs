//! Concurrent fan-out of transfer jobs
//!
//! Every job runs in its own task and reports exactly one result on a
//! channel sized to the number of jobs, so no job ever blocks on reporting.
//! The orchestrator counts successes until all jobs are done, a job fails, or
//! the shared deadline fires, whichever comes first.
//!
//! Stopping early does not abort jobs already running. They finish on their
//! own and their results are dropped; the shared [`CancellationToken`] only
//! lets jobs that have not started yet skip their work.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use rr_core::{bounded_timeout, Connector, TransferError, TransferJob};

use crate::client::TransferClient;

/// Aggregate result of one batch
#[derive(Debug)]
pub struct TransferReport {
    /// Jobs that reported success before the batch ended
    pub succeeded: usize,
    /// Jobs in the batch
    pub total: usize,
    /// The first failure observed, or the batch deadline
    pub first_error: Option<TransferError>,
}

impl TransferReport {
    /// Whether every job succeeded
    pub fn is_success(&self) -> bool {
        self.first_error.is_none()
    }

    /// `Ok(succeeded)` or the first error
    pub fn into_result(self) -> Result<usize, TransferError> {
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(self.succeeded),
        }
    }
}

/// Runs many transfers to one host concurrently
#[derive(Clone)]
pub struct TransferOrchestrator {
    client: Arc<TransferClient>,
}

impl TransferOrchestrator {
    /// Orchestrator using the default scp/tar client over `connector`
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::with_client(TransferClient::new(connector))
    }

    pub fn with_client(client: TransferClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Copy every `local -> remote` pair concurrently.
    ///
    /// For a local file the remote path names the destination file; for a
    /// local directory it names the remote directory to copy into.
    pub async fn copy_many(
        &self,
        mappings: HashMap<PathBuf, String>,
        timeout_secs: i64,
        verbose: bool,
    ) -> TransferReport {
        let jobs = mappings
            .into_iter()
            .map(|(local, remote)| TransferJob::new(local, remote))
            .collect();
        self.run_jobs(jobs, timeout_secs, verbose).await
    }

    /// Run `jobs` concurrently under one deadline of `timeout_secs`.
    pub async fn run_jobs(
        &self,
        jobs: Vec<TransferJob>,
        timeout_secs: i64,
        verbose: bool,
    ) -> TransferReport {
        let total = jobs.len();
        let mut report = TransferReport {
            succeeded: 0,
            total,
            first_error: None,
        };
        if total == 0 {
            return report;
        }

        let (result_tx, mut result_rx) = mpsc::channel(total);
        let cancel = CancellationToken::new();

        for job in jobs {
            tokio::spawn(run_job(
                Arc::clone(&self.client),
                job,
                timeout_secs,
                verbose,
                cancel.clone(),
                result_tx.clone(),
            ));
        }
        drop(result_tx);

        let deadline = tokio::time::sleep(bounded_timeout(timeout_secs));
        tokio::pin!(deadline);

        while report.succeeded < total {
            tokio::select! {
                received = result_rx.recv() => match received {
                    Some((job, Ok(()))) => {
                        tracing::debug!("Transfer done: {}", job);
                        report.succeeded += 1;
                    }
                    Some((job, Err(e))) => {
                        tracing::warn!("Transfer failed: {}: {}", job, e);
                        report.first_error = Some(e);
                        break;
                    }
                    None => {
                        report.first_error = Some(TransferError::Task {
                            path: PathBuf::new(),
                            reason: "transfer tasks ended without reporting".to_string(),
                        });
                        break;
                    }
                },
                _ = &mut deadline => {
                    tracing::warn!(
                        "Transfer batch timed out with {}/{} jobs finished",
                        report.succeeded,
                        total
                    );
                    report.first_error = Some(TransferError::Timeout {
                        completed: report.succeeded,
                        total,
                    });
                    break;
                }
            }
        }

        cancel.cancel();
        report
    }
}

type JobResult = (TransferJob, Result<(), TransferError>);

/// One job's task: copy, then report unless the batch has already ended.
async fn run_job(
    client: Arc<TransferClient>,
    job: TransferJob,
    timeout_secs: i64,
    verbose: bool,
    cancel: CancellationToken,
    results: mpsc::Sender<JobResult>,
) {
    if cancel.is_cancelled() {
        tracing::debug!("Skipping {}: batch already finished", job);
        return;
    }
    let result = AssertUnwindSafe(client.copy(
        &job.local_path,
        &job.remote_path,
        timeout_secs,
        verbose,
    ))
    .catch_unwind()
    .await
    .unwrap_or_else(|_| {
        Err(TransferError::Task {
            path: job.local_path.clone(),
            reason: "transfer task panicked".to_string(),
        })
    });
    if cancel.is_cancelled() {
        tracing::debug!("Dropping result of {}: batch already finished", job);
        return;
    }
    let _ = results.send((job, result)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_core::testing::{FakeConnector, FakeResponse};
    use std::path::Path;
    use std::time::Duration;

    fn orchestrator(connector: &FakeConnector) -> TransferOrchestrator {
        TransferOrchestrator::new(Arc::new(connector.clone()))
    }

    fn files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, name.as_bytes()).unwrap();
                path
            })
            .collect()
    }

    #[tokio::test]
    async fn test_all_jobs_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let paths = files(dir.path(), &["a", "b", "c"]);
        let connector = FakeConnector::always(FakeResponse::ok());

        let mappings = paths
            .iter()
            .map(|p| (p.clone(), format!("/srv/{}", p.file_name().unwrap().to_string_lossy())))
            .collect();
        let report = orchestrator(&connector).copy_many(mappings, 10, false).await;

        assert!(report.is_success());
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.into_result().unwrap(), 3);
        let mut commands = connector.commands();
        commands.sort();
        assert_eq!(commands, vec!["scp -t /srv/a", "scp -t /srv/b", "scp -t /srv/c"]);
    }

    #[tokio::test]
    async fn test_failing_job_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let paths = files(dir.path(), &["good", "bad"]);
        let connector = FakeConnector::new(|command| {
            if command.ends_with("/bad") {
                FakeResponse::ok().exit_status(1)
            } else {
                FakeResponse::ok()
            }
        });

        let mappings = HashMap::from([
            (paths[0].clone(), "/srv/good".to_string()),
            (paths[1].clone(), "/srv/bad".to_string()),
        ]);
        let err = orchestrator(&connector)
            .copy_many(mappings, 10, false)
            .await
            .into_result()
            .unwrap_err();

        match err {
            TransferError::Upload { local, remote, .. } => {
                assert_eq!(local, paths[1]);
                assert_eq!(remote, "/srv/bad");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_path_fails_without_connecting() {
        let connector = FakeConnector::always(FakeResponse::ok());
        let mappings = HashMap::from([(PathBuf::from("/local/missing"), "/remote/x".to_string())]);

        let err = orchestrator(&connector)
            .copy_many(mappings, 10, false)
            .await
            .into_result()
            .unwrap_err();

        assert_eq!(err.to_string(), "no such dir: /local/missing");
        assert_eq!(connector.opened(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let paths = files(dir.path(), &["fast", "slow"]);
        let connector = FakeConnector::new(|command| {
            if command.ends_with("/slow") {
                FakeResponse::ok().hang()
            } else {
                FakeResponse::ok()
            }
        });

        let mappings = HashMap::from([
            (paths[0].clone(), "/srv/fast".to_string()),
            (paths[1].clone(), "/srv/slow".to_string()),
        ]);
        let report = orchestrator(&connector).copy_many(mappings, 2, false).await;

        assert!(matches!(
            report.first_error,
            Some(TransferError::Timeout { completed: 1, total: 2 })
        ));
        assert_eq!(report.succeeded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_positive_timeout_waits_for_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = files(dir.path(), &["late"]);
        let connector = FakeConnector::always(FakeResponse::ok().delay(Duration::from_secs(120)));

        let mappings = HashMap::from([(paths[0].clone(), "/srv/late".to_string())]);
        let report = orchestrator(&connector).copy_many(mappings, -1, false).await;
        assert_eq!(report.into_result().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_failure_returns_without_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let paths = files(dir.path(), &["bad", "stuck"]);
        let connector = FakeConnector::new(|command| {
            if command.ends_with("/bad") {
                FakeResponse::ok().exit_status(1)
            } else {
                FakeResponse::ok().hang()
            }
        });

        let mappings = HashMap::from([
            (paths[0].clone(), "/srv/bad".to_string()),
            (paths[1].clone(), "/srv/stuck".to_string()),
        ]);
        let started = tokio::time::Instant::now();
        let report = orchestrator(&connector).copy_many(mappings, 60, false).await;

        assert!(matches!(report.first_error, Some(TransferError::Upload { .. })));
        assert_eq!(report.succeeded, 0);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    fn single_job(dir: &Path) -> TransferJob {
        let path = files(dir, &["late"]).remove(0);
        TransferJob::new(path, "/srv/late")
    }

    #[tokio::test]
    async fn test_job_skipped_after_batch_ended() {
        let dir = tempfile::tempdir().unwrap();
        let connector = FakeConnector::always(FakeResponse::ok());
        let client = Arc::new(TransferClient::new(Arc::new(connector.clone())));
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        cancel.cancel();

        run_job(client, single_job(dir.path()), 10, false, cancel, tx).await;

        assert!(rx.try_recv().is_err());
        assert_eq!(connector.opened(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_finishing_after_batch_ended_reports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let connector = FakeConnector::always(FakeResponse::ok().delay(Duration::from_secs(10)));
        let client = Arc::new(TransferClient::new(Arc::new(connector.clone())));
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_job(
            client,
            single_job(dir.path()),
            30,
            false,
            cancel.clone(),
            tx,
        ));
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        assert!(handle.await.is_ok());
        assert!(rx.recv().await.is_none());
        assert_eq!(connector.opened(), 1);
        assert_eq!(connector.closed(), 1);
    }

    #[tokio::test]
    async fn test_orphaned_directory_job_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let site = dir.path().join("site");
        std::fs::create_dir(&site).unwrap();
        std::fs::write(site.join("index.html"), "hi").unwrap();
        let connector = FakeConnector::new(|command| {
            if command.starts_with("cd ") {
                FakeResponse::ok().hang()
            } else {
                FakeResponse::ok()
            }
        });

        let mappings = HashMap::from([(site, "/var/www".to_string())]);
        let report = orchestrator(&connector).copy_many(mappings, 1, false).await;
        assert!(report.first_error.is_some());

        // The batch is over; the job's own extraction deadline ends it
        let mut cleaned = false;
        for _ in 0..50 {
            let removed = connector.commands().iter().any(|c| c.starts_with("rm -f"));
            if removed && connector.opened() == connector.closed() {
                cleaned = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(cleaned);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let connector = FakeConnector::always(FakeResponse::ok());
        let report = orchestrator(&connector)
            .copy_many(HashMap::new(), 10, false)
            .await;
        assert_eq!(report.total, 0);
        assert_eq!(report.into_result().unwrap(), 0);
    }
}
