//! Whole-file JSON snapshots of the ledger history.
//!
//! The file is rewritten in full on every save (temp file + rename). There
//! is no locking: one process owns one snapshot file.

use crate::error::SnapshotError;
use crate::ledger::TaskLedger;
use shared::types::{ShareStatus, ShareTask, TaskUpdate};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored history. A missing file is an empty history.
    ///
    /// Records still `processing` belonged to pipelines that died with the
    /// previous process; they come back as `failed`.
    pub async fn load(&self) -> Result<Vec<ShareTask>, SnapshotError> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut tasks: Vec<ShareTask> = serde_json::from_slice(&contents)?;
        for task in tasks
            .iter_mut()
            .filter(|t| t.status == ShareStatus::Processing)
        {
            task.apply(&TaskUpdate::fail());
        }
        Ok(tasks)
    }

    pub async fn save(&self, tasks: &[ShareTask]) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(tasks)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(records = tasks.len(), path = %self.path.display(), "Wrote snapshot");
        Ok(())
    }

    /// Load the file into `ledger`. Returns the number of restored records.
    pub async fn restore_into(&self, ledger: &dyn TaskLedger) -> Result<usize, SnapshotError> {
        let tasks = self.load().await?;
        let count = tasks.len();
        ledger.restore(tasks).await;
        info!(records = count, path = %self.path.display(), "Loaded snapshot");
        Ok(count)
    }

    pub async fn save_from(&self, ledger: &dyn TaskLedger) -> Result<(), SnapshotError> {
        self.save(&ledger.snapshot().await).await
    }
}

/// Save `ledger` every `interval` until `shutdown` fires, then once more.
pub fn spawn_snapshotter(
    file: SnapshotFile,
    ledger: Arc<dyn TaskLedger>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = file.save_from(ledger.as_ref()).await {
                        error!(error = %e, "Periodic snapshot failed");
                    }
                }
            }
        }

        if let Err(e) = file.save_from(ledger.as_ref()).await {
            error!(error = %e, "Final snapshot failed");
        }
    })
}
