//! Supervision of share pipelines.
//!
//! Each accepted share becomes a detached pipeline (resolve token, then run
//! the share loop) tracked by the manager. The record is written before the
//! pipeline is spawned, so callers can poll for it as soon as `submit`
//! returns. The pipeline makes no network call until the caller starts it
//! through the returned [`PendingShare`].

use crate::error::ShareQueueError;
use crate::executor::{ShareExecutor, ShareJob};
use crate::identity::ClientIdentities;
use crate::ledger::TaskLedger;
use crate::resolver::TokenResolver;
use shared::types::{ShareId, ShareStatus, ShareSummary, ShareTask, TaskUpdate};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// A validated share request.
#[derive(Debug, Clone)]
pub struct SubmitShare {
    pub credential: String,
    pub link: String,
    pub limit: u32,
}

/// A recorded share whose pipeline is parked until [`PendingShare::start`].
/// Dropping it releases the pipeline too, so a record never stays
/// `processing` with nothing behind it.
#[must_use = "the share pipeline waits until `start` is called"]
#[derive(Debug)]
pub struct PendingShare {
    id: ShareId,
    start: oneshot::Sender<()>,
}

impl PendingShare {
    pub fn id(&self) -> ShareId {
        self.id
    }

    /// Release the pipeline and hand back the share id.
    pub fn start(self) -> ShareId {
        // A closed receiver means the pipeline already stopped on shutdown.
        let _ = self.start.send(());
        self.id
    }
}

#[derive(Clone)]
pub struct ShareManager {
    ledger: Arc<dyn TaskLedger>,
    resolver: Arc<dyn TokenResolver>,
    executor: Arc<ShareExecutor>,
    identities: ClientIdentities,
    cancel_tokens: Arc<RwLock<HashMap<ShareId, CancellationToken>>>,
    pipelines: TaskTracker,
    shutdown: CancellationToken,
}

impl ShareManager {
    pub fn new(
        ledger: Arc<dyn TaskLedger>,
        resolver: Arc<dyn TokenResolver>,
        executor: Arc<ShareExecutor>,
        identities: ClientIdentities,
    ) -> Self {
        Self {
            ledger,
            resolver,
            executor,
            identities,
            cancel_tokens: Arc::new(RwLock::new(HashMap::new())),
            pipelines: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn ledger(&self) -> &Arc<dyn TaskLedger> {
        &self.ledger
    }

    /// Record a new share and park its pipeline until the returned handle
    /// is started.
    pub async fn submit(&self, request: SubmitShare) -> Result<PendingShare, ShareQueueError> {
        if self.shutdown.is_cancelled() {
            return Err(ShareQueueError::ShuttingDown);
        }

        let task = ShareTask::new(request.link.clone(), request.limit);
        let share_id = task.id;

        // The token is reachable before the record is, so `cancel` and
        // `clear_history` never see an active share they cannot stop.
        let cancel = self.shutdown.child_token();
        self.cancel_tokens
            .write()
            .await
            .insert(share_id, cancel.clone());
        self.ledger.create(task).await;

        let (start_tx, start_rx) = oneshot::channel();
        let manager = self.clone();
        self.pipelines.spawn(async move {
            tokio::select! {
                _ = start_rx => {}
                _ = cancel.cancelled() => {}
            }
            manager.supervise(share_id, request, cancel).await;
        });

        info!(share_id = %share_id, "Accepted share request");
        Ok(PendingShare {
            id: share_id,
            start: start_tx,
        })
    }

    /// Signal a running share to stop at its next iteration.
    pub async fn cancel(&self, share_id: ShareId) -> Result<(), ShareQueueError> {
        if !self.ledger.is_active(share_id).await {
            return Err(ShareQueueError::ShareNotFound(share_id.to_string()));
        }

        match self.cancel_tokens.read().await.get(&share_id) {
            Some(token) => {
                token.cancel();
                info!(share_id = %share_id, "Cancellation requested");
                Ok(())
            }
            None => Err(ShareQueueError::ShareNotFound(share_id.to_string())),
        }
    }

    /// Stop every running share and drop all records.
    pub async fn clear_history(&self) -> usize {
        for token in self.cancel_tokens.read().await.values() {
            token.cancel();
        }
        self.ledger.clear().await
    }

    /// Refuse new shares, cancel running ones and wait for every pipeline
    /// to write its final state.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.pipelines.close();

        let pending = self.pipelines.len();
        if pending > 0 {
            info!(pending, "Waiting for share pipelines to stop");
        }
        self.pipelines.wait().await;
    }

    /// Outermost boundary of a pipeline: a panic inside it is recorded as a
    /// failed share instead of taking anything else down.
    async fn supervise(&self, share_id: ShareId, request: SubmitShare, cancel: CancellationToken) {
        let manager = self.clone();
        let worker =
            tokio::spawn(async move { manager.run_pipeline(share_id, request, cancel).await });

        match worker.await {
            Ok(summary) => info!(
                share_id = %share_id,
                success = summary.success,
                failed = summary.failed,
                status = %summary.status,
                "Share pipeline finished"
            ),
            Err(e) => {
                error!(share_id = %share_id, error = %e, "Share pipeline aborted");
                self.ledger.update(share_id, TaskUpdate::fail()).await;
            }
        }

        self.ledger.complete(share_id).await;
        self.cancel_tokens.write().await.remove(&share_id);
    }

    async fn run_pipeline(
        &self,
        share_id: ShareId,
        request: SubmitShare,
        cancel: CancellationToken,
    ) -> ShareSummary {
        if cancel.is_cancelled() {
            info!(share_id = %share_id, "Share cancelled before it started");
            return self.end_early(share_id, &request, ShareStatus::Cancelled).await;
        }

        let identity = self.identities.pick();

        let Some(token) = self.resolver.resolve(&request.credential, &identity).await else {
            if cancel.is_cancelled() {
                info!(share_id = %share_id, "Share cancelled while resolving token");
                return self.end_early(share_id, &request, ShareStatus::Cancelled).await;
            }
            warn!(share_id = %share_id, "No token resolved, failing share");
            return self.end_early(share_id, &request, ShareStatus::Failed).await;
        };

        self.ledger
            .update(
                share_id,
                TaskUpdate {
                    token: Some(token.clone()),
                    ..TaskUpdate::default()
                },
            )
            .await;

        let job = ShareJob {
            id: share_id,
            token,
            link: request.link,
            credential: request.credential,
            identity,
            count: request.limit,
        };
        let summary = self.executor.run(&job, &cancel).await;

        self.ledger
            .update(share_id, TaskUpdate::finish(&summary))
            .await;
        summary
    }

    /// Close out a share that never reached the share loop.
    async fn end_early(
        &self,
        share_id: ShareId,
        request: &SubmitShare,
        status: ShareStatus,
    ) -> ShareSummary {
        let summary = ShareSummary {
            success: 0,
            failed: 0,
            total: request.limit,
            status,
        };
        self.ledger
            .update(share_id, TaskUpdate::finish(&summary))
            .await;
        summary
    }
}
