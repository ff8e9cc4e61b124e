use crate::client::{ShareCall, ShareClient, ShareOutcome};
use crate::ledger::TaskLedger;
use futures::future::join_all;
use rand::Rng;
use serde::Deserialize;
use shared::types::{ShareId, ShareStatus, ShareSummary, TaskUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One request at a time, `delay_ms` plus up to `jitter_ms` between them.
    Sequential,
    /// `batch_size` concurrent requests, `delay_ms` between batches.
    #[default]
    Batched,
}

/// What the loop does after a request fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep going until the count is exhausted or the share is cancelled.
    #[default]
    Continue,
    /// Stop after the first iteration that produced a failure.
    AbortOnFailure,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    pub strategy: Strategy,
    pub batch_size: u32,
    pub delay_ms: u64,
    pub jitter_ms: u64,
    pub failure_policy: FailurePolicy,
    /// Pause after an HTTP 429. Zero disables the pause.
    pub rate_limit_pause_ms: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            strategy: Strategy::Batched,
            batch_size: 5,
            delay_ms: 50,
            jitter_ms: 0,
            failure_policy: FailurePolicy::Continue,
            rate_limit_pause_ms: 60_000,
        }
    }
}

/// One share run, as handed to the executor.
#[derive(Debug, Clone)]
pub struct ShareJob {
    pub id: ShareId,
    pub token: String,
    pub link: String,
    pub credential: String,
    pub identity: String,
    pub count: u32,
}

pub struct ShareExecutor {
    client: Arc<dyn ShareClient>,
    ledger: Arc<dyn TaskLedger>,
    settings: ExecutorSettings,
}

impl ShareExecutor {
    pub fn new(
        client: Arc<dyn ShareClient>,
        ledger: Arc<dyn TaskLedger>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            client,
            ledger,
            settings,
        }
    }

    /// Run up to `job.count` share calls, writing counters to the ledger as
    /// they land. Never fails: every outcome ends up in the summary.
    pub async fn run(&self, job: &ShareJob, cancel: &CancellationToken) -> ShareSummary {
        info!(
            share_id = %job.id,
            count = job.count,
            strategy = ?self.settings.strategy,
            "Starting share loop"
        );

        let call = ShareCall {
            token: &job.token,
            link: &job.link,
            credential: &job.credential,
            identity: &job.identity,
        };

        let mut success = 0u32;
        let mut failed = 0u32;
        let mut done = 0u32;
        let mut cancelled = false;

        while done < job.count {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let size = self.iteration_size(job.count - done);
            let outcomes = if size == 1 {
                vec![self.client.share(call).await]
            } else {
                join_all((0..size).map(|_| self.client.share(call))).await
            };

            let mut rate_limited = false;
            for outcome in &outcomes {
                match outcome {
                    ShareOutcome::Shared(_) => success += 1,
                    ShareOutcome::RateLimited => {
                        failed += 1;
                        rate_limited = true;
                    }
                    ShareOutcome::Failed(reason) => {
                        failed += 1;
                        debug!(share_id = %job.id, %reason, "Share call failed");
                    }
                }
            }
            done += size;

            self.ledger
                .update(job.id, TaskUpdate::counters(success, failed))
                .await;

            let iteration_failed = outcomes.iter().any(|o| !o.is_success());
            if iteration_failed && self.settings.failure_policy == FailurePolicy::AbortOnFailure {
                warn!(share_id = %job.id, done, "Stopping share loop after failure");
                break;
            }
            if done >= job.count {
                break;
            }

            let pause = if rate_limited && self.settings.rate_limit_pause_ms > 0 {
                warn!(share_id = %job.id, "Rate limited, pausing share loop");
                Duration::from_millis(self.settings.rate_limit_pause_ms)
            } else {
                self.next_delay()
            };

            if !pause.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        let status = if cancelled {
            ShareStatus::Cancelled
        } else if success > 0 {
            ShareStatus::Completed
        } else {
            ShareStatus::Failed
        };

        info!(share_id = %job.id, success, failed, %status, "Share loop finished");

        ShareSummary {
            success,
            failed,
            total: job.count,
            status,
        }
    }

    fn iteration_size(&self, remaining: u32) -> u32 {
        match self.settings.strategy {
            Strategy::Sequential => 1,
            Strategy::Batched => self.settings.batch_size.max(1).min(remaining),
        }
    }

    fn next_delay(&self) -> Duration {
        let jitter = match self.settings.strategy {
            Strategy::Sequential if self.settings.jitter_ms > 0 => {
                rand::rng().random_range(0..=self.settings.jitter_ms)
            }
            _ => 0,
        };
        Duration::from_millis(self.settings.delay_ms + jitter)
    }
}
