use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ShareId = Uuid;

/// Lifecycle of a share task. `Processing` is the only non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ShareStatus {
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl ShareStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ShareStatus::Processing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShareStatus::Processing => "processing",
            ShareStatus::Completed => "completed",
            ShareStatus::Failed => "failed",
            ShareStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ShareStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One share campaign, from acceptance to terminal status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareTask {
    pub id: ShareId,
    pub link: String,
    pub requested: u32,
    pub success: u32,
    pub failed: u32,
    pub status: ShareStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Resolved bearer token. Never serialized.
    #[serde(skip)]
    pub token: Option<String>,
}

impl ShareTask {
    pub fn new(link: String, requested: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            link,
            requested,
            success: 0,
            failed: 0,
            status: ShareStatus::Processing,
            start_time: Utc::now(),
            end_time: None,
            token: None,
        }
    }

    /// Completed percentage of the requested shares, rounded.
    pub fn progress(&self) -> u32 {
        if self.requested == 0 {
            return 0;
        }
        ((f64::from(self.success) / f64::from(self.requested)) * 100.0).round() as u32
    }

    /// Apply a partial update in place.
    ///
    /// A terminal record is frozen: the update is dropped and `false` is
    /// returned. Counter updates are clamped so `success + failed` never
    /// exceeds `requested`.
    pub fn apply(&mut self, update: &TaskUpdate) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        let success = update.success.unwrap_or(self.success).min(self.requested);
        self.failed = update
            .failed
            .unwrap_or(self.failed)
            .min(self.requested - success);
        self.success = success;
        if let Some(token) = &update.token {
            self.token = Some(token.clone());
        }
        if let Some(status) = update.status {
            self.status = status;
            if status.is_terminal() {
                self.end_time = Some(update.end_time.unwrap_or_else(Utc::now));
            }
        } else if let Some(end_time) = update.end_time {
            self.end_time = Some(end_time);
        }
        true
    }
}

/// Partial mutation of a [`ShareTask`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub success: Option<u32>,
    pub failed: Option<u32>,
    pub status: Option<ShareStatus>,
    pub end_time: Option<DateTime<Utc>>,
    pub token: Option<String>,
}

impl TaskUpdate {
    pub fn counters(success: u32, failed: u32) -> Self {
        Self {
            success: Some(success),
            failed: Some(failed),
            ..Self::default()
        }
    }

    pub fn finish(summary: &ShareSummary) -> Self {
        Self {
            success: Some(summary.success),
            failed: Some(summary.failed),
            status: Some(summary.status),
            end_time: Some(Utc::now()),
            token: None,
        }
    }

    pub fn fail() -> Self {
        Self {
            status: Some(ShareStatus::Failed),
            end_time: Some(Utc::now()),
            ..Self::default()
        }
    }
}

/// Outcome of one run of the share loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareSummary {
    pub success: u32,
    pub failed: u32,
    pub total: u32,
    pub status: ShareStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerStats {
    pub total: usize,
    pub active: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total_requested: u64,
    pub total_success: u64,
    pub total_failed: u64,
}
