//! JSON bodies exchanged over the HTTP API.
//!
//! Every response carries a boolean `status` envelope field; failures add a
//! machine-readable `code`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{LedgerStats, ShareId, ShareStatus, ShareTask};

/// Body of `POST /api/share`.
///
/// `limit` accepts a JSON number or a numeric string, so it is kept raw
/// until validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShareRequest {
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub limit: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareAccepted {
    pub status: bool,
    pub message: String,
    pub share_id: ShareId,
    pub timestamp: DateTime<Utc>,
}

/// Public view of a task record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareView {
    pub id: ShareId,
    pub link: String,
    pub requested: u32,
    pub success: u32,
    pub failed: u32,
    pub status: ShareStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub progress: u32,
}

impl From<&ShareTask> for ShareView {
    fn from(task: &ShareTask) -> Self {
        Self {
            id: task.id,
            link: task.link.clone(),
            requested: task.requested,
            success: task.success,
            failed: task.failed,
            status: task.status,
            start_time: task.start_time,
            end_time: task.end_time,
            progress: task.progress(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareResponse {
    pub status: bool,
    pub share: ShareView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub status: bool,
    pub history: Vec<ShareView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningSharesResponse {
    pub status: bool,
    pub running_shares: Vec<ShareView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub status: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearHistoryResponse {
    pub status: bool,
    pub message: String,
    pub cleared: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub status: bool,
    pub stats: LedgerStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub active_shares: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: bool,
    pub code: String,
    pub message: String,
}
