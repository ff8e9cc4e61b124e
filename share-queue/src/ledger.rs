use async_trait::async_trait;
use shared::types::{LedgerStats, ShareId, ShareStatus, ShareTask, TaskUpdate};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const DEFAULT_CAPACITY: usize = 100;

/// Store of share task records.
///
/// Callers hold it as `Arc<dyn TaskLedger>` so a persistent backend can
/// replace the in-memory one.
#[async_trait]
pub trait TaskLedger: Send + Sync {
    /// Append a new record to history and mark it active.
    async fn create(&self, task: ShareTask);

    /// Apply `update` to the record with `id`. Returns `false` when the
    /// record is unknown or already terminal.
    async fn update(&self, id: ShareId, update: TaskUpdate) -> bool;

    /// Drop `id` from the active set. History is left untouched.
    async fn complete(&self, id: ShareId);

    async fn query(&self, id: ShareId) -> Option<ShareTask>;

    /// Most recent `limit` records, newest first.
    async fn list(&self, limit: usize) -> Vec<ShareTask>;

    /// In-flight records, oldest first.
    async fn list_active(&self) -> Vec<ShareTask>;

    async fn is_active(&self, id: ShareId) -> bool;

    async fn stats(&self) -> LedgerStats;

    /// Remove every record. Returns how many history records were dropped.
    async fn clear(&self) -> usize;

    /// Full history, oldest first.
    async fn snapshot(&self) -> Vec<ShareTask>;

    /// Replace history with `tasks` (oldest first). The active set is reset.
    async fn restore(&self, tasks: Vec<ShareTask>);

    fn capacity(&self) -> usize;
}

#[derive(Default)]
struct LedgerState {
    history: VecDeque<ShareTask>,
    active: HashMap<ShareId, ShareTask>,
    /// Active ids in creation order, for stable listing.
    active_order: Vec<ShareId>,
}

impl LedgerState {
    fn trim(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.history.len() > capacity {
            if let Some(task) = self.history.pop_front() {
                if self.active.contains_key(&task.id) {
                    warn!(share_id = %task.id, "Evicted history record of a running share");
                }
                evicted += 1;
            }
        }
        evicted
    }
}

pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    capacity: usize,
}

impl InMemoryLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(LedgerState::default())),
            capacity: capacity.max(1),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl TaskLedger for InMemoryLedger {
    async fn create(&self, task: ShareTask) {
        let mut state = self.state.write().await;
        let task_id = task.id;

        if task.status == ShareStatus::Processing {
            state.active.insert(task_id, task.clone());
            state.active_order.push(task_id);
        }
        state.history.push_back(task);

        let evicted = state.trim(self.capacity);
        if evicted > 0 {
            debug!(evicted, capacity = self.capacity, "Trimmed share history");
        }

        info!(share_id = %task_id, "Created share task");
    }

    async fn update(&self, id: ShareId, update: TaskUpdate) -> bool {
        let mut state = self.state.write().await;
        let mut applied = false;

        if let Some(task) = state.active.get_mut(&id) {
            applied |= task.apply(&update);
        }
        if let Some(task) = state.history.iter_mut().rev().find(|t| t.id == id) {
            applied |= task.apply(&update);
        }

        if !applied {
            debug!(share_id = %id, "Ignored update for unknown or finished share");
        }
        applied
    }

    async fn complete(&self, id: ShareId) {
        let mut state = self.state.write().await;
        if state.active.remove(&id).is_some() {
            state.active_order.retain(|active_id| *active_id != id);
            debug!(share_id = %id, "Share left the active set");
        }
    }

    async fn query(&self, id: ShareId) -> Option<ShareTask> {
        let state = self.state.read().await;
        state
            .active
            .get(&id)
            .or_else(|| state.history.iter().rev().find(|t| t.id == id))
            .cloned()
    }

    async fn list(&self, limit: usize) -> Vec<ShareTask> {
        let state = self.state.read().await;
        state.history.iter().rev().take(limit).cloned().collect()
    }

    async fn list_active(&self) -> Vec<ShareTask> {
        let state = self.state.read().await;
        state
            .active_order
            .iter()
            .filter_map(|id| state.active.get(id))
            .cloned()
            .collect()
    }

    async fn is_active(&self, id: ShareId) -> bool {
        self.state.read().await.active.contains_key(&id)
    }

    async fn stats(&self) -> LedgerStats {
        let state = self.state.read().await;
        let mut stats = LedgerStats {
            total: state.history.len(),
            active: state.active.len(),
            ..LedgerStats::default()
        };

        for task in &state.history {
            match task.status {
                ShareStatus::Processing => stats.processing += 1,
                ShareStatus::Completed => stats.completed += 1,
                ShareStatus::Failed => stats.failed += 1,
                ShareStatus::Cancelled => stats.cancelled += 1,
            }
            stats.total_requested += u64::from(task.requested);
            stats.total_success += u64::from(task.success);
            stats.total_failed += u64::from(task.failed);
        }

        stats
    }

    async fn clear(&self) -> usize {
        let mut state = self.state.write().await;
        let cleared = state.history.len();
        state.history.clear();
        state.active.clear();
        state.active_order.clear();
        info!(cleared, "Cleared share history");
        cleared
    }

    async fn snapshot(&self) -> Vec<ShareTask> {
        self.state.read().await.history.iter().cloned().collect()
    }

    async fn restore(&self, tasks: Vec<ShareTask>) {
        let mut state = self.state.write().await;
        state.active.clear();
        state.active_order.clear();
        state.history = tasks.into();
        state.trim(self.capacity);
        info!(records = state.history.len(), "Restored share history");
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
