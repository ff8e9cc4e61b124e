use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShareQueueError {
    #[error("Share not found: {0}")]
    ShareNotFound(String),

    #[error("Share queue is shutting down")]
    ShuttingDown,
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
