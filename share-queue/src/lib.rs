pub mod client;
pub mod error;
pub mod executor;
pub mod identity;
pub mod ledger;
pub mod manager;
pub mod resolver;
pub mod snapshot;

pub use client::{HttpShareClient, ShareClient};
pub use error::{ShareQueueError, SnapshotError};
pub use executor::ShareExecutor;
pub use identity::ClientIdentities;
pub use ledger::{InMemoryLedger, TaskLedger};
pub use manager::{PendingShare, ShareManager, SubmitShare};
pub use resolver::{HttpTokenResolver, PatternExtractor, TokenResolver};
pub use snapshot::SnapshotFile;
