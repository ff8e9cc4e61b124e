use rand::seq::IndexedRandom;
use std::sync::Arc;

/// Pool of client identity strings sent as `User-Agent`. One is picked at
/// random per share task.
#[derive(Clone, Debug)]
pub struct ClientIdentities {
    pool: Arc<Vec<String>>,
}

impl ClientIdentities {
    pub fn new(pool: Vec<String>) -> Self {
        let pool: Vec<String> = pool.into_iter().filter(|s| !s.trim().is_empty()).collect();
        if pool.is_empty() {
            return Self::default();
        }
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pick(&self) -> String {
        self.pool
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(default_identity)
    }

}

impl Default for ClientIdentities {
    fn default() -> Self {
        Self {
            pool: Arc::new(vec![default_identity()]),
        }
    }
}

fn default_identity() -> String {
    format!("share-relay/{}", env!("CARGO_PKG_VERSION"))
}
