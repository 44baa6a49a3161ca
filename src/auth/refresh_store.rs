use async_trait::async_trait;
use dashmap::DashMap;

use crate::models::RefreshEntry;

/// Server-side registry of outstanding refresh tokens, keyed by the token string.
///
/// `remove` must be atomic per key: when several callers race to remove the
/// same token, exactly one of them gets the entry back.
#[async_trait]
pub trait RefreshStore: Send + Sync {
    async fn get(&self, token: &str) -> Option<RefreshEntry>;

    async fn insert(&self, token: String, entry: RefreshEntry);

    /// Remove the entry and return it if it was present
    async fn remove(&self, token: &str) -> Option<RefreshEntry>;

    async fn len(&self) -> usize;
}

/// In-process store. Outstanding tokens are lost on restart.
#[derive(Default)]
pub struct MemoryRefreshStore {
    tokens: DashMap<String, RefreshEntry>, // refresh token -> owner
}

impl MemoryRefreshStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshStore for MemoryRefreshStore {
    async fn get(&self, token: &str) -> Option<RefreshEntry> {
        self.tokens.get(token).map(|entry| *entry.value())
    }

    async fn insert(&self, token: String, entry: RefreshEntry) {
        self.tokens.insert(token, entry);
    }

    async fn remove(&self, token: &str) -> Option<RefreshEntry> {
        self.tokens.remove(token).map(|(_, entry)| entry)
    }

    async fn len(&self) -> usize {
        self.tokens.len()
    }
}
