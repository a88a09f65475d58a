//! Token storage behind a trait so a production keyed store can replace
//! the in-memory map without touching callers.

use std::collections::HashMap;

use innkeep_crypto::EncryptedEnvelope;
use parking_lot::RwLock;

/// Keyed envelope storage for the tokenization vault.
pub trait TokenStore: Send + Sync {
    fn get(&self, token: &str) -> Option<EncryptedEnvelope>;
    fn put(&self, token: &str, envelope: EncryptedEnvelope);
    fn delete(&self, token: &str) -> bool;
}

/// In-memory store. Reads of distinct tokens share the read lock; writes
/// are serialized by the write lock.
#[derive(Default)]
pub struct InMemoryTokenStore {
    entries: RwLock<HashMap<String, EncryptedEnvelope>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn get(&self, token: &str) -> Option<EncryptedEnvelope> {
        self.entries.read().get(token).cloned()
    }

    fn put(&self, token: &str, envelope: EncryptedEnvelope) {
        self.entries.write().insert(token.to_string(), envelope);
    }

    fn delete(&self, token: &str) -> bool {
        self.entries.write().remove(token).is_some()
    }
}
