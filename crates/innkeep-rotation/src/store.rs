//! Stores for rotatable key material and API keys, behind traits so the
//! persistence collaborator can supply real implementations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use innkeep_crypto::EncryptedEnvelope;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// One persisted piece of master-protected key material.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyMaterial {
    /// `[lineage:4 BE][AES-KW(KEK, DEK):40]`.
    WrappedDek(Vec<u8>),
    /// A sealed PKCS#8 private key; its envelope `keyId` names the lineage
    /// protecting it.
    PrivateKey(EncryptedEnvelope),
}

pub trait KeyMaterialStore: Send + Sync {
    /// Stable, sorted ids; checkpoints index into this order.
    fn ids(&self) -> Vec<String>;
    fn get(&self, id: &str) -> Option<KeyMaterial>;
    fn put(&self, id: &str, material: KeyMaterial);
}

#[derive(Default)]
pub struct MemoryKeyMaterialStore {
    entries: RwLock<BTreeMap<String, KeyMaterial>>,
}

impl MemoryKeyMaterialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyMaterialStore for MemoryKeyMaterialStore {
    fn ids(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    fn get(&self, id: &str) -> Option<KeyMaterial> {
        self.entries.read().get(id).cloned()
    }

    fn put(&self, id: &str, material: KeyMaterial) {
        self.entries.write().insert(id.to_string(), material);
    }
}

/// Persisted form of a partner API key: digest and display hint only,
/// never the secret itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyRecord {
    pub hash: String,
    pub hint: String,
    pub rotated_at: DateTime<Utc>,
}

pub trait ApiKeyStore: Send + Sync {
    fn ids(&self) -> Vec<String>;
    fn get(&self, id: &str) -> Option<ApiKeyRecord>;
    fn replace(&self, id: &str, record: ApiKeyRecord);
}

#[derive(Default)]
pub struct MemoryApiKeyStore {
    entries: RwLock<BTreeMap<String, ApiKeyRecord>>,
}

impl MemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApiKeyStore for MemoryApiKeyStore {
    fn ids(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    fn get(&self, id: &str) -> Option<ApiKeyRecord> {
        self.entries.read().get(id).cloned()
    }

    fn replace(&self, id: &str, record: ApiKeyRecord) {
        self.entries.write().insert(id.to_string(), record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_store_ids_are_sorted() {
        let store = MemoryKeyMaterialStore::new();
        store.put("dek-b", KeyMaterial::WrappedDek(vec![0u8; 44]));
        store.put("dek-a", KeyMaterial::WrappedDek(vec![1u8; 44]));
        assert_eq!(store.ids(), vec!["dek-a", "dek-b"]);
        assert!(store.get("dek-a").is_some());
        assert!(store.get("dek-c").is_none());
    }

    #[test]
    fn api_key_store_replaces() {
        let store = MemoryApiKeyStore::new();
        let first = ApiKeyRecord {
            hash: "aa".into(),
            hint: "****aaaa".into(),
            rotated_at: Utc::now(),
        };
        store.replace("partner-1", first);
        let second = ApiKeyRecord {
            hash: "bb".into(),
            hint: "****bbbb".into(),
            rotated_at: Utc::now(),
        };
        store.replace("partner-1", second.clone());
        assert_eq!(store.get("partner-1").unwrap(), second);
        assert_eq!(store.ids(), vec!["partner-1"]);
    }
}
