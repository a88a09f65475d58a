//! Append-only, hash-chained audit log engine.
//!
//! Appends to a partition are serialized by a per-partition mutex held
//! across the read-tail → hash → persist sequence: two concurrent appends
//! can never compute from the same stale `prevHash`, so a forked chain is
//! structurally impossible, not merely detected after the fact.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use innkeep_crypto::random_uuid;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::error::AuditError;
use crate::record::{compute_self_hash, AuditCategory, AuditRecord, AuditSeverity};
use crate::sanitize::sanitize_for_logging;
use crate::store::{AuditStore, MemoryAuditStore};

/// Outcome of [`AuditLog::verify_chain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerification {
    pub valid: bool,
    /// 1-based position of the first mismatch.
    pub broken_at: Option<u64>,
    pub records_checked: u64,
}

pub struct AuditLog {
    store: Arc<dyn AuditStore>,
    tails: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            tails: Mutex::new(HashMap::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryAuditStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    fn tail_lock(&self, partition: &str) -> Arc<Mutex<()>> {
        self.tails
            .lock()
            .entry(partition.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Append a record to a partition's chain.
    ///
    /// `details` is sanitized before it is hashed or stored. If persistence
    /// fails, the append is retried once with the same `prevHash` read;
    /// the chain pointer never advances speculatively, so a failed append
    /// cannot corrupt the chain for later appends.
    pub fn append(
        &self,
        partition: &str,
        category: AuditCategory,
        severity: AuditSeverity,
        actor: &str,
        target: &str,
        details: Value,
    ) -> Result<AuditRecord, AuditError> {
        let tail = self.tail_lock(partition);
        let _guard = tail.lock();

        let (prev_hash, seq) = match self.store.last(partition)? {
            Some(prev) => (Some(prev.self_hash), prev.seq + 1),
            None => (None, 1),
        };

        let mut record = AuditRecord {
            id: random_uuid(),
            partition: partition.to_string(),
            seq,
            timestamp: Utc::now(),
            category,
            severity,
            actor: actor.to_string(),
            target: target.to_string(),
            details: sanitize_for_logging(&details),
            prev_hash,
            self_hash: String::new(),
        };
        record.self_hash = compute_self_hash(&record)?;

        if let Err(first) = self.store.append(&record) {
            tracing::warn!(%partition, seq, error = %first, "audit append failed; retrying");
            self.store.append(&record)?;
        }

        tracing::debug!(
            %partition,
            seq,
            category = category.as_str(),
            severity = severity.as_str(),
            "audit record appended"
        );
        Ok(record)
    }

    /// Recompute the partition's hashes sequentially and report the first
    /// mismatch, if any.
    pub fn verify_chain(&self, partition: &str) -> Result<ChainVerification, AuditError> {
        let records = self.store.records(partition)?;
        let mut prev_hash: Option<&str> = None;

        for (index, record) in records.iter().enumerate() {
            let position = (index + 1) as u64;
            let intact = record.seq == position
                && record.prev_hash.as_deref() == prev_hash
                && compute_self_hash(record)? == record.self_hash;
            if !intact {
                return Ok(ChainVerification {
                    valid: false,
                    broken_at: Some(position),
                    records_checked: records.len() as u64,
                });
            }
            prev_hash = Some(&record.self_hash);
        }

        Ok(ChainVerification {
            valid: true,
            broken_at: None,
            records_checked: records.len() as u64,
        })
    }

    /// Hard-failure form of [`verify_chain`](Self::verify_chain).
    pub fn ensure_chain(&self, partition: &str) -> Result<(), AuditError> {
        let verification = self.verify_chain(partition)?;
        match verification.broken_at {
            None => Ok(()),
            Some(position) => Err(AuditError::ChainIntegrity {
                partition: partition.to_string(),
                position,
            }),
        }
    }
}
