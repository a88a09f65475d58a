//! Audit persistence behind a trait. The engine never issues queries; a
//! production deployment backs this with the database collaborator and its
//! `(partition, seq)` uniqueness constraint.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::AuditError;
use crate::record::AuditRecord;

pub trait AuditStore: Send + Sync {
    /// Persist one record. Must be atomic per record.
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError>;

    /// The record with the highest `seq` in a partition.
    fn last(&self, partition: &str) -> Result<Option<AuditRecord>, AuditError>;

    /// All records of a partition in `seq` order.
    fn records(&self, partition: &str) -> Result<Vec<AuditRecord>, AuditError>;

    /// Every partition name with at least one record.
    fn partitions(&self) -> Result<Vec<String>, AuditError>;
}

/// In-memory store for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryAuditStore {
    partitions: RwLock<HashMap<String, Vec<AuditRecord>>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a stored record in place, bypassing the append-only
    /// surface. Exists to simulate out-of-band storage tampering in chain
    /// verification tests; nothing in the engine calls it.
    pub fn overwrite(&self, partition: &str, seq: u64, record: AuditRecord) {
        let mut partitions = self.partitions.write();
        if let Some(records) = partitions.get_mut(partition) {
            if let Some(slot) = records.iter_mut().find(|r| r.seq == seq) {
                *slot = record;
            }
        }
    }
}

impl AuditStore for MemoryAuditStore {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut partitions = self.partitions.write();
        let records = partitions.entry(record.partition.clone()).or_default();
        if records.iter().any(|r| r.seq == record.seq) {
            return Err(AuditError::Store(format!(
                "duplicate seq {} in partition {:?}",
                record.seq, record.partition
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    fn last(&self, partition: &str) -> Result<Option<AuditRecord>, AuditError> {
        Ok(self
            .partitions
            .read()
            .get(partition)
            .and_then(|records| records.last().cloned()))
    }

    fn records(&self, partition: &str) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(self
            .partitions
            .read()
            .get(partition)
            .cloned()
            .unwrap_or_default())
    }

    fn partitions(&self) -> Result<Vec<String>, AuditError> {
        let mut names: Vec<String> = self.partitions.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
