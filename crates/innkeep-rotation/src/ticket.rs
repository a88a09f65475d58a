//! Rotation tickets: durable progress records that make an interrupted
//! rotation resumable from its last completed checkpoint.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use innkeep_crypto::random_uuid;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RotationScope {
    DataKeys,
    ApiKeys,
    MasterKey,
}

impl RotationScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationScope::DataKeys => "DATA_KEYS",
            RotationScope::ApiKeys => "API_KEYS",
            RotationScope::MasterKey => "MASTER_KEY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RotationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// Mutated only by the coordinator; terminal once COMPLETED. FAILED
/// tickets carry the checkpoint resume starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRotationTicket {
    pub id: String,
    pub scope: RotationScope,
    pub old_key_id: String,
    pub new_key_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RotationStatus,
    /// Number of entries already re-wrapped and durably checkpointed.
    pub checkpoint: usize,
    pub error: Option<String>,
}

impl KeyRotationTicket {
    pub fn new(scope: RotationScope, old_key_id: String, new_key_id: String) -> Self {
        Self {
            id: random_uuid().to_string(),
            scope,
            old_key_id,
            new_key_id,
            started_at: Utc::now(),
            completed_at: None,
            status: RotationStatus::Pending,
            checkpoint: 0,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            RotationStatus::Completed | RotationStatus::Failed
        )
    }
}

pub trait TicketStore: Send + Sync {
    fn get(&self, id: &str) -> Option<KeyRotationTicket>;
    fn put(&self, ticket: &KeyRotationTicket);
    fn all(&self) -> Vec<KeyRotationTicket>;
}

#[derive(Default)]
pub struct MemoryTicketStore {
    tickets: RwLock<HashMap<String, KeyRotationTicket>>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TicketStore for MemoryTicketStore {
    fn get(&self, id: &str) -> Option<KeyRotationTicket> {
        self.tickets.read().get(id).cloned()
    }

    fn put(&self, ticket: &KeyRotationTicket) {
        self.tickets
            .write()
            .insert(ticket.id.clone(), ticket.clone());
    }

    fn all(&self) -> Vec<KeyRotationTicket> {
        let mut tickets: Vec<_> = self.tickets.read().values().cloned().collect();
        tickets.sort_by_key(|t| t.started_at);
        tickets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ticket_starts_pending() {
        let ticket = KeyRotationTicket::new(
            RotationScope::MasterKey,
            "mk-0001".into(),
            "mk-0002".into(),
        );
        assert_eq!(ticket.status, RotationStatus::Pending);
        assert_eq!(ticket.checkpoint, 0);
        assert!(ticket.completed_at.is_none());
        assert!(!ticket.is_terminal());
    }

    #[test]
    fn store_round_trip() {
        let store = MemoryTicketStore::new();
        let mut ticket = KeyRotationTicket::new(
            RotationScope::DataKeys,
            "mk-0001".into(),
            "mk-0001".into(),
        );
        store.put(&ticket);

        ticket.status = RotationStatus::InProgress;
        ticket.checkpoint = 7;
        store.put(&ticket);

        let loaded = store.get(&ticket.id).unwrap();
        assert_eq!(loaded.checkpoint, 7);
        assert_eq!(loaded.status, RotationStatus::InProgress);
        assert!(store.get("nope").is_none());
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn ticket_serializes_camel_case() {
        let ticket = KeyRotationTicket::new(
            RotationScope::ApiKeys,
            "mk-0001".into(),
            "mk-0001".into(),
        );
        let json = serde_json::to_string(&ticket).unwrap();
        assert!(json.contains("\"oldKeyId\""));
        assert!(json.contains("\"startedAt\""));
        assert!(json.contains("API_KEYS"));
    }
}
