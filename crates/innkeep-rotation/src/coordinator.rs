//! Key rotation coordinator.
//!
//! MASTER_KEY rotation: stage the next master lineage, re-wrap every piece
//! of persisted key material in checkpointed batches, and only then flip
//! the authoritative lineage. A failure at any point leaves both lineages
//! readable (dual-read) and a FAILED ticket that resumes from its
//! checkpoint rather than restarting, so nothing is double re-wrapped.

use std::sync::Arc;

use chrono::Utc;
use innkeep_audit::{AuditCategory, AuditLog, AuditSeverity};
use innkeep_crypto::{
    dek, envelope, random_hex, sha256_hex, CryptoError, KeyManager,
};
use serde_json::json;
use zeroize::Zeroizing;

use crate::error::RotationError;
use crate::store::{ApiKeyRecord, ApiKeyStore, KeyMaterial, KeyMaterialStore};
use crate::ticket::{KeyRotationTicket, RotationScope, RotationStatus, TicketStore};

/// Entries re-wrapped between ticket checkpoints.
pub const REWRAP_BATCH_SIZE: usize = 32;

/// Audit partition rotation events land in.
const AUDIT_PARTITION: &str = "security";

const ACTOR: &str = "rotation-coordinator";

pub struct RotationCoordinator {
    keys: Arc<KeyManager>,
    materials: Arc<dyn KeyMaterialStore>,
    api_keys: Arc<dyn ApiKeyStore>,
    tickets: Arc<dyn TicketStore>,
    audit: Arc<AuditLog>,
}

impl RotationCoordinator {
    pub fn new(
        keys: Arc<KeyManager>,
        materials: Arc<dyn KeyMaterialStore>,
        api_keys: Arc<dyn ApiKeyStore>,
        tickets: Arc<dyn TicketStore>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            keys,
            materials,
            api_keys,
            tickets,
            audit,
        }
    }

    /// Execute a rotation for the given scope.
    pub fn rotate(&self, scope: RotationScope) -> Result<KeyRotationTicket, RotationError> {
        match scope {
            RotationScope::MasterKey => self.run_master_rotation(None),
            RotationScope::DataKeys => self.run_data_key_rotation(),
            RotationScope::ApiKeys => self.run_api_key_rotation(),
        }
    }

    /// Resume a FAILED master-key rotation from its checkpoint.
    pub fn resume(&self, ticket_id: &str) -> Result<KeyRotationTicket, RotationError> {
        let ticket = self
            .tickets
            .get(ticket_id)
            .ok_or_else(|| RotationError::UnknownTicket(ticket_id.to_string()))?;
        match (ticket.scope, ticket.status) {
            (RotationScope::MasterKey, RotationStatus::Failed) => {
                self.run_master_rotation(Some(ticket))
            }
            _ => Err(RotationError::NotResumable {
                id: ticket.id,
                status: ticket.status,
            }),
        }
    }

    fn run_master_rotation(
        &self,
        resume: Option<KeyRotationTicket>,
    ) -> Result<KeyRotationTicket, RotationError> {
        // Staging is deterministic (forward-derived), so re-staging after a
        // failure reproduces the same target lineage the ticket names.
        let (old_key_id, new_key_id) = self.keys.stage_rotation()?;

        let mut ticket = match resume {
            Some(existing) => {
                if existing.new_key_id != new_key_id {
                    return Err(RotationError::NotResumable {
                        id: existing.id,
                        status: existing.status,
                    });
                }
                existing
            }
            None => {
                let ticket = KeyRotationTicket::new(
                    RotationScope::MasterKey,
                    old_key_id.clone(),
                    new_key_id.clone(),
                );
                self.tickets.put(&ticket);
                ticket
            }
        };
        ticket.status = RotationStatus::InProgress;
        ticket.error = None;
        self.tickets.put(&ticket);

        let new_lineage = self
            .keys
            .lineage_of(&new_key_id)
            .ok_or_else(|| CryptoError::UnknownKeyId(new_key_id.clone()))?;

        let ids = self.materials.ids();
        self.run_checkpointed(&mut ticket, &ids, |id| {
            self.rewrap_master_entry(id, &new_key_id, new_lineage)
        })?;

        // All re-wraps landed; only now does the pointer flip.
        let promoted = self.keys.promote_staged()?;
        ticket.status = RotationStatus::Completed;
        ticket.completed_at = Some(Utc::now());
        self.tickets.put(&ticket);

        self.audit.append(
            AUDIT_PARTITION,
            AuditCategory::Security,
            AuditSeverity::Info,
            ACTOR,
            "master-key",
            json!({
                "ticketId": ticket.id,
                "oldKeyId": ticket.old_key_id,
                "newKeyId": promoted,
                "rewrapped": ids.len(),
            }),
        )?;
        Ok(ticket)
    }

    fn rewrap_master_entry(
        &self,
        id: &str,
        new_key_id: &str,
        new_lineage: u32,
    ) -> Result<(), RotationError> {
        let Some(material) = self.materials.get(id) else {
            return Ok(());
        };
        match material {
            KeyMaterial::WrappedDek(bytes) => {
                self.rewrap_dek_entry(id, &bytes, new_lineage)?;
            }
            KeyMaterial::PrivateKey(sealed) => {
                if sealed.key_id == new_key_id {
                    return Ok(());
                }
                let old_key = self.keys.derive_keypair_key(&sealed.key_id)?;
                let der = Zeroizing::new(envelope::decrypt_with_dek(&sealed, old_key.as_ref())?);
                let new_key = self.keys.derive_keypair_key(new_key_id)?;
                let resealed = envelope::encrypt_with_dek(&der, new_key.as_ref(), new_key_id)?;
                self.materials.put(id, KeyMaterial::PrivateKey(resealed));
            }
        }
        Ok(())
    }

    fn rewrap_dek_entry(
        &self,
        id: &str,
        bytes: &[u8],
        new_lineage: u32,
    ) -> Result<(), RotationError> {
        let lineage = dek::peek_lineage(bytes)?;
        if lineage == new_lineage {
            return Ok(());
        }
        let old_kek = self.keys.derive_kek(lineage)?;
        let (raw_dek, _) = dek::unwrap_dek(bytes, old_kek.as_ref())?;
        let new_kek = self.keys.derive_kek(new_lineage)?;
        let rewrapped = dek::wrap_dek(raw_dek.as_ref(), new_kek.as_ref(), new_lineage)?;
        self.materials
            .put(id, KeyMaterial::WrappedDek(rewrapped.to_vec()));
        Ok(())
    }

    /// Consolidate stale-lineage DEKs onto the current master without
    /// replacing the master itself.
    fn run_data_key_rotation(&self) -> Result<KeyRotationTicket, RotationError> {
        let current_id = self.keys.current_key_id();
        let current_lineage = self.keys.current_lineage();

        let mut ticket = KeyRotationTicket::new(
            RotationScope::DataKeys,
            current_id.clone(),
            current_id.clone(),
        );
        ticket.status = RotationStatus::InProgress;
        self.tickets.put(&ticket);

        let ids = self.materials.ids();
        self.run_checkpointed(&mut ticket, &ids, |id| {
            match self.materials.get(id) {
                Some(KeyMaterial::WrappedDek(bytes)) => {
                    self.rewrap_dek_entry(id, &bytes, current_lineage)
                }
                // Private keys are only re-sealed by a master rotation.
                Some(KeyMaterial::PrivateKey(_)) | None => Ok(()),
            }
        })?;

        ticket.status = RotationStatus::Completed;
        ticket.completed_at = Some(Utc::now());
        self.tickets.put(&ticket);

        self.audit.append(
            AUDIT_PARTITION,
            AuditCategory::Security,
            AuditSeverity::Info,
            ACTOR,
            "data-keys",
            json!({ "ticketId": ticket.id, "keyId": current_id, "entries": ids.len() }),
        )?;
        Ok(ticket)
    }

    /// Issue fresh partner API keys, persisting only digests and hints.
    fn run_api_key_rotation(&self) -> Result<KeyRotationTicket, RotationError> {
        let current_id = self.keys.current_key_id();
        let mut ticket = KeyRotationTicket::new(
            RotationScope::ApiKeys,
            current_id.clone(),
            current_id,
        );
        ticket.status = RotationStatus::InProgress;
        self.tickets.put(&ticket);

        let ids = self.api_keys.ids();
        self.run_checkpointed(&mut ticket, &ids, |id| {
            let secret = format!("ik_{}", random_hex(24)?);
            let record = ApiKeyRecord {
                hash: sha256_hex(secret.as_bytes()),
                hint: format!("****{}", &secret[secret.len() - 4..]),
                rotated_at: Utc::now(),
            };
            self.api_keys.replace(id, record);
            Ok(())
        })?;

        ticket.status = RotationStatus::Completed;
        ticket.completed_at = Some(Utc::now());
        self.tickets.put(&ticket);

        self.audit.append(
            AUDIT_PARTITION,
            AuditCategory::Security,
            AuditSeverity::Info,
            ACTOR,
            "api-keys",
            json!({ "ticketId": ticket.id, "rotated": ids.len() }),
        )?;
        Ok(ticket)
    }

    fn run_checkpointed<F>(
        &self,
        ticket: &mut KeyRotationTicket,
        ids: &[String],
        rewrap: F,
    ) -> Result<(), RotationError>
    where
        F: Fn(&str) -> Result<(), RotationError>,
    {
        while ticket.checkpoint < ids.len() {
            let end = (ticket.checkpoint + REWRAP_BATCH_SIZE).min(ids.len());
            for id in &ids[ticket.checkpoint..end] {
                if let Err(error) = rewrap(id) {
                    ticket.status = RotationStatus::Failed;
                    ticket.error = Some(error.to_string());
                    self.tickets.put(ticket);
                    tracing::warn!(
                        ticket = %ticket.id,
                        entry = %id,
                        checkpoint = ticket.checkpoint,
                        "rotation failed; ticket checkpointed for resume"
                    );
                    return Err(error);
                }
            }
            ticket.checkpoint = end;
            self.tickets.put(ticket);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryApiKeyStore, MemoryKeyMaterialStore};
    use crate::ticket::MemoryTicketStore;
    use innkeep_audit::AuditStore;
    use innkeep_crypto::MasterKeyConfig;

    struct Fixture {
        keys: Arc<KeyManager>,
        materials: Arc<MemoryKeyMaterialStore>,
        api_keys: Arc<MemoryApiKeyStore>,
        tickets: Arc<MemoryTicketStore>,
        audit: Arc<AuditLog>,
        coordinator: RotationCoordinator,
    }

    fn fixture() -> Fixture {
        let keys = Arc::new(
            KeyManager::new(MasterKeyConfig::from_secret(&[8u8; 32]).unwrap()).unwrap(),
        );
        let materials = Arc::new(MemoryKeyMaterialStore::new());
        let api_keys = Arc::new(MemoryApiKeyStore::new());
        let tickets = Arc::new(MemoryTicketStore::new());
        let audit = Arc::new(AuditLog::in_memory());
        let coordinator = RotationCoordinator::new(
            keys.clone(),
            materials.clone(),
            api_keys.clone(),
            tickets.clone(),
            audit.clone(),
        );
        Fixture {
            keys,
            materials,
            api_keys,
            tickets,
            audit,
            coordinator,
        }
    }

    fn seed_dek(fixture: &Fixture, id: &str) -> Vec<u8> {
        let raw = dek::generate_dek().unwrap();
        let kek = fixture.keys.derive_kek(fixture.keys.current_lineage()).unwrap();
        let wrapped = dek::wrap_dek(raw.as_ref(), kek.as_ref(), fixture.keys.current_lineage())
            .unwrap();
        fixture
            .materials
            .put(id, KeyMaterial::WrappedDek(wrapped.to_vec()));
        raw.to_vec()
    }

    fn seed_private_key(fixture: &Fixture, id: &str, der: &[u8]) {
        let key_id = fixture.keys.current_key_id();
        let protection = fixture.keys.derive_keypair_key(&key_id).unwrap();
        let sealed = envelope::encrypt_with_dek(der, protection.as_ref(), &key_id).unwrap();
        fixture.materials.put(id, KeyMaterial::PrivateKey(sealed));
    }

    #[test]
    fn master_rotation_rewraps_everything_and_promotes() {
        let fixture = fixture();
        let dek_a = seed_dek(&fixture, "dek-a");
        let dek_b = seed_dek(&fixture, "dek-b");
        seed_private_key(&fixture, "keypair-1", b"pkcs8 der bytes");

        let ticket = fixture
            .coordinator
            .rotate(RotationScope::MasterKey)
            .unwrap();

        assert_eq!(ticket.status, RotationStatus::Completed);
        assert_eq!(ticket.old_key_id, "mk-0001");
        assert_eq!(ticket.new_key_id, "mk-0002");
        assert_eq!(ticket.checkpoint, 3);
        assert!(ticket.completed_at.is_some());
        assert_eq!(fixture.keys.current_key_id(), "mk-0002");

        // DEKs unwrap to the same raw keys under the new lineage.
        let new_kek = fixture.keys.derive_kek(2).unwrap();
        for (id, expected) in [("dek-a", dek_a), ("dek-b", dek_b)] {
            let Some(KeyMaterial::WrappedDek(bytes)) = fixture.materials.get(id) else {
                panic!("missing {}", id);
            };
            assert_eq!(dek::peek_lineage(&bytes).unwrap(), 2);
            let (raw, _) = dek::unwrap_dek(&bytes, new_kek.as_ref()).unwrap();
            assert_eq!(raw.as_slice(), expected.as_slice());
        }

        // Private key re-sealed under the new lineage.
        let Some(KeyMaterial::PrivateKey(sealed)) = fixture.materials.get("keypair-1") else {
            panic!("missing keypair");
        };
        assert_eq!(sealed.key_id, "mk-0002");
        let protection = fixture.keys.derive_keypair_key("mk-0002").unwrap();
        assert_eq!(
            envelope::decrypt_with_dek(&sealed, protection.as_ref()).unwrap(),
            b"pkcs8 der bytes"
        );

        // Rotation is itself audited.
        let records = fixture.audit.store().records("security").unwrap();
        let rotation = records.last().unwrap();
        assert_eq!(rotation.category, AuditCategory::Security);
        assert_eq!(rotation.target, "master-key");
        assert_eq!(rotation.details["newKeyId"], "mk-0002");
    }

    #[test]
    fn failed_rotation_checkpoints_and_resumes() {
        let fixture = fixture();
        let dek_a = seed_dek(&fixture, "dek-a");
        // Corrupt entry: lineage prefix 0 has no known master.
        fixture
            .materials
            .put("dek-b", KeyMaterial::WrappedDek(vec![0u8; 44]));
        let dek_c = seed_dek(&fixture, "dek-c");

        let error = fixture
            .coordinator
            .rotate(RotationScope::MasterKey)
            .unwrap_err();
        assert!(matches!(error, RotationError::Crypto(_)));

        let ticket = fixture.tickets.all().pop().unwrap();
        assert_eq!(ticket.status, RotationStatus::Failed);
        assert!(ticket.error.is_some());

        // Old lineage is still authoritative; nothing was promoted.
        assert_eq!(fixture.keys.current_key_id(), "mk-0001");
        assert_eq!(fixture.keys.staged_key_id().as_deref(), Some("mk-0002"));

        // Repair the bad entry, then resume from the checkpoint.
        let raw = dek::generate_dek().unwrap();
        let kek = fixture.keys.derive_kek(1).unwrap();
        let repaired = dek::wrap_dek(raw.as_ref(), kek.as_ref(), 1).unwrap();
        fixture
            .materials
            .put("dek-b", KeyMaterial::WrappedDek(repaired.to_vec()));

        let resumed = fixture.coordinator.resume(&ticket.id).unwrap();
        assert_eq!(resumed.id, ticket.id);
        assert_eq!(resumed.status, RotationStatus::Completed);
        assert_eq!(fixture.keys.current_key_id(), "mk-0002");

        // Every DEK, including ones re-wrapped before the failure, lands on
        // the new lineage exactly once.
        let new_kek = fixture.keys.derive_kek(2).unwrap();
        for (id, expected) in [("dek-a", dek_a), ("dek-c", dek_c)] {
            let Some(KeyMaterial::WrappedDek(bytes)) = fixture.materials.get(id) else {
                panic!("missing {}", id);
            };
            assert_eq!(dek::peek_lineage(&bytes).unwrap(), 2);
            let (unwrapped, _) = dek::unwrap_dek(&bytes, new_kek.as_ref()).unwrap();
            assert_eq!(unwrapped.as_slice(), expected.as_slice());
        }
    }

    #[test]
    fn resume_rejects_completed_tickets() {
        let fixture = fixture();
        seed_dek(&fixture, "dek-a");
        let ticket = fixture
            .coordinator
            .rotate(RotationScope::MasterKey)
            .unwrap();
        assert!(matches!(
            fixture.coordinator.resume(&ticket.id),
            Err(RotationError::NotResumable { .. })
        ));
        assert!(matches!(
            fixture.coordinator.resume("no-such-ticket"),
            Err(RotationError::UnknownTicket(_))
        ));
    }

    #[test]
    fn data_key_rotation_consolidates_stale_lineages() {
        let fixture = fixture();
        seed_dek(&fixture, "dek-a");
        fixture
            .coordinator
            .rotate(RotationScope::MasterKey)
            .unwrap();

        // A DEK still wrapped under the retired lineage.
        let raw = dek::generate_dek().unwrap();
        let old_kek = fixture.keys.derive_kek(1).unwrap();
        let stale = dek::wrap_dek(raw.as_ref(), old_kek.as_ref(), 1).unwrap();
        fixture
            .materials
            .put("dek-stale", KeyMaterial::WrappedDek(stale.to_vec()));

        let ticket = fixture.coordinator.rotate(RotationScope::DataKeys).unwrap();
        assert_eq!(ticket.status, RotationStatus::Completed);
        assert_eq!(ticket.old_key_id, ticket.new_key_id);
        assert_eq!(fixture.keys.current_key_id(), "mk-0002");

        let Some(KeyMaterial::WrappedDek(bytes)) = fixture.materials.get("dek-stale") else {
            panic!("missing dek-stale");
        };
        assert_eq!(dek::peek_lineage(&bytes).unwrap(), 2);
        let new_kek = fixture.keys.derive_kek(2).unwrap();
        let (unwrapped, _) = dek::unwrap_dek(&bytes, new_kek.as_ref()).unwrap();
        assert_eq!(unwrapped.as_slice(), raw.as_slice());
    }

    #[test]
    fn api_key_rotation_issues_fresh_digests() {
        let fixture = fixture();
        let stale = ApiKeyRecord {
            hash: "old-hash".into(),
            hint: "****old0".into(),
            rotated_at: Utc::now(),
        };
        fixture.api_keys.replace("partner-1", stale.clone());
        fixture.api_keys.replace("partner-2", stale.clone());

        let ticket = fixture.coordinator.rotate(RotationScope::ApiKeys).unwrap();
        assert_eq!(ticket.status, RotationStatus::Completed);
        assert_eq!(ticket.checkpoint, 2);

        for id in ["partner-1", "partner-2"] {
            let record = fixture.api_keys.get(id).unwrap();
            assert_ne!(record.hash, "old-hash");
            assert_eq!(record.hash.len(), 64);
            assert!(record.hint.starts_with("****"));
            assert_eq!(record.hint.len(), 8);
        }

        let records = fixture.audit.store().records("security").unwrap();
        assert_eq!(records.last().unwrap().target, "api-keys");
    }

    #[test]
    fn rotation_with_no_material_still_promotes() {
        let fixture = fixture();
        let ticket = fixture
            .coordinator
            .rotate(RotationScope::MasterKey)
            .unwrap();
        assert_eq!(ticket.status, RotationStatus::Completed);
        assert_eq!(ticket.checkpoint, 0);
        assert_eq!(fixture.keys.current_key_id(), "mk-0002");
    }
}
