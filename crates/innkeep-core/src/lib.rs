//! Facade wiring the security core for its collaborators.
//!
//! The persistence, configuration, and logging collaborators interact with
//! the subsystem only through [`SecurityCore`]: field encryption at the
//! read/write boundary, tokenization, audit appends and verification,
//! compliance reporting, and key rotation.

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;

use innkeep_audit::{
    AuditCategory, AuditError, AuditLog, AuditRecord, AuditSeverity, AuditStore,
    ChainVerification, ComplianceReport, MemoryAuditStore, ReportFilters, ReportRange,
};
use innkeep_crypto::{ConfigError, CryptoError, KeyManager, MasterKeyConfig};
use innkeep_rotation::{
    ApiKeyStore, KeyMaterialStore, KeyRotationTicket, MemoryApiKeyStore,
    MemoryKeyMaterialStore, MemoryTicketStore, RotationCoordinator, RotationError,
    RotationScope, TicketStore,
};
use innkeep_vault::{
    FieldCipher, FieldRegistry, InMemoryTokenStore, Token, TokenStore, TokenVault, VaultError,
};

/// Audit partition for the subsystem's own security events.
pub const SECURITY_PARTITION: &str = "security";

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Rotation(#[from] RotationError),
}

/// Startup configuration: the master secret source and the per-entity
/// sensitive-field registry.
pub struct CoreConfig {
    pub master: MasterKeyConfig,
    pub registry: FieldRegistry,
}

impl CoreConfig {
    /// Master secret from the environment, empty field registry.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            master: MasterKeyConfig::from_env()?,
            registry: FieldRegistry::new(),
        })
    }
}

/// Store handles supplied by the persistence collaborator.
pub struct CoreStores {
    pub audit: Arc<dyn AuditStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub key_material: Arc<dyn KeyMaterialStore>,
    pub api_keys: Arc<dyn ApiKeyStore>,
    pub tickets: Arc<dyn TicketStore>,
}

impl CoreStores {
    /// All-in-memory stores, for tests and single-process use.
    pub fn in_memory() -> Self {
        Self {
            audit: Arc::new(MemoryAuditStore::new()),
            tokens: Arc::new(InMemoryTokenStore::new()),
            key_material: Arc::new(MemoryKeyMaterialStore::new()),
            api_keys: Arc::new(MemoryApiKeyStore::new()),
            tickets: Arc::new(MemoryTicketStore::new()),
        }
    }
}

pub struct SecurityCore {
    keys: Arc<KeyManager>,
    registry: FieldRegistry,
    fields: FieldCipher,
    tokens: TokenVault,
    audit: Arc<AuditLog>,
    rotation: RotationCoordinator,
}

impl SecurityCore {
    /// Initialize with in-memory stores.
    pub fn init(config: CoreConfig) -> Result<Self, CoreError> {
        Self::init_with_stores(config, CoreStores::in_memory())
    }

    /// Initialize against collaborator-supplied stores.
    ///
    /// An ephemeral master key (no configured secret) is loud: it appends a
    /// WARNING-severity SECURITY audit record at init.
    pub fn init_with_stores(config: CoreConfig, stores: CoreStores) -> Result<Self, CoreError> {
        let keys = Arc::new(KeyManager::new(config.master)?);
        let audit = Arc::new(AuditLog::new(stores.audit));

        if keys.is_ephemeral() {
            audit.append(
                SECURITY_PARTITION,
                AuditCategory::Security,
                AuditSeverity::Warning,
                "key-manager",
                "master-key",
                json!({
                    "message": "master key generated ephemerally; not a production configuration",
                }),
            )?;
        }

        let fields = FieldCipher::new(keys.clone());
        let tokens = TokenVault::new(keys.clone(), stores.tokens);
        let rotation = RotationCoordinator::new(
            keys.clone(),
            stores.key_material,
            stores.api_keys,
            stores.tickets,
            audit.clone(),
        );

        Ok(Self {
            keys,
            registry: config.registry,
            fields,
            tokens,
            audit,
            rotation,
        })
    }

    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Encrypt an entity's registered sensitive fields before persistence.
    pub fn encrypt_entity(&self, entity: &str, record: &Value) -> Result<Value, CoreError> {
        Ok(self
            .fields
            .encrypt_fields(record, self.registry.fields_for(entity))?)
    }

    /// Decrypt an entity's registered fields after a read. Legacy plaintext
    /// passes through unchanged (and is counted).
    pub fn decrypt_entity(&self, entity: &str, record: &Value) -> Value {
        self.fields
            .decrypt_fields(record, self.registry.fields_for(entity))
    }

    /// Fields that have taken the legacy-plaintext fallback so far.
    pub fn legacy_passthroughs(&self) -> u64 {
        self.fields.legacy_passthroughs()
    }

    pub fn tokenize(&self, value: &str) -> Result<Token, CoreError> {
        Ok(self.tokens.tokenize(value)?)
    }

    pub fn detokenize(&self, token: &str) -> Result<Option<String>, CoreError> {
        Ok(self.tokens.detokenize(token)?)
    }

    pub fn delete_token(&self, token: &str) -> bool {
        self.tokens.delete(token)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn append_audit(
        &self,
        partition: &str,
        category: AuditCategory,
        severity: AuditSeverity,
        actor: &str,
        target: &str,
        details: Value,
    ) -> Result<AuditRecord, CoreError> {
        Ok(self
            .audit
            .append(partition, category, severity, actor, target, details)?)
    }

    pub fn verify_chain(&self, partition: &str) -> Result<ChainVerification, CoreError> {
        Ok(self.audit.verify_chain(partition)?)
    }

    pub fn compliance_report(
        &self,
        range: ReportRange,
        filters: &ReportFilters,
    ) -> Result<ComplianceReport, CoreError> {
        Ok(self.audit.generate_compliance_report(range, filters)?)
    }

    pub fn rotate(&self, scope: RotationScope) -> Result<KeyRotationTicket, CoreError> {
        Ok(self.rotation.rotate(scope)?)
    }

    pub fn resume_rotation(&self, ticket_id: &str) -> Result<KeyRotationTicket, CoreError> {
        Ok(self.rotation.resume(ticket_id)?)
    }
}
