//! Field-level encryption over collaborator-owned JSON records.
//!
//! Which entity has which sensitive fields is external configuration
//! ([`FieldRegistry`]), not engine logic: new entities onboard without code
//! changes here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use innkeep_crypto::{envelope, CryptoError, EncryptedEnvelope, KeyManager};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VaultError;

/// Entity name → sensitive field names. Loaded from collaborator
/// configuration (it deserializes from a plain JSON object).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldRegistry {
    entities: HashMap<String, Vec<String>>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entity: impl Into<String>, fields: Vec<String>) {
        self.entities.insert(entity.into(), fields);
    }

    pub fn fields_for(&self, entity: &str) -> &[String] {
        self.entities.get(entity).map_or(&[], Vec::as_slice)
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}

/// Applies the envelope engine to named fields of arbitrary records.
pub struct FieldCipher {
    keys: Arc<KeyManager>,
    legacy_passthroughs: AtomicU64,
}

impl FieldCipher {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self {
            keys,
            legacy_passthroughs: AtomicU64::new(0),
        }
    }

    /// Replace each named present field with its envelope's JSON form.
    ///
    /// Values are JSON-stringified before encryption so non-string types
    /// round-trip. Null and absent fields are skipped; fields that already
    /// hold an envelope are not double-encrypted.
    pub fn encrypt_fields(&self, record: &Value, fields: &[String]) -> Result<Value, VaultError> {
        let mut out = record
            .as_object()
            .ok_or(VaultError::NotAnObject)?
            .clone();

        for name in fields {
            let Some(value) = out.get(name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            if let Value::String(s) = value {
                if EncryptedEnvelope::from_json(s).is_ok() {
                    continue;
                }
            }
            let plaintext = serde_json::to_string(value).unwrap();
            let sealed = envelope::encrypt(plaintext.as_bytes(), &self.keys)?;
            out.insert(name.clone(), Value::String(sealed.to_json()));
        }

        Ok(Value::Object(out))
    }

    /// Inverse of [`encrypt_fields`](Self::encrypt_fields). Infallible:
    /// fields that fail to parse or decrypt take the legacy-plaintext
    /// fallback and pass through unchanged.
    pub fn decrypt_fields(&self, record: &Value, fields: &[String]) -> Value {
        let Some(obj) = record.as_object() else {
            return record.clone();
        };
        let mut out = obj.clone();

        for name in fields {
            let Some(Value::String(stored)) = out.get(name) else {
                continue;
            };
            match self.try_decrypt(stored) {
                Ok(value) => {
                    out.insert(name.clone(), value);
                }
                Err(_) => self.legacy_plaintext_fallback(name),
            }
        }

        Value::Object(out)
    }

    fn try_decrypt(&self, stored: &str) -> Result<Value, VaultError> {
        let sealed = EncryptedEnvelope::from_json(stored)?;
        let plaintext = envelope::decrypt(&sealed, &self.keys)?;
        let text = String::from_utf8(plaintext).map_err(|_| CryptoError::Decryption)?;
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    /// The deliberate migration-safety path: rows written before an entity
    /// was onboarded hold plaintext, and must read back unchanged. Counted
    /// so real corruption does not hide behind it.
    fn legacy_plaintext_fallback(&self, field: &str) {
        self.legacy_passthroughs.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(field = %field, "field not decryptable; passing through as legacy plaintext");
    }

    /// Number of fields that have taken the legacy-plaintext fallback.
    pub fn legacy_passthroughs(&self) -> u64 {
        self.legacy_passthroughs.load(Ordering::Relaxed)
    }
}
