//! AES-256-GCM self-describing envelopes for field-level ciphertext.
//!
//! Envelope JSON (camelCase, as embedded in collaborator-owned records):
//! `{method, ciphertext, iv, salt, authTag, keyId, encryptedAt}` with all
//! byte fields base64url-encoded. An envelope decrypts only with the exact
//! `(salt, keyId)` pair that produced its key; tag verification happens
//! before any plaintext is returned.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::base64url::{base64url_decode, base64url_encode};
use crate::error::CryptoError;
use crate::keys::KeyManager;
use crate::random::random_bytes;
use crate::types::{
    AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH, ENVELOPE_SALT_LENGTH,
};

/// Cipher identifier stored in the envelope.
///
/// Unrecognized method strings deserialize to `Unknown`, which every
/// decryption path rejects with [`CryptoError::UnsupportedMethod`]: an
/// envelope is never silently processed under a different cipher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopeMethod {
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    #[serde(other, rename = "unknown")]
    Unknown,
}

/// The unit of ciphertext at rest and in transit. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEnvelope {
    pub method: EnvelopeMethod,
    pub ciphertext: String,
    pub iv: String,
    /// Key-derivation salt; empty for envelopes encrypted under a caller
    /// -supplied DEK.
    pub salt: String,
    pub auth_tag: String,
    /// Master-key lineage that produced (or protects) the data key.
    pub key_id: String,
    pub encrypted_at: DateTime<Utc>,
}

impl EncryptedEnvelope {
    /// Serialize for storage inside a record field.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }

    /// Parse a stored field value back into an envelope.
    pub fn from_json(s: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(s).map_err(|e| CryptoError::Serialization(e.to_string()))
    }
}

/// Generate a fresh random 96-bit IV.
///
/// Called inside every encryption, never cached: IV reuse under the same
/// key breaks GCM, so the construction makes reuse unrepresentable.
fn generate_iv() -> Result<[u8; AES_GCM_IV_LENGTH], CryptoError> {
    let mut iv = [0u8; AES_GCM_IV_LENGTH];
    getrandom::getrandom(&mut iv).map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(iv)
}

fn encrypt_raw(
    plaintext: &[u8],
    key: &[u8],
    salt: String,
    key_id: String,
) -> Result<EncryptedEnvelope, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Encryption)?;
    let iv = generate_iv()?;
    let mut combined = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| CryptoError::Encryption)?;

    // The aead output is ciphertext || tag; the envelope stores them apart.
    let tag = combined.split_off(combined.len() - AES_GCM_TAG_LENGTH);

    Ok(EncryptedEnvelope {
        method: EnvelopeMethod::Aes256Gcm,
        ciphertext: base64url_encode(&combined),
        iv: base64url_encode(&iv),
        salt,
        auth_tag: base64url_encode(&tag),
        key_id,
        encrypted_at: Utc::now(),
    })
}

fn decrypt_raw(envelope: &EncryptedEnvelope, key: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let iv = base64url_decode(&envelope.iv).map_err(|_| CryptoError::Decryption)?;
    if iv.len() != AES_GCM_IV_LENGTH {
        return Err(CryptoError::Decryption);
    }
    let mut combined =
        base64url_decode(&envelope.ciphertext).map_err(|_| CryptoError::Decryption)?;
    let tag = base64url_decode(&envelope.auth_tag).map_err(|_| CryptoError::Decryption)?;
    if tag.len() != AES_GCM_TAG_LENGTH {
        return Err(CryptoError::Decryption);
    }
    combined.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Decryption)?;
    cipher
        .decrypt(Nonce::from_slice(&iv), combined.as_ref())
        .map_err(|_| CryptoError::Decryption)
}

fn ensure_supported(envelope: &EncryptedEnvelope) -> Result<(), CryptoError> {
    match envelope.method {
        EnvelopeMethod::Aes256Gcm => Ok(()),
        EnvelopeMethod::Unknown => Err(CryptoError::UnsupportedMethod),
    }
}

/// Encrypt under a key derived from the master secret and a fresh salt.
pub fn encrypt(plaintext: &[u8], keys: &KeyManager) -> Result<EncryptedEnvelope, CryptoError> {
    let salt = random_bytes(ENVELOPE_SALT_LENGTH)?;
    let (key, key_id) = keys.derive_data_key(&salt);
    encrypt_raw(plaintext, key.as_ref(), base64url_encode(&salt), key_id)
}

/// Encrypt under a caller-supplied DEK. `key_id` records the lineage that
/// protects the DEK's wrapped form.
pub fn encrypt_with_dek(
    plaintext: &[u8],
    dek: &[u8],
    key_id: &str,
) -> Result<EncryptedEnvelope, CryptoError> {
    if dek.len() != AES_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: AES_KEY_LENGTH,
            got: dek.len(),
        });
    }
    encrypt_raw(plaintext, dek, String::new(), key_id.to_string())
}

/// Decrypt an envelope by re-deriving its key from `(key_id, salt)`.
pub fn decrypt(envelope: &EncryptedEnvelope, keys: &KeyManager) -> Result<Vec<u8>, CryptoError> {
    ensure_supported(envelope)?;
    let salt = base64url_decode(&envelope.salt).map_err(|_| CryptoError::Decryption)?;
    let key = keys.derive_data_key_for(&envelope.key_id, &salt)?;
    decrypt_raw(envelope, key.as_ref())
}

/// Decrypt an envelope under a caller-supplied DEK.
pub fn decrypt_with_dek(envelope: &EncryptedEnvelope, dek: &[u8]) -> Result<Vec<u8>, CryptoError> {
    ensure_supported(envelope)?;
    if dek.len() != AES_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            expected: AES_KEY_LENGTH,
            got: dek.len(),
        });
    }
    decrypt_raw(envelope, dek)
}
