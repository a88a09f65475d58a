//! Tokenization: replace a sensitive value with an opaque reference plus a
//! non-reversible display hint.

use std::sync::Arc;

use innkeep_crypto::{envelope, random_hex, CryptoError, KeyManager};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::store::{InMemoryTokenStore, TokenStore};

/// Prefix of every issued token.
pub const TOKEN_PREFIX: &str = "tok_";

/// Random bytes behind each token id (rendered as 32 hex chars).
const TOKEN_ID_BYTES: usize = 16;

/// Characters of the original value the hint may disclose.
const HINT_VISIBLE_CHARS: usize = 4;

/// An issued token. Neither field encodes recoverable information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
    pub hint: String,
}

/// Masked display hint: at most the last [`HINT_VISIBLE_CHARS`] characters.
/// Values that short are masked entirely.
pub fn mask_hint(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= HINT_VISIBLE_CHARS {
        return "****".to_string();
    }
    let suffix: String = chars[chars.len() - HINT_VISIBLE_CHARS..].iter().collect();
    format!("****{}", suffix)
}

/// Vault mapping opaque tokens to encrypted originals.
pub struct TokenVault {
    keys: Arc<KeyManager>,
    store: Arc<dyn TokenStore>,
}

impl TokenVault {
    pub fn new(keys: Arc<KeyManager>, store: Arc<dyn TokenStore>) -> Self {
        Self { keys, store }
    }

    pub fn in_memory(keys: Arc<KeyManager>) -> Self {
        Self::new(keys, Arc::new(InMemoryTokenStore::new()))
    }

    /// Encrypt `value` and file it under a freshly generated token.
    pub fn tokenize(&self, value: &str) -> Result<Token, VaultError> {
        let sealed = envelope::encrypt(value.as_bytes(), &self.keys)?;
        let token = format!("{}{}", TOKEN_PREFIX, random_hex(TOKEN_ID_BYTES)?);
        self.store.put(&token, sealed);
        tracing::debug!(hint = %mask_hint(value), "value tokenized");
        Ok(Token {
            token,
            hint: mask_hint(value),
        })
    }

    /// Resolve a token back to its original value.
    ///
    /// Unknown and malformed tokens both return `Ok(None)`; callers cannot
    /// distinguish "never issued" from "not found". A corrupted stored
    /// envelope surfaces its decryption error.
    pub fn detokenize(&self, token: &str) -> Result<Option<String>, VaultError> {
        let Some(sealed) = self.store.get(token) else {
            return Ok(None);
        };
        let plaintext = envelope::decrypt(&sealed, &self.keys)?;
        let value = String::from_utf8(plaintext).map_err(|_| CryptoError::Decryption)?;
        Ok(Some(value))
    }

    /// Drop a token's mapping. Returns whether anything was removed.
    pub fn delete(&self, token: &str) -> bool {
        self.store.delete(token)
    }

    /// The underlying store, for rotation and administrative access.
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }
}
