//! Master key lifecycle: configuration, lineage tracking, rotation staging.
//!
//! The manager is constructor-injected into every component that needs key
//! material; there is no ambient/static key state. Lineages are numbered
//! from 1 and rendered as key ids (`mk-0001`). Rotation forward-derives the
//! next master secret from the current one, so a rotation interrupted by a
//! crash can be re-staged deterministically and resumed.

use std::collections::HashMap;

use parking_lot::RwLock;
use zeroize::Zeroizing;

use crate::base64url::base64url_decode;
use crate::error::{ConfigError, CryptoError};
use crate::kdf::{derive_envelope_key, derive_purpose_key};
use crate::types::AES_KEY_LENGTH;

/// Environment variable holding the base64url-encoded 32-byte master secret.
pub const MASTER_KEY_ENV: &str = "INNKEEP_MASTER_KEY";

const MASTER_ROTATION_INFO: &str = "innkeep:master:v1:";
const KEK_INFO: &str = "innkeep:kek:v1:";
const KEYPAIR_INFO: &str = "innkeep:keypair:v1:";

/// Master secret source, resolved once at process start.
pub struct MasterKeyConfig {
    secret: Option<Zeroizing<[u8; AES_KEY_LENGTH]>>,
}

impl MasterKeyConfig {
    /// Read the master secret from [`MASTER_KEY_ENV`].
    ///
    /// An absent variable yields an ephemeral configuration; a present but
    /// malformed value is a hard [`ConfigError`].
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(MASTER_KEY_ENV) {
            Ok(value) => {
                let bytes = base64url_decode(&value)
                    .map_err(|e| ConfigError::InvalidMasterKeyEncoding(e.to_string()))?;
                Self::from_secret(&bytes)
            }
            Err(_) => Ok(Self::ephemeral()),
        }
    }

    /// Use an explicit 32-byte master secret.
    pub fn from_secret(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() != AES_KEY_LENGTH {
            return Err(ConfigError::InvalidMasterKeyLength {
                expected: AES_KEY_LENGTH,
                got: bytes.len(),
            });
        }
        let mut secret = Zeroizing::new([0u8; AES_KEY_LENGTH]);
        secret.copy_from_slice(bytes);
        Ok(Self {
            secret: Some(secret),
        })
    }

    /// No configured secret: the manager will generate one at init.
    /// Never a production configuration.
    pub fn ephemeral() -> Self {
        Self { secret: None }
    }
}

struct MasterKey {
    lineage: u32,
    id: String,
    secret: Zeroizing<[u8; AES_KEY_LENGTH]>,
}

impl MasterKey {
    fn new(lineage: u32, secret: Zeroizing<[u8; AES_KEY_LENGTH]>) -> Self {
        Self {
            lineage,
            id: key_id_for(lineage),
            secret,
        }
    }
}

fn key_id_for(lineage: u32) -> String {
    format!("mk-{:04}", lineage)
}

struct KeyState {
    current: MasterKey,
    /// New master during an in-progress rotation; readable but not yet
    /// authoritative.
    staged: Option<MasterKey>,
    /// Retired lineages, kept readable so old ciphertexts stay decryptable.
    retired: HashMap<u32, MasterKey>,
}

impl KeyState {
    fn secret_for_lineage(&self, lineage: u32) -> Option<Zeroizing<[u8; AES_KEY_LENGTH]>> {
        if self.current.lineage == lineage {
            return Some(self.current.secret.clone());
        }
        if let Some(staged) = &self.staged {
            if staged.lineage == lineage {
                return Some(staged.secret.clone());
            }
        }
        self.retired.get(&lineage).map(|k| k.secret.clone())
    }

    fn secret_for_id(&self, key_id: &str) -> Option<Zeroizing<[u8; AES_KEY_LENGTH]>> {
        if self.current.id == key_id {
            return Some(self.current.secret.clone());
        }
        if let Some(staged) = &self.staged {
            if staged.id == key_id {
                return Some(staged.secret.clone());
            }
        }
        self.retired
            .values()
            .find(|k| k.id == key_id)
            .map(|k| k.secret.clone())
    }

    fn lineage_for_id(&self, key_id: &str) -> Option<u32> {
        if self.current.id == key_id {
            return Some(self.current.lineage);
        }
        if let Some(staged) = &self.staged {
            if staged.id == key_id {
                return Some(staged.lineage);
            }
        }
        self.retired
            .values()
            .find(|k| k.id == key_id)
            .map(|k| k.lineage)
    }
}

/// Process-wide master key manager.
///
/// Lifecycle: [`KeyManager::new`] at startup, `stage_rotation` /
/// `promote_staged` driven by the rotation coordinator, zeroization of all
/// secrets on drop.
pub struct KeyManager {
    state: RwLock<KeyState>,
    ephemeral: bool,
}

impl KeyManager {
    /// Initialize from configuration.
    ///
    /// With no configured secret a random ephemeral master is generated and
    /// flagged: `is_ephemeral()` returns true and a warning is logged.
    /// Ciphertexts produced under an ephemeral master do not survive the
    /// process.
    pub fn new(config: MasterKeyConfig) -> Result<Self, ConfigError> {
        let (secret, ephemeral) = match config.secret {
            Some(secret) => (secret, false),
            None => {
                tracing::warn!(
                    "no master key configured; generated an ephemeral key, \
                     not a production configuration"
                );
                let mut secret = Zeroizing::new([0u8; AES_KEY_LENGTH]);
                getrandom::getrandom(secret.as_mut())
                    .map_err(|e| ConfigError::InvalidMasterKeyEncoding(e.to_string()))?;
                (secret, true)
            }
        };

        Ok(Self {
            state: RwLock::new(KeyState {
                current: MasterKey::new(1, secret),
                staged: None,
                retired: HashMap::new(),
            }),
            ephemeral,
        })
    }

    /// True when the master secret was generated at init instead of
    /// configured.
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Key id of the authoritative lineage.
    pub fn current_key_id(&self) -> String {
        self.state.read().current.id.clone()
    }

    /// Lineage number of the authoritative lineage.
    pub fn current_lineage(&self) -> u32 {
        self.state.read().current.lineage
    }

    /// Key id of the staged rotation target, if a rotation is in progress.
    pub fn staged_key_id(&self) -> Option<String> {
        self.state.read().staged.as_ref().map(|k| k.id.clone())
    }

    /// Lineage number for a known key id (current, staged, or retired).
    pub fn lineage_of(&self, key_id: &str) -> Option<u32> {
        self.state.read().lineage_for_id(key_id)
    }

    /// Derive a per-envelope data key from the current lineage.
    ///
    /// Returns the key and the key id to record in the envelope.
    pub fn derive_data_key(&self, salt: &[u8]) -> (Zeroizing<[u8; AES_KEY_LENGTH]>, String) {
        let state = self.state.read();
        (
            derive_envelope_key(state.current.secret.as_ref(), salt),
            state.current.id.clone(),
        )
    }

    /// Derive the data key for a specific `(key_id, salt)` pair.
    ///
    /// Resolves current, staged, and retired lineages (dual-read during and
    /// after rotation).
    pub fn derive_data_key_for(
        &self,
        key_id: &str,
        salt: &[u8],
    ) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, CryptoError> {
        let state = self.state.read();
        let secret = state
            .secret_for_id(key_id)
            .ok_or_else(|| CryptoError::UnknownKeyId(key_id.to_string()))?;
        Ok(derive_envelope_key(secret.as_ref(), salt))
    }

    /// Derive the DEK-wrapping KEK for a lineage.
    pub fn derive_kek(&self, lineage: u32) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, CryptoError> {
        let state = self.state.read();
        let secret = state
            .secret_for_lineage(lineage)
            .ok_or_else(|| CryptoError::UnknownKeyId(key_id_for(lineage)))?;
        derive_purpose_key(secret.as_ref(), &format!("{}{}", KEK_INFO, lineage))
    }

    /// Derive the private-key protection key for a lineage, by key id.
    pub fn derive_keypair_key(
        &self,
        key_id: &str,
    ) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, CryptoError> {
        let state = self.state.read();
        let lineage = state
            .lineage_for_id(key_id)
            .ok_or_else(|| CryptoError::UnknownKeyId(key_id.to_string()))?;
        let secret = state
            .secret_for_lineage(lineage)
            .ok_or_else(|| CryptoError::UnknownKeyId(key_id.to_string()))?;
        derive_purpose_key(secret.as_ref(), &format!("{}{}", KEYPAIR_INFO, lineage))
    }

    /// Stage the next master lineage for rotation.
    ///
    /// The new secret is forward-derived from the current one, so staging is
    /// idempotent: calling again while a rotation is staged returns the same
    /// `(old_key_id, new_key_id)` pair, which is what lets an interrupted
    /// rotation resume instead of restart.
    pub fn stage_rotation(&self) -> Result<(String, String), CryptoError> {
        let mut state = self.state.write();
        if let Some(staged) = &state.staged {
            return Ok((state.current.id.clone(), staged.id.clone()));
        }

        let max_retired = state.retired.keys().max().copied().unwrap_or(0);
        let next_lineage = state.current.lineage.max(max_retired) + 1;
        let next_secret = derive_purpose_key(
            state.current.secret.as_ref(),
            &format!("{}{}", MASTER_ROTATION_INFO, next_lineage),
        )?;

        let staged = MasterKey::new(next_lineage, next_secret);
        let pair = (state.current.id.clone(), staged.id.clone());
        state.staged = Some(staged);
        Ok(pair)
    }

    /// Flip the authoritative lineage to the staged key.
    ///
    /// The previous current lineage is retired, not deleted: envelopes and
    /// wrapped DEKs that still reference it remain decryptable.
    pub fn promote_staged(&self) -> Result<String, CryptoError> {
        let mut state = self.state.write();
        let staged = state.staged.take().ok_or(CryptoError::NoStagedRotation)?;
        let old = std::mem::replace(&mut state.current, staged);
        let new_id = state.current.id.clone();
        state.retired.insert(old.lineage, old);
        tracing::debug!(key_id = %new_id, "master key lineage promoted");
        Ok(new_id)
    }

    /// Abandon a staged rotation.
    pub fn discard_staged(&self) {
        self.state.write().staged = None;
    }
}
