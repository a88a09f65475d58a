//! Key derivation: slow PBKDF2 for per-envelope keys, HKDF-SHA256 for
//! purpose-scoped subkeys.

use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::types::{AES_KEY_LENGTH, PBKDF2_ITERATIONS};

const HKDF_SALT: &[u8] = b"innkeep:kdf-salt:v1";

/// Derive a per-envelope data key from the master secret and a salt.
///
/// PBKDF2-HMAC-SHA256 with [`PBKDF2_ITERATIONS`] rounds and a 32-byte
/// output. Deterministic in `(secret, salt)`; the salt is stored in the
/// envelope so decryption can re-derive the same key.
pub fn derive_envelope_key(secret: &[u8], salt: &[u8]) -> Zeroizing<[u8; AES_KEY_LENGTH]> {
    let mut okm = Zeroizing::new([0u8; AES_KEY_LENGTH]);
    pbkdf2_hmac::<Sha256>(secret, salt, PBKDF2_ITERATIONS, okm.as_mut());
    okm
}

/// Derive a purpose-scoped subkey from the master secret using HKDF-SHA256.
///
/// `info` is the domain-separation string (e.g. `innkeep:kek:v1:3`).
/// Distinct infos yield independent keys from the same secret.
pub fn derive_purpose_key(
    secret: &[u8],
    info: &str,
) -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, CryptoError> {
    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), secret);
    let mut okm = Zeroizing::new([0u8; AES_KEY_LENGTH]);
    hk.expand(info.as_bytes(), okm.as_mut())
        .map_err(|_| CryptoError::Derivation)?;
    Ok(okm)
}
