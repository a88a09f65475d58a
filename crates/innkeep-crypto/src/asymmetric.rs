//! RSA-2048 confidentiality and signing.
//!
//! Algorithms are fixed at compile time: OAEP-SHA256 for encryption,
//! PSS-SHA256 for signatures. Nothing is negotiated at call time, so there
//! is no downgrade surface. The private key is held only as PKCS#8 DER
//! encrypted under a key derived from the master secret.
//!
//! Every RSA failure is collapsed into the single opaque
//! [`CryptoError::AsymmetricOperation`]: callers across a trust boundary
//! cannot learn whether a key was malformed or padding failed to verify.

use rand::rngs::OsRng;
use rsa::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding,
};
use rsa::pss::{BlindedSigningKey, Signature, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::envelope::{decrypt_with_dek, encrypt_with_dek, EncryptedEnvelope};
use crate::error::CryptoError;
use crate::keys::KeyManager;
use crate::types::RSA_KEY_BITS;

/// A generated key pair. The public half is plain PEM; the private half is
/// an envelope whose `key_id` names the master lineage protecting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    pub public_key_pem: String,
    pub private_key: EncryptedEnvelope,
}

/// Generate an RSA-2048 key pair, sealing the private key under the
/// current master lineage.
pub fn generate_keypair(keys: &KeyManager) -> Result<KeyPair, CryptoError> {
    let mut rng = OsRng;
    let private = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
        .map_err(|_| CryptoError::AsymmetricOperation)?;
    let public = RsaPublicKey::from(&private);

    let public_key_pem = public
        .to_public_key_pem(LineEnding::LF)
        .map_err(|_| CryptoError::AsymmetricOperation)?;

    let key_id = keys.current_key_id();
    let protection = keys.derive_keypair_key(&key_id)?;
    let der = private
        .to_pkcs8_der()
        .map_err(|_| CryptoError::AsymmetricOperation)?;
    let private_key = encrypt_with_dek(der.as_bytes(), protection.as_ref(), &key_id)?;

    Ok(KeyPair {
        public_key_pem,
        private_key,
    })
}

fn load_private(pair: &KeyPair, keys: &KeyManager) -> Result<RsaPrivateKey, CryptoError> {
    let protection = keys.derive_keypair_key(&pair.private_key.key_id)?;
    let der = Zeroizing::new(decrypt_with_dek(&pair.private_key, protection.as_ref())?);
    RsaPrivateKey::from_pkcs8_der(&der).map_err(|_| CryptoError::AsymmetricOperation)
}

/// Encrypt a short payload (≤ 190 bytes at 2048/SHA-256) to a public key.
pub fn encrypt_with_public_key(
    public_key_pem: &str,
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|_| CryptoError::AsymmetricOperation)?;
    let mut rng = OsRng;
    key.encrypt(&mut rng, Oaep::new::<Sha256>(), plaintext)
        .map_err(|_| CryptoError::AsymmetricOperation)
}

/// Decrypt an OAEP ciphertext with the pair's sealed private key.
pub fn decrypt_with_private_key(
    pair: &KeyPair,
    keys: &KeyManager,
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let private = load_private(pair, keys)?;
    private
        .decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map_err(|_| CryptoError::AsymmetricOperation)
}

/// Sign a message with PSS-SHA256.
pub fn sign(pair: &KeyPair, keys: &KeyManager, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let private = load_private(pair, keys)?;
    let signing_key = BlindedSigningKey::<Sha256>::new(private);
    let mut rng = OsRng;
    let signature = signing_key.sign_with_rng(&mut rng, message);
    Ok(signature.to_vec())
}

/// Verify a PSS-SHA256 signature.
///
/// Returns false for malformed keys or signatures, never errors.
pub fn verify(public_key_pem: &str, message: &[u8], signature: &[u8]) -> bool {
    (|| -> Result<bool, CryptoError> {
        let key = RsaPublicKey::from_public_key_pem(public_key_pem)
            .map_err(|_| CryptoError::AsymmetricOperation)?;
        let verifying_key = VerifyingKey::<Sha256>::new(key);
        let signature =
            Signature::try_from(signature).map_err(|_| CryptoError::AsymmetricOperation)?;
        Ok(verifying_key.verify(message, &signature).is_ok())
    })()
    .unwrap_or(false)
}
