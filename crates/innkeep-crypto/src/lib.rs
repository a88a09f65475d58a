pub mod asymmetric;
pub mod base64url;
pub mod dek;
pub mod envelope;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod keys;
pub mod password;
pub mod random;
pub mod types;

pub use asymmetric::{
    decrypt_with_private_key, encrypt_with_public_key, generate_keypair, sign, verify, KeyPair,
};
pub use base64url::{base64url_decode, base64url_encode};
pub use dek::{generate_dek, peek_lineage, unwrap_dek, wrap_dek, WRAPPED_DEK_SIZE};
pub use envelope::{
    decrypt, decrypt_with_dek, encrypt, encrypt_with_dek, EncryptedEnvelope, EnvelopeMethod,
};
pub use error::{ConfigError, CryptoError};
pub use hash::{hmac_sha256, hmac_verify, sha256, sha256_hex, sha512, sha512_hex};
pub use kdf::{derive_envelope_key, derive_purpose_key};
pub use keys::{KeyManager, MasterKeyConfig, MASTER_KEY_ENV};
pub use password::{
    check_strength, hash_password, verify_password, PasswordStrength, MAX_PASSWORD_LENGTH,
    MIN_PASSWORD_LENGTH,
};
pub use random::{random_bytes, random_hex, random_key, random_uuid, timing_safe_eq, to_hex};
pub use types::{
    AES_GCM_IV_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH, ENVELOPE_SALT_LENGTH,
    PBKDF2_ITERATIONS, RSA_KEY_BITS,
};
