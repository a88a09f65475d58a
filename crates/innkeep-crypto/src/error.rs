use thiserror::Error;

/// Startup-time configuration failures. Not recoverable per-call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("master key must be {expected} bytes, got {got}")]
    InvalidMasterKeyLength { expected: usize, got: usize },

    #[error("master key is not valid base64url: {0}")]
    InvalidMasterKeyEncoding(String),
}

/// Per-call cryptographic failures.
///
/// Operation variants (`Encryption`, `Decryption`, `AsymmetricOperation`)
/// carry no detail on purpose: their messages cross trust boundaries and
/// must not reveal which step failed.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected} bytes, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("invalid DEK length: expected {expected} bytes, got {got}")]
    InvalidDekLength { expected: usize, got: usize },

    #[error("invalid wrapped DEK length: expected {expected} bytes, got {got}")]
    InvalidWrappedDekLength { expected: usize, got: usize },

    #[error("encrypted data too short")]
    DataTooShort,

    #[error("unsupported encryption method")]
    UnsupportedMethod,

    #[error("unknown key id: {0}")]
    UnknownKeyId(String),

    #[error("encryption failed")]
    Encryption,

    #[error("decryption failed")]
    Decryption,

    #[error("key wrap failed")]
    Wrap,

    #[error("key unwrap failed")]
    Unwrap,

    #[error("asymmetric operation failed")]
    AsymmetricOperation,

    #[error("key derivation failed")]
    Derivation,

    #[error("malformed password hash")]
    MalformedPasswordHash,

    #[error("password length must be between {min} and {max} characters")]
    PasswordLength { min: usize, max: usize },

    #[error("password hashing failed")]
    PasswordHash,

    #[error("envelope serialization failed: {0}")]
    Serialization(String),

    #[error("a master key rotation is already staged")]
    RotationAlreadyStaged,

    #[error("no master key rotation is staged")]
    NoStagedRotation,

    #[error("random number generation failed: {0}")]
    Rng(String),
}
