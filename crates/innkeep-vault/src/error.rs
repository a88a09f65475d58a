use innkeep_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("record is not a JSON object")]
    NotAnObject,
}
