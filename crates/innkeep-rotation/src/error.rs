use innkeep_audit::AuditError;
use innkeep_crypto::CryptoError;
use thiserror::Error;

use crate::ticket::RotationStatus;

#[derive(Debug, Error)]
pub enum RotationError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("unknown rotation ticket: {0}")]
    UnknownTicket(String),

    #[error("ticket {id} cannot be resumed from status {status:?}")]
    NotResumable { id: String, status: RotationStatus },
}
