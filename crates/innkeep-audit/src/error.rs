use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit store failure: {0}")]
    Store(String),

    /// Reported, never auto-repaired: repair is an administrative action
    /// that must itself be audited.
    #[error("audit chain for partition {partition:?} fails verification at position {position}")]
    ChainIntegrity { partition: String, position: u64 },

    #[error("canonical serialization: non-finite number is not representable")]
    NonFiniteNumber,
}
