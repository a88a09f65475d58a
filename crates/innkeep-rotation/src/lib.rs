pub mod coordinator;
pub mod error;
pub mod store;
pub mod ticket;

pub use coordinator::{RotationCoordinator, REWRAP_BATCH_SIZE};
pub use error::RotationError;
pub use store::{
    ApiKeyRecord, ApiKeyStore, KeyMaterial, KeyMaterialStore, MemoryApiKeyStore,
    MemoryKeyMaterialStore,
};
pub use ticket::{
    KeyRotationTicket, MemoryTicketStore, RotationScope, RotationStatus, TicketStore,
};
