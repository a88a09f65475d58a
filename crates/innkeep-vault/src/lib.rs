pub mod error;
pub mod fields;
pub mod store;
pub mod tokens;

pub use error::VaultError;
pub use fields::{FieldCipher, FieldRegistry};
pub use store::{InMemoryTokenStore, TokenStore};
pub use tokens::{mask_hint, Token, TokenVault, TOKEN_PREFIX};
