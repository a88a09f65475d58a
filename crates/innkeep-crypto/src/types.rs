/// AES-GCM IV length in bytes (96 bits per NIST recommendation).
pub const AES_GCM_IV_LENGTH: usize = 12;

/// AES-GCM tag length in bytes (128 bits).
pub const AES_GCM_TAG_LENGTH: usize = 16;

/// AES key length in bytes (256 bits).
pub const AES_KEY_LENGTH: usize = 32;

/// Salt length for per-envelope key derivation.
pub const ENVELOPE_SALT_LENGTH: usize = 16;

/// PBKDF2-HMAC-SHA256 iteration count for envelope key derivation.
///
/// Fixed: changing it invalidates every envelope derived under the old
/// count. A new count requires a new master-key lineage.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// RSA modulus size in bits for generated key pairs.
pub const RSA_KEY_BITS: usize = 2048;
