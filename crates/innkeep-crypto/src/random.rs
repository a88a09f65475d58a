//! Secure randomness and timing-safe comparison.

use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::CryptoError;

/// Fill a new buffer of `len` bytes from the OS CSPRNG.
pub fn random_bytes(len: usize) -> Result<Vec<u8>, CryptoError> {
    let mut buf = vec![0u8; len];
    getrandom::getrandom(&mut buf).map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(buf)
}

/// Generate a random 32-byte key.
pub fn random_key() -> Result<[u8; 32], CryptoError> {
    let mut key = [0u8; 32];
    getrandom::getrandom(&mut key).map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(key)
}

/// Generate `len` random bytes rendered as lowercase hex (2·len chars).
pub fn random_hex(len: usize) -> Result<String, CryptoError> {
    Ok(to_hex(&random_bytes(len)?))
}

/// Random v4 UUID for record and ticket identifiers.
pub fn random_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Lowercase hex rendering of a byte slice.
pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Constant-time equality for byte slices.
///
/// Slices of unequal length compare unequal without early exit on content.
pub fn timing_safe_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_length() {
        assert_eq!(random_bytes(16).unwrap().len(), 16);
        assert_eq!(random_bytes(0).unwrap().len(), 0);
    }

    #[test]
    fn random_bytes_unique() {
        let a = random_bytes(32).unwrap();
        let b = random_bytes(32).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn random_hex_shape() {
        let s = random_hex(16).unwrap();
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn to_hex_known_value() {
        assert_eq!(to_hex(&[0x00, 0xff, 0x10]), "00ff10");
    }

    #[test]
    fn uuids_are_unique() {
        assert_ne!(random_uuid(), random_uuid());
    }

    #[test]
    fn timing_safe_eq_matches() {
        assert!(timing_safe_eq(b"abc", b"abc"));
        assert!(!timing_safe_eq(b"abc", b"abd"));
        assert!(!timing_safe_eq(b"abc", b"abcd"));
        assert!(timing_safe_eq(b"", b""));
    }
}
