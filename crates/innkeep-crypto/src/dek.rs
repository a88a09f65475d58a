//! Data Encryption Key primitives.
//!
//! A DEK is a random 256-bit key. Data is encrypted with the DEK; the DEK
//! itself is wrapped (encrypted) with the lineage KEK using AES-KW and only
//! the wrapped form is ever persisted.
//!
//! Wrapped DEK wire format: [lineage:4 BE][AES-KW(KEK, DEK):40] = 44 bytes.

use aes_kw::Kek;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::types::AES_KEY_LENGTH;

/// Size of a wrapped DEK in bytes: 4 (lineage) + 40 (AES-KW output for a
/// 32-byte key).
pub const WRAPPED_DEK_SIZE: usize = 44;

/// AES-KW output size for a 32-byte key: 32 + 8 = 40 bytes.
const AES_KW_OUTPUT_SIZE: usize = 40;

/// Generate a random 256-bit Data Encryption Key.
pub fn generate_dek() -> Result<Zeroizing<[u8; AES_KEY_LENGTH]>, CryptoError> {
    let mut dek = Zeroizing::new([0u8; AES_KEY_LENGTH]);
    getrandom::getrandom(dek.as_mut()).map_err(|e| CryptoError::Rng(e.to_string()))?;
    Ok(dek)
}

/// Wrap a DEK with a KEK using AES-KW, prefixed with the KEK's lineage.
pub fn wrap_dek(
    dek: &[u8],
    kek: &[u8],
    lineage: u32,
) -> Result<[u8; WRAPPED_DEK_SIZE], CryptoError> {
    if dek.len() != AES_KEY_LENGTH {
        return Err(CryptoError::InvalidDekLength {
            expected: AES_KEY_LENGTH,
            got: dek.len(),
        });
    }
    let kek_array: [u8; AES_KEY_LENGTH] =
        kek.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: AES_KEY_LENGTH,
            got: kek.len(),
        })?;

    let kek_key = Kek::from(kek_array);
    let mut wrapped = [0u8; AES_KW_OUTPUT_SIZE];
    kek_key.wrap(dek, &mut wrapped).map_err(|_| CryptoError::Wrap)?;

    let mut result = [0u8; WRAPPED_DEK_SIZE];
    result[..4].copy_from_slice(&lineage.to_be_bytes());
    result[4..].copy_from_slice(&wrapped);
    Ok(result)
}

/// Unwrap a DEK, returning it with the lineage it was wrapped under.
pub fn unwrap_dek(
    wrapped_dek: &[u8],
    kek: &[u8],
) -> Result<(Zeroizing<Vec<u8>>, u32), CryptoError> {
    if wrapped_dek.len() != WRAPPED_DEK_SIZE {
        return Err(CryptoError::InvalidWrappedDekLength {
            expected: WRAPPED_DEK_SIZE,
            got: wrapped_dek.len(),
        });
    }
    let kek_array: [u8; AES_KEY_LENGTH] =
        kek.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: AES_KEY_LENGTH,
            got: kek.len(),
        })?;

    // Length validated above: the prefix is exactly 4 bytes.
    let lineage = u32::from_be_bytes(
        wrapped_dek[..4]
            .try_into()
            .expect("slice is exactly 4 bytes after length check"),
    );
    let wrapped_key_bytes = &wrapped_dek[4..];

    let kek_key = Kek::from(kek_array);
    let mut dek = Zeroizing::new(vec![0u8; AES_KEY_LENGTH]);
    kek_key
        .unwrap(wrapped_key_bytes, dek.as_mut())
        .map_err(|_| CryptoError::Unwrap)?;

    Ok((dek, lineage))
}

/// Read the lineage prefix from a wrapped DEK without unwrapping it.
pub fn peek_lineage(wrapped_dek: &[u8]) -> Result<u32, CryptoError> {
    if wrapped_dek.len() < 4 {
        return Err(CryptoError::InvalidWrappedDekLength {
            expected: WRAPPED_DEK_SIZE,
            got: wrapped_dek.len(),
        });
    }
    Ok(u32::from_be_bytes(
        wrapped_dek[..4]
            .try_into()
            .expect("4 bytes after length check"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::random_key;

    #[test]
    fn generate_dek_is_32_bytes_and_unique() {
        let a = generate_dek().unwrap();
        let b = generate_dek().unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(*a, *b);
    }

    #[test]
    fn wrap_unwrap_round_trip() {
        let dek = generate_dek().unwrap();
        let kek = random_key().unwrap();
        let wrapped = wrap_dek(dek.as_ref(), &kek, 3).unwrap();
        assert_eq!(wrapped.len(), WRAPPED_DEK_SIZE);

        let (unwrapped, lineage) = unwrap_dek(&wrapped, &kek).unwrap();
        assert_eq!(unwrapped.as_slice(), dek.as_slice());
        assert_eq!(lineage, 3);
    }

    #[test]
    fn lineage_prefix_is_big_endian() {
        let dek = generate_dek().unwrap();
        let kek = random_key().unwrap();
        let wrapped = wrap_dek(dek.as_ref(), &kek, 0x01020304).unwrap();
        assert_eq!(&wrapped[..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(peek_lineage(&wrapped).unwrap(), 0x01020304);
    }

    #[test]
    fn peek_rejects_short_input() {
        assert!(peek_lineage(&[1, 2, 3]).is_err());
    }

    #[test]
    fn wrong_kek_fails() {
        let dek = generate_dek().unwrap();
        let wrapped = wrap_dek(dek.as_ref(), &random_key().unwrap(), 1).unwrap();
        assert!(matches!(
            unwrap_dek(&wrapped, &random_key().unwrap()),
            Err(CryptoError::Unwrap)
        ));
    }

    #[test]
    fn tampered_wrap_fails() {
        let dek = generate_dek().unwrap();
        let kek = random_key().unwrap();
        let mut wrapped = wrap_dek(dek.as_ref(), &kek, 1).unwrap();
        let last = wrapped.len() - 1;
        wrapped[last] ^= 0xff;
        assert!(unwrap_dek(&wrapped, &kek).is_err());
    }

    #[test]
    fn wrong_lengths_rejected() {
        let kek = random_key().unwrap();
        assert!(unwrap_dek(&[0u8; 20], &kek).is_err());
        assert!(unwrap_dek(&[0u8; 50], &kek).is_err());
        assert!(wrap_dek(&[0u8; 16], &kek, 1).is_err());
        assert!(wrap_dek(&[0u8; 32], &[0u8; 16], 1).is_err());
    }
}
