//! Adaptive password hashing (Argon2id) and a fixed-weight strength policy.

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::error::CryptoError;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum accepted password length. Bounds the hashing cost so an
/// attacker cannot amplify work with pathologically long inputs.
pub const MAX_PASSWORD_LENGTH: usize = 128;

// Strength scoring weights. Additive, so satisfying one more rule never
// lowers the score; the maximum is exactly 100.
const LENGTH_BASE_POINTS: u8 = 25;
const LENGTH_BONUS_POINTS: u8 = 15;
const LOWERCASE_POINTS: u8 = 10;
const UPPERCASE_POINTS: u8 = 15;
const DIGIT_POINTS: u8 = 15;
const SYMBOL_POINTS: u8 = 20;

/// Length at which the bonus points apply.
const LENGTH_BONUS_AT: usize = 12;

/// Outcome of [`check_strength`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordStrength {
    pub valid: bool,
    /// 0–100.
    pub score: u8,
    pub issues: Vec<String>,
}

fn check_length(password: &str) -> Result<(), CryptoError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len) {
        return Err(CryptoError::PasswordLength {
            min: MIN_PASSWORD_LENGTH,
            max: MAX_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Hash a password with Argon2id (default parameters, random salt).
///
/// Length bounds are enforced before any hashing work happens.
pub fn hash_password(password: &str) -> Result<String, CryptoError> {
    check_length(password)?;
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| CryptoError::PasswordHash)
}

/// Verify a password against a stored hash.
///
/// A mismatch is `Ok(false)`, never an error; only a malformed stored hash
/// errors.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, CryptoError> {
    let parsed = PasswordHash::new(hash).map_err(|_| CryptoError::MalformedPasswordHash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Score a password against the fixed policy. Pure; no hashing involved.
pub fn check_strength(password: &str) -> PasswordStrength {
    let len = password.chars().count();
    let mut score: u16 = 0;
    let mut issues = Vec::new();

    let length_ok = len >= MIN_PASSWORD_LENGTH;
    if length_ok {
        score += u16::from(LENGTH_BASE_POINTS);
    } else {
        issues.push(format!(
            "must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    if len > MAX_PASSWORD_LENGTH {
        issues.push(format!("must be at most {} characters", MAX_PASSWORD_LENGTH));
    }
    if len >= LENGTH_BONUS_AT {
        score += u16::from(LENGTH_BONUS_POINTS);
    }

    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if has_lowercase {
        score += u16::from(LOWERCASE_POINTS);
    } else {
        issues.push("add a lowercase letter".to_string());
    }
    if has_uppercase {
        score += u16::from(UPPERCASE_POINTS);
    } else {
        issues.push("add an uppercase letter".to_string());
    }
    if has_digit {
        score += u16::from(DIGIT_POINTS);
    } else {
        issues.push("add a digit".to_string());
    }
    if has_symbol {
        score += u16::from(SYMBOL_POINTS);
    } else {
        issues.push("add a symbol".to_string());
    }

    PasswordStrength {
        valid: length_ok
            && len <= MAX_PASSWORD_LENGTH
            && has_lowercase
            && has_uppercase
            && has_digit,
        score: score.min(100) as u8,
        issues,
    }
}
