//! Password hashing for phone-number accounts
//!
//! New hashes are Argon2id PHC strings. Accounts created before that carry a
//! hex SHA-256 digest of the password plus a fixed salt; those still verify
//! so existing users can sign in.

use crate::error::{AppError, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordVerifier, SaltString};
use argon2::{Argon2, PasswordHasher};
use sha2::{Digest, Sha256};

const LEGACY_SALT: &str = "life_guardian_salt_2024";

/// Hash a password with Argon2id
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Generic(format!("Password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Check a password against a stored hash of either format
pub fn verify_password(password: &str, stored: &str) -> bool {
    if stored.starts_with("$argon2") {
        return match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!("Unreadable password hash: {}", e);
                false
            }
        };
    }

    // Legacy SHA-256 digest
    legacy_digest(password).eq_ignore_ascii_case(stored)
}

/// Whether a stored hash should be upgraded on next sign-in
pub fn needs_rehash(stored: &str) -> bool {
    !stored.starts_with("$argon2")
}

fn legacy_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(LEGACY_SALT.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let first = hash_password("same").unwrap();
        let second = hash_password("same").unwrap();

        assert_ne!(first, second);
        assert!(verify_password("same", &first));
        assert!(verify_password("same", &second));
    }

    #[test]
    fn test_legacy_digest_still_verifies() {
        let stored = legacy_digest("123456");

        assert_eq!(stored.len(), 64);
        assert!(verify_password("123456", &stored));
        assert!(!verify_password("654321", &stored));
        assert!(needs_rehash(&stored));
    }

    #[test]
    fn test_corrupt_argon_hash_fails_closed() {
        assert!(!verify_password("pw", "$argon2id$garbage"));
    }

    #[test]
    fn test_unicode_password() {
        let password = "密码🔐пароль";
        let hash = hash_password(password).unwrap();
        assert!(verify_password(password, &hash));
    }
}
