//! bcrypt digests for stored credentials.

use bcrypt::{hash, verify, DEFAULT_COST};

/// Hash a plaintext password for storage.
///
/// # Errors
/// Returns an error if bcrypt fails to produce a digest.
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, DEFAULT_COST)
}

/// Compare a plaintext password against a stored digest.
///
/// A malformed digest counts as a mismatch rather than an error so callers
/// can treat it the same as a wrong password.
#[must_use]
pub fn verify_password(password: &str, digest: &str) -> bool {
    verify(password, digest).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let digest = hash_password("password").unwrap();
        assert!(verify_password("password", &digest));
    }

    #[test]
    fn test_wrong_password_rejected() {
        let digest = hash_password("password").unwrap();
        assert!(!verify_password("wrong password", &digest));
    }

    #[test]
    fn test_hashes_are_salted() {
        // Hashing the same password twice must not produce the same digest.
        let first = hash_password("password").unwrap();
        let second = hash_password("password").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_malformed_digest_is_mismatch() {
        assert!(!verify_password("password", "not-a-bcrypt-digest"));
    }
}
