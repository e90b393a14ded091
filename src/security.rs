//! Password hashing.
//!
//! Passwords are stored as the hex-encoded SHA3-256 digest of the plaintext.
//! No salt and no iteration count: identical inputs always produce identical
//! digests, and verification is a plain digest comparison.

use sha3::{Digest, Sha3_256};

/// Hash a plaintext password to its lowercase hex digest.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a candidate password against a stored digest.
///
/// Plain string equality, not a constant-time comparison. See DESIGN.md.
pub fn verify_password(candidate: &str, stored_digest: &str) -> bool {
    hash_password(candidate) == stored_digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let first = hash_password("hunter2");
        let second = hash_password("hunter2");
        assert_eq!(first, second);
    }

    #[test]
    fn test_hash_is_hex_of_expected_length() {
        let digest = hash_password("anything");
        // SHA3-256 is 32 bytes, 64 hex characters
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, digest.to_lowercase());
    }

    #[test]
    fn test_distinct_inputs_distinct_digests() {
        assert_ne!(hash_password("alice"), hash_password("Alice"));
        assert_ne!(hash_password(""), hash_password(" "));
    }

    #[test]
    fn test_known_vector() {
        // SHA3-256 of the empty string
        assert_eq!(
            hash_password(""),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }

    #[test]
    fn test_verify_password() {
        let digest = hash_password("correct horse");
        assert!(verify_password("correct horse", &digest));
        assert!(!verify_password("correct horsf", &digest));
        assert!(!verify_password("", &digest));
    }
}
