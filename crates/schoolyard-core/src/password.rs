//! Password hashing with bcrypt.

use anyhow::anyhow;
use bcrypt::{DEFAULT_COST, hash, verify};

use crate::errors::AppError;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash_password_with_cost(password, DEFAULT_COST)
}

/// Lower costs are only meant for seeding and tests.
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost).map_err(|e| AppError::internal(anyhow!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::internal(anyhow!("Failed to verify password: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password_with_cost("correct horse", 4).unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password_with_cost("same", 4).unwrap();
        let b = hash_password_with_cost("same", 4).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_invalid_hash_is_error() {
        assert!(verify_password("anything", "not-a-bcrypt-hash").is_err());
    }
}
