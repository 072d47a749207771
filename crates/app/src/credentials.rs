//! Secret hashing and verification

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;

use marquee_core::{Error, Result};

/// Hash a secret for storage (argon2, PHC string)
pub fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Credential(e.to_string()))
}

/// Verify a secret against a stored hash; an undecodable hash verifies
/// as false rather than erroring
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_secret("hunter2").unwrap();
        assert!(verify_secret("hunter2", &hash));
        assert!(!verify_secret("hunter3", &hash));
    }

    #[test]
    fn test_garbage_hash_verifies_false() {
        assert!(!verify_secret("hunter2", "not-a-phc-string"));
    }
}
