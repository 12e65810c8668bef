//! Salted one-way password hashing.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Hash a password using Argon2 with a fresh random salt.
///
/// The result is a PHC string that embeds the salt and parameters.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hash = hash_password("correct horse 42").unwrap();
        assert!(verify_password("correct horse 42", &hash));
    }

    #[test]
    fn test_hash_is_salted() {
        let h1 = hash_password("same-password-1").unwrap();
        let h2 = hash_password("same-password-1").unwrap();
        assert_ne!(h1, h2, "Fresh salt should produce different digests");
        assert!(verify_password("same-password-1", &h1));
        assert!(verify_password("same-password-1", &h2));
    }

    #[test]
    fn test_wrong_password_rejected() {
        let hash = hash_password("password-one-1").unwrap();
        assert!(!verify_password("password-two-2", &hash));
        assert!(!verify_password("", &hash));
    }

    #[test]
    fn test_malformed_hash_is_false() {
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", "$argon2id$v=19$garbage"));
    }
}
