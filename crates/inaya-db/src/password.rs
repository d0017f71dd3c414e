//! Password hashing for back-office accounts.
//!
//! New hashes are Argon2 PHC strings (`$argon2id$v=19$...`), so the
//! parameters and salt travel with the hash. Accounts carried over from the
//! old system still hold bcrypt hashes (`$2a$`, `$2b$`, `$2y$`); those verify
//! through bcrypt and are upgraded to Argon2 on the next successful login.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use tracing::warn;

use crate::error::{DbError, DbResult};

const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// Hashes a plaintext password with a fresh random salt.
pub fn hash_password(password: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Verifies a plaintext password against a stored hash.
///
/// Accepts Argon2 PHC strings and legacy bcrypt hashes. Anything else
/// (including a malformed bcrypt string) never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    if is_bcrypt(hash) {
        return match bcrypt::verify(password, hash) {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "Stored bcrypt hash is malformed");
                false
            }
        };
    }

    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => {
            warn!("Stored password hash is neither Argon2 nor bcrypt");
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// True when a stored hash should be replaced by an Argon2 hash.
pub fn needs_rehash(hash: &str) -> bool {
    !hash.starts_with("$argon2")
}

fn is_bcrypt(hash: &str) -> bool {
    BCRYPT_PREFIXES.iter().any(|prefix| hash.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("admin123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("admin123", &hash));
        assert!(!verify_password("admin124", &hash));
        assert!(!needs_rehash(&hash));
    }

    #[test]
    fn test_salts_differ() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_legacy_bcrypt_hash_verifies() {
        let legacy = bcrypt::hash("admin123", 4).unwrap();
        assert!(legacy.starts_with("$2"));
        assert!(verify_password("admin123", &legacy));
        assert!(!verify_password("admin124", &legacy));
        assert!(needs_rehash(&legacy));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("admin123", "$2b$12$legacyhash"));
        assert!(!verify_password("admin123", "plaintext"));
        assert!(!verify_password("", ""));
    }
}
