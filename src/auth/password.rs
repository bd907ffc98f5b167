/// Password Hashing and Verification
///
/// PBKDF2-HMAC-SHA256 with a per-password random salt. Hash and salt are
/// stored separately as standard base64 strings.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{require_non_blank, AppError};

pub const SALT_SIZE_BYTES: usize = 16;
pub const KEY_SIZE_BYTES: usize = 32;
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Output of `hash_password`, both fields base64 encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedPassword {
    pub hash: String,
    pub salt: String,
}

/// Hash a password with a fresh random salt
///
/// # Errors
/// Returns `Validation` if the password is empty or whitespace-only
pub fn hash_password(password: &str) -> Result<HashedPassword, AppError> {
    require_non_blank(password, "password")?;

    let mut salt = [0u8; SALT_SIZE_BYTES];
    OsRng.fill_bytes(&mut salt);

    let mut key = [0u8; KEY_SIZE_BYTES];
    derive(password, &salt, &mut key);

    Ok(HashedPassword {
        hash: STANDARD.encode(key),
        salt: STANDARD.encode(salt),
    })
}

/// Verify a password against a stored hash and salt
///
/// Never fails: an empty candidate or a stored hash/salt that does not decode
/// yields `false`. The comparison does not short-circuit on the first
/// differing byte.
pub fn verify_password(password: &str, expected_hash: &str, salt: &str) -> bool {
    if password.trim().is_empty() || expected_hash.trim().is_empty() || salt.trim().is_empty() {
        return false;
    }

    let (expected, salt) = match (STANDARD.decode(expected_hash), STANDARD.decode(salt)) {
        (Ok(expected), Ok(salt)) if !expected.is_empty() => (expected, salt),
        _ => return false,
    };

    let mut actual = vec![0u8; expected.len()];
    derive(password, &salt, &mut actual);

    actual.as_slice().ct_eq(expected.as_slice()).into()
}

fn derive(password: &str, salt: &[u8], out: &mut [u8]) {
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let hashed = hash_password("ValidPassword123").expect("Failed to hash password");

        assert_eq!(STANDARD.decode(&hashed.hash).unwrap().len(), KEY_SIZE_BYTES);
        assert_eq!(STANDARD.decode(&hashed.salt).unwrap().len(), SALT_SIZE_BYTES);
        assert_ne!(hashed.hash, "ValidPassword123");
    }

    #[test]
    fn test_verify_password() {
        let hashed = hash_password("ValidPassword123").expect("Failed to hash password");

        assert!(verify_password("ValidPassword123", &hashed.hash, &hashed.salt));
    }

    #[test]
    fn test_verify_wrong_password() {
        let hashed = hash_password("ValidPassword123").expect("Failed to hash password");

        assert!(!verify_password("WrongPassword123", &hashed.hash, &hashed.salt));
        assert!(!verify_password("validpassword123", &hashed.hash, &hashed.salt));
    }

    #[test]
    fn test_same_password_gets_distinct_salt_and_hash() {
        let first = hash_password("repeat-me").unwrap();
        let second = hash_password("repeat-me").unwrap();

        assert_ne!(first.salt, second.salt);
        assert_ne!(first.hash, second.hash);
    }

    #[test]
    fn test_blank_password_is_rejected() {
        assert!(hash_password("").unwrap_err().is_invalid_argument());
        assert!(hash_password("   ").unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_verify_never_fails_on_malformed_input() {
        let hashed = hash_password("ValidPassword123").unwrap();

        assert!(!verify_password("", &hashed.hash, &hashed.salt));
        assert!(!verify_password("ValidPassword123", "", &hashed.salt));
        assert!(!verify_password("ValidPassword123", &hashed.hash, ""));
        assert!(!verify_password("ValidPassword123", "not base64 !!", &hashed.salt));
        assert!(!verify_password("ValidPassword123", &hashed.hash, "%%%"));
    }

    #[test]
    fn test_salt_is_bound_to_hash() {
        let first = hash_password("ValidPassword123").unwrap();
        let second = hash_password("ValidPassword123").unwrap();

        assert!(!verify_password("ValidPassword123", &first.hash, &second.salt));
    }
}
