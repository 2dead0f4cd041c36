/// Password Hashing and Verification
///
/// Bcrypt with a fixed cost. Callers cannot choose the cost, so stored hashes
/// never get weaker than this constant.

use std::sync::OnceLock;

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::AppError;

pub const BCRYPT_COST: u32 = DEFAULT_COST;

/// Hash a password for storage
///
/// # Errors
/// Returns error if bcrypt hashing fails
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, BCRYPT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a submitted password against a stored hash
///
/// A mismatch and an unreadable hash both return `false`.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    verify(password, stored_hash).unwrap_or(false)
}

/// Verify against a user's hash, or burn the same bcrypt work when there is
/// no user, so unknown usernames and wrong passwords take equally long.
pub fn verify_user_password(password: &str, stored_hash: Option<&str>) -> bool {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();

    match stored_hash {
        Some(stored_hash) => verify_password(password, stored_hash),
        None => {
            if let Some(dummy) = DUMMY_HASH.get_or_init(|| hash_password("dummy-password").ok()) {
                let _ = verify_password(password, dummy);
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let password = "ValidPassword123";
        let hash = hash_password(password).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
        assert!(hash.contains(&format!("${}$", BCRYPT_COST)));
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password("same-password").unwrap();
        let second = hash_password("same-password").unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("ValidPassword123").expect("Failed to hash password");
        assert!(verify_password("ValidPassword123", &hash));
    }

    #[test]
    fn test_verify_wrong_password() {
        let hash = hash_password("ValidPassword123").expect("Failed to hash password");
        assert!(!verify_password("WrongPassword123", &hash));
    }

    #[test]
    fn test_malformed_hash_is_not_verified() {
        assert!(!verify_password("ValidPassword123", "not-a-bcrypt-hash"));
        assert!(!verify_password("ValidPassword123", ""));
    }

    #[test]
    fn test_missing_user_never_verifies() {
        assert!(!verify_user_password("dummy-password", None));

        let hash = hash_password("ValidPassword123").unwrap();
        assert!(verify_user_password("ValidPassword123", Some(&hash)));
    }
}
