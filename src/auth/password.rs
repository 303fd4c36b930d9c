/// Password Hashing and Verification
///
/// bcrypt with a configurable cost. Both operations are CPU-bound and run on
/// the blocking thread pool so request handling threads are never stalled.

use crate::error::AppError;

/// Hash a password with bcrypt at the given cost
///
/// # Errors
/// Returns `AppError::Internal` if hashing fails or the worker task panics
pub async fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    let password = password.to_owned();

    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await?
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored bcrypt hash
///
/// # Errors
/// Returns `AppError::Internal` if the stored hash is malformed
pub async fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let password = password.to_owned();
    let hash = hash.to_owned();

    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await?
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[tokio::test]
    async fn test_hash_password() {
        let password = "ValidPassword123";
        let hash = hash_password(password, TEST_COST)
            .await
            .expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
        assert!(hash.contains("$04$"));
    }

    #[tokio::test]
    async fn test_verify_password() {
        let hash = hash_password("pw1", TEST_COST).await.unwrap();

        assert!(verify_password("pw1", &hash).await.unwrap());
        assert!(!verify_password("pw2", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_password_hashes_differ() {
        let first = hash_password("pw1", TEST_COST).await.unwrap();
        let second = hash_password("pw1", TEST_COST).await.unwrap();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_malformed_hash_is_internal_error() {
        let result = verify_password("pw1", "not-a-bcrypt-hash").await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_invalid_cost_is_internal_error() {
        let result = hash_password("pw1", 2).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
