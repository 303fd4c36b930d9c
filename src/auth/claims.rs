/// Access-token claims
///
/// Payload of the signed access token: subject and email plus the standard
/// registered claims (RFC 7519).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    pub fn new(user_id: Uuid, email: String, ttl_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            email,
            exp: now + ttl_seconds,
            iat: now,
            iss: issuer,
        }
    }

    /// Parse the subject back into a user id
    ///
    /// # Errors
    /// A signed token with a non-UUID subject is treated as invalid
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::TokenInvalid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, "a@x.com".to_string(), 900, "test".to_string());

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.exp - claims.iat, 900);
        assert!(claims.iat <= chrono::Utc::now().timestamp());
        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[test]
    fn test_invalid_subject() {
        let mut claims = Claims::new(Uuid::new_v4(), "a@x.com".to_string(), 900, "test".to_string());
        claims.sub = "invalid-uuid".to_string();

        assert!(matches!(
            claims.user_id(),
            Err(AppError::Auth(AuthError::TokenInvalid))
        ));
    }
}
