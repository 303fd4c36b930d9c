/// Access-token signing and verification
///
/// `TokenSigner` owns the HS256 key material for the whole process. It holds
/// no per-request state and never touches storage.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError};

pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl_seconds: i64,
}

impl TokenSigner {
    pub fn new(secret: &[u8], issuer: impl Into<String>, ttl_seconds: i64) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer,
            ttl_seconds,
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(
            settings.access_token_secret.as_bytes(),
            settings.issuer.clone(),
            settings.access_token_ttl_seconds,
        )
    }

    /// Access-token lifetime in seconds
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Mint a signed access token for a user
    ///
    /// # Errors
    /// Returns `AppError::Internal` if encoding fails
    pub fn mint(&self, user_id: Uuid, email: &str) -> Result<String, AppError> {
        let claims = Claims::new(
            user_id,
            email.to_string(),
            self.ttl_seconds,
            self.issuer.clone(),
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify a token and return its claims
    ///
    /// # Errors
    /// `AuthError::TokenInvalid` for a bad signature, malformed structure,
    /// wrong issuer or an expired token
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Access token rejected");
                AppError::Auth(AuthError::TokenInvalid)
            })
    }
}
