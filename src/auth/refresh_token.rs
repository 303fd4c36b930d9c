/// Refresh Token Management
///
/// Refresh tokens are:
/// - 64 random alphanumeric characters from the thread-local CSPRNG
/// - Hashed with SHA-256 before storage (never store plaintext)
/// - Single-use: a successful lookup deletes the record (token rotation)
/// - Invalid the moment they pass `expires_at`, whether or not the sweep has
///   removed them yet

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::refresh_token_repository::{RefreshTokenRecord, RefreshTokenRepository};
use crate::error::AppError;

const TOKEN_LENGTH: usize = 64;

/// Generate a new refresh token value (about 381 bits of entropy)
pub fn generate_refresh_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct RefreshTokenStore {
    repository: Arc<dyn RefreshTokenRepository>,
}

impl RefreshTokenStore {
    pub fn new(repository: Arc<dyn RefreshTokenRepository>) -> Self {
        Self { repository }
    }

    /// Create and persist a token for `user_id` that expires after `ttl`
    ///
    /// Returns the plaintext value; only its hash is stored.
    pub async fn issue(&self, user_id: Uuid, ttl: Duration) -> Result<String, AppError> {
        let token = generate_refresh_token();
        let now = Utc::now();
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash_token(&token),
            expires_at: now + ttl,
            created_at: now,
        };

        self.repository.insert(&record).await?;
        tracing::debug!(user_id = %user_id, expires_at = %record.expires_at, "Refresh token issued");

        Ok(token)
    }

    /// Consume a token
    ///
    /// The record is gone after this call whatever the outcome. Unknown,
    /// already consumed and expired tokens all yield `None`. Among concurrent
    /// callers presenting the same value at most one gets `Some`.
    pub async fn lookup_and_invalidate(
        &self,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        let record = match self.repository.take(&hash_token(token)).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        if record.is_expired_at(Utc::now()) {
            tracing::info!(user_id = %record.user_id, "Expired refresh token presented");
            return Ok(None);
        }

        Ok(Some(record))
    }

    /// Idempotent single-token delete
    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        if self.repository.delete(&hash_token(token)).await? {
            tracing::debug!("Refresh token revoked");
        }
        Ok(())
    }

    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let removed = self.repository.delete_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, removed, "All refresh tokens revoked for user");
        Ok(removed)
    }

    /// Physically delete expired records. Correctness never depends on it.
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        self.repository.delete_expired(Utc::now()).await
    }
}

/// Periodically purge expired refresh tokens until the runtime shuts down
pub fn spawn_expired_token_sweeper(
    store: Arc<RefreshTokenStore>,
    every: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Swept expired refresh tokens"),
                Err(e) => tracing::warn!(error = %e, "Refresh token sweep failed"),
            }
        }
    })
}
