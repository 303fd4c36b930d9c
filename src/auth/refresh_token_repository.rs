/// Refresh-token persistence
///
/// Records are keyed by the SHA-256 hex digest of the token value. `take`
/// is the rotation primitive: a fetch and delete that at most one concurrent
/// caller can win for a given key.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Logically invalid from the instant `now > expires_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AppError>;
    /// Atomically remove and return the record for `token_hash`
    async fn take(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AppError>;
    async fn delete(&self, token_hash: &str) -> Result<bool, AppError>;
    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, AppError>;
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}

#[derive(Default)]
pub struct InMemoryRefreshTokenRepository {
    records: Mutex<HashMap<String, RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, RefreshTokenRecord>>, AppError> {
        self.records
            .lock()
            .map_err(|_| AppError::Internal("refresh token map lock poisoned".to_string()))
    }

    /// Physically stored records, expired ones included
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        self.lock()?.insert(record.token_hash.clone(), record.clone());
        Ok(())
    }

    async fn take(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        Ok(self.lock()?.remove(token_hash))
    }

    async fn delete(&self, token_hash: &str) -> Result<bool, AppError> {
        Ok(self.lock()?.remove(token_hash).is_some())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|_, r| r.user_id != user_id);
        Ok((before - records.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|_, r| !r.is_expired_at(now));
        Ok((before - records.len()) as u64)
    }
}

/// PostgreSQL repository over the `refresh_tokens` table
pub struct PgRefreshTokenRepository {
    pool: PgPool,
}

impl PgRefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenRepository for PgRefreshTokenRepository {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.token_hash)
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn take(&self, token_hash: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        // Single statement: the row lock makes concurrent callers serialize
        // and every caller after the first sees zero rows.
        let row = sqlx::query_as::<_, (Uuid, Uuid, String, DateTime<Utc>, DateTime<Utc>)>(
            r#"
            DELETE FROM refresh_tokens
            WHERE token_hash = $1
            RETURNING id, user_id, token_hash, expires_at, created_at
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, user_id, token_hash, expires_at, created_at)| RefreshTokenRecord {
                id,
                user_id,
                token_hash,
                expires_at,
                created_at,
            },
        ))
    }

    async fn delete(&self, token_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(user_id: Uuid, hash: &str, ttl: Duration) -> RefreshTokenRecord {
        let now = Utc::now();
        RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash.to_string(),
            expires_at: now + ttl,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_take_is_one_shot() {
        let repo = InMemoryRefreshTokenRepository::new();
        let stored = record(Uuid::new_v4(), "h1", Duration::days(1));
        repo.insert(&stored).await.unwrap();

        assert_eq!(repo.take("h1").await.unwrap(), Some(stored));
        assert_eq!(repo.take("h1").await.unwrap(), None);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_delete_for_user_leaves_others() {
        let repo = InMemoryRefreshTokenRepository::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        repo.insert(&record(alice, "a1", Duration::days(1))).await.unwrap();
        repo.insert(&record(alice, "a2", Duration::days(1))).await.unwrap();
        repo.insert(&record(bob, "b1", Duration::days(1))).await.unwrap();

        assert_eq!(repo.delete_for_user(alice).await.unwrap(), 2);
        assert_eq!(repo.len(), 1);
        assert!(repo.take("b1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let repo = InMemoryRefreshTokenRepository::new();
        let user = Uuid::new_v4();
        repo.insert(&record(user, "old", Duration::seconds(-1))).await.unwrap();
        repo.insert(&record(user, "new", Duration::days(1))).await.unwrap();

        assert_eq!(repo.delete_expired(Utc::now()).await.unwrap(), 1);
        assert!(repo.take("old").await.unwrap().is_none());
        assert!(repo.take("new").await.unwrap().is_some());
    }

    #[test]
    fn test_expiry_boundary() {
        let r = record(Uuid::new_v4(), "h", Duration::days(1));
        assert!(!r.is_expired_at(r.expires_at));
        assert!(r.is_expired_at(r.expires_at + Duration::milliseconds(1)));
    }
}
