/// User persistence
///
/// `UserRepository` is the storage seam under the credential store. `insert`
/// must report a duplicate email as `DatabaseError::UniqueViolation`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, DatabaseError};
use crate::users::models::{User, UserRecord, UserRole, UserStatus};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, record: &UserRecord) -> Result<(), AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError>;
    /// Returns `false` when no such user exists
    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;
    /// Returns the updated row, or `None` when no such user exists
    async fn update_status(
        &self,
        id: Uuid,
        status: UserStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<UserRecord>, AppError>;
    async fn update_role(
        &self,
        id: Uuid,
        role: UserRole,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<UserRecord>, AppError>;
}

/// Process-local repository keyed by email
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, UserRecord>>, AppError> {
        self.users
            .lock()
            .map_err(|_| AppError::Internal("user map lock poisoned".to_string()))
    }

    fn modify(
        &self,
        id: Uuid,
        updated_at: DateTime<Utc>,
        change: impl FnOnce(&mut UserRecord),
    ) -> Result<Option<UserRecord>, AppError> {
        let mut users = self.lock()?;
        Ok(users.values_mut().find(|r| r.user.id == id).map(|record| {
            change(record);
            record.updated_at = updated_at;
            record.clone()
        }))
    }

    pub fn len(&self) -> usize {
        self.users.lock().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, record: &UserRecord) -> Result<(), AppError> {
        let mut users = self.lock()?;
        if users.contains_key(&record.user.email) {
            return Err(DatabaseError::UniqueViolation("users_email_key".to_string()).into());
        }
        users.insert(record.user.email.clone(), record.clone());
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self.lock()?.get(email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError> {
        Ok(self.lock()?.values().find(|r| r.user.id == id).cloned())
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let updated = self.modify(id, updated_at, |record| {
            record.password_hash = password_hash.to_string();
        })?;
        Ok(updated.is_some())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: UserStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<UserRecord>, AppError> {
        self.modify(id, updated_at, |record| record.user.status = status)
    }

    async fn update_role(
        &self,
        id: Uuid,
        role: UserRole,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<UserRecord>, AppError> {
        self.modify(id, updated_at, |record| record.user.role = role)
    }
}

/// PostgreSQL repository over the `users` table
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type UserRow = (
    Uuid,
    String,
    String,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn record_from_row(row: UserRow) -> Result<UserRecord, AppError> {
    let (id, email, password_hash, role, status, created_at, updated_at) = row;
    let role = UserRole::parse(&role)
        .ok_or_else(|| AppError::Internal(format!("Unknown role '{}' for user {}", role, id)))?;
    let status = UserStatus::parse(&status)
        .ok_or_else(|| AppError::Internal(format!("Unknown status '{}' for user {}", status, id)))?;

    Ok(UserRecord {
        user: User {
            id,
            email,
            role,
            status,
            created_at,
        },
        password_hash,
        updated_at,
    })
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, record: &UserRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, role, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.user.id)
        .bind(&record.user.email)
        .bind(&record.password_hash)
        .bind(record.user.role.as_str())
        .bind(record.user.status.as_str())
        .bind(record.user.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, role, status, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(record_from_row)
        .transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, role, status, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(record_from_row)
        .transpose()
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, updated_at = $2
            WHERE id = $3
            "#,
        )
        .bind(password_hash)
        .bind(updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: UserStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<UserRecord>, AppError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET status = $1, updated_at = $2
            WHERE id = $3
            RETURNING id, email, password_hash, role, status, created_at, updated_at
            "#,
        )
        .bind(status.as_str())
        .bind(updated_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(record_from_row)
        .transpose()
    }

    async fn update_role(
        &self,
        id: Uuid,
        role: UserRole,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<UserRecord>, AppError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET role = $1, updated_at = $2
            WHERE id = $3
            RETURNING id, email, password_hash, role, status, created_at, updated_at
            "#,
        )
        .bind(role.as_str())
        .bind(updated_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(record_from_row)
        .transpose()
    }
}
