/// Credential store
///
/// Owns user identities and their password hashes. Hashes never leave this
/// module: every public method returns `User`, which has no password field.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::error::{AppError, AuthError, DatabaseError};
use crate::users::{User, UserRecord, UserRepository, UserRole, UserStatus};
use crate::validators::normalize_email;

/// Compared against when the email is unknown, so both failure paths pay
/// for one bcrypt verification.
const TIMING_DUMMY_PASSWORD: &str = "timing-dummy-password";

pub struct CredentialStore {
    repository: Arc<dyn UserRepository>,
    hash_cost: u32,
    dummy_hash: OnceCell<String>,
}

impl CredentialStore {
    pub fn new(repository: Arc<dyn UserRepository>, hash_cost: u32) -> Self {
        Self {
            repository,
            hash_cost,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Create a member account
    ///
    /// # Errors
    /// `AppError::Conflict` if the email is already registered. Nothing is
    /// written in that case.
    pub async fn create_user(&self, email: &str, raw_password: &str) -> Result<User, AppError> {
        let email = normalize_email(email);

        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(conflict());
        }

        let password_hash = hash_password(raw_password, self.hash_cost).await?;
        let record = UserRecord::new(email, password_hash);

        // The pre-check can race with a concurrent registration; the unique
        // constraint is the authority.
        match self.repository.insert(&record).await {
            Ok(()) => {}
            Err(AppError::Database(DatabaseError::UniqueViolation(_))) => return Err(conflict()),
            Err(e) => return Err(e),
        }

        tracing::info!(user_id = %record.user.id, "User created");
        Ok(record.user)
    }

    /// Check an email/password pair
    ///
    /// # Errors
    /// `AuthError::InvalidCredentials` for an unknown email, a wrong password
    /// or a non-active account, with no way to tell them apart
    pub async fn verify_password(&self, email: &str, raw_password: &str) -> Result<User, AppError> {
        let email = normalize_email(email);

        let record = match self.repository.find_by_email(&email).await? {
            Some(record) => record,
            None => {
                let dummy = self.dummy_hash().await?;
                verify_password(raw_password, dummy).await?;
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !verify_password(raw_password, &record.password_hash).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        if !record.user.is_active() {
            tracing::info!(user_id = %record.user.id, status = record.user.status.as_str(), "Login attempt on non-active account");
            return Err(AuthError::InvalidCredentials.into());
        }

        Ok(record.user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = normalize_email(email);
        Ok(self.repository.find_by_email(&email).await?.map(|r| r.user))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.repository.find_by_id(id).await?.map(|r| r.user))
    }

    /// Re-check the password of an already identified user
    ///
    /// # Errors
    /// `AuthError::InvalidCredentials` if the user is unknown, not active or
    /// `raw_password` does not match
    pub async fn verify_current_password(
        &self,
        user_id: Uuid,
        raw_password: &str,
    ) -> Result<User, AppError> {
        let record = self
            .repository
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

        if !verify_password(raw_password, &record.password_hash).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        if !record.user.is_active() {
            tracing::info!(user_id = %record.user.id, status = record.user.status.as_str(), "Password check on non-active account");
            return Err(AuthError::InvalidCredentials.into());
        }

        Ok(record.user)
    }

    /// Store a new hash for `raw_password`
    pub async fn set_password(&self, user_id: Uuid, raw_password: &str) -> Result<(), AppError> {
        let password_hash = hash_password(raw_password, self.hash_cost).await?;
        if !self
            .repository
            .update_password_hash(user_id, &password_hash, Utc::now())
            .await?
        {
            return Err(AuthError::InvalidCredentials.into());
        }

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// # Errors
    /// `AppError::NotFound` if no such user exists
    pub async fn set_status(&self, user_id: Uuid, status: UserStatus) -> Result<User, AppError> {
        self.repository
            .update_status(user_id, status, Utc::now())
            .await?
            .map(|r| r.user)
            .ok_or_else(user_not_found)
    }

    /// # Errors
    /// `AppError::NotFound` if no such user exists
    pub async fn set_role(&self, user_id: Uuid, role: UserRole) -> Result<User, AppError> {
        self.repository
            .update_role(user_id, role, Utc::now())
            .await?
            .map(|r| r.user)
            .ok_or_else(user_not_found)
    }

    async fn dummy_hash(&self) -> Result<&String, AppError> {
        self.dummy_hash
            .get_or_try_init(|| hash_password(TIMING_DUMMY_PASSWORD, self.hash_cost))
            .await
    }
}

fn conflict() -> AppError {
    AppError::Conflict("User with this email already exists".to_string())
}

fn user_not_found() -> AppError {
    AppError::NotFound("User doesn't exist".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::InMemoryUserRepository;

    fn store() -> (Arc<InMemoryUserRepository>, CredentialStore) {
        let repo = Arc::new(InMemoryUserRepository::new());
        let store = CredentialStore::new(repo.clone(), 4);
        (repo, store)
    }

    #[tokio::test]
    async fn test_create_and_verify() {
        let (_, store) = store();
        let created = store.create_user("a@x.com", "pw1").await.unwrap();
        let verified = store.verify_password("a@x.com", "pw1").await.unwrap();

        assert_eq!(created, verified);
    }

    #[tokio::test]
    async fn test_email_is_case_insensitive() {
        let (_, store) = store();
        store.create_user("Alice@X.com", "pw1").await.unwrap();

        assert!(store.verify_password("alice@x.com", "pw1").await.is_ok());
        assert!(matches!(
            store.create_user("ALICE@x.com", "pw2").await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_leaves_first_user_untouched() {
        let (repo, store) = store();
        let first = store.create_user("a@x.com", "pw1").await.unwrap();

        let err = store.create_user("a@x.com", "other").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(repo.len(), 1);
        assert_eq!(store.find_by_email("a@x.com").await.unwrap(), Some(first));
        assert!(store.verify_password("a@x.com", "pw1").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_fail_identically() {
        let (_, store) = store();
        store.create_user("a@x.com", "pw1").await.unwrap();

        let unknown = store.verify_password("nobody@x.com", "pw1").await.unwrap_err();
        let wrong = store.verify_password("a@x.com", "nope").await.unwrap_err();

        assert!(matches!(unknown, AppError::Auth(AuthError::InvalidCredentials)));
        assert!(matches!(wrong, AppError::Auth(AuthError::InvalidCredentials)));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_banned_user_cannot_verify() {
        let (_, store) = store();
        let user = store.create_user("a@x.com", "pw1").await.unwrap();
        store.set_status(user.id, UserStatus::Banned).await.unwrap();

        let err = store.verify_password("a@x.com", "pw1").await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidCredentials)));
        let err = store.verify_current_password(user.id, "pw1").await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_verify_current_and_set_password() {
        let (_, store) = store();
        let user = store.create_user("a@x.com", "pw1").await.unwrap();

        assert!(store.verify_current_password(user.id, "wrong").await.is_err());
        assert_eq!(store.verify_current_password(user.id, "pw1").await.unwrap(), user);
        store.set_password(user.id, "pw2").await.unwrap();

        assert!(store.verify_password("a@x.com", "pw1").await.is_err());
        assert!(store.verify_password("a@x.com", "pw2").await.is_ok());
        assert!(store.set_password(Uuid::new_v4(), "pw3").await.is_err());
    }

    #[tokio::test]
    async fn test_set_status_and_role() {
        let (_, store) = store();
        let user = store.create_user("a@x.com", "pw1").await.unwrap();

        let admin = store.set_role(user.id, UserRole::Admin).await.unwrap();
        assert!(admin.is_admin());
        let unbanned = store.set_status(user.id, UserStatus::Active).await.unwrap();
        assert!(unbanned.is_active());

        assert!(matches!(
            store.set_status(Uuid::new_v4(), UserStatus::Banned).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let (_, store) = store();
        let user = store.create_user("a@x.com", "pw1").await.unwrap();

        assert_eq!(store.find_by_id(user.id).await.unwrap(), Some(user));
        assert_eq!(store.find_by_id(Uuid::new_v4()).await.unwrap(), None);
    }
}
