//! Session lifecycle
//!
//! `AuthCoordinator` is the only component that knows how a refresh-token
//! chain evolves:
//!
//! ```text
//! issued ──► Active ──refresh──► Rotated (a new Active link is issued)
//!               │
//!               ├──now > expires_at──► Expired
//!               └──revoke / logout──► Revoked
//! ```
//!
//! Rotated, expired and revoked values are indistinguishable to the caller:
//! presenting any of them fails with `AuthError::InvalidRefreshToken`.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::credentials::CredentialStore;
use crate::auth::jwt::TokenSigner;
use crate::auth::refresh_token::RefreshTokenStore;
use crate::error::{AppError, AuthError};
use crate::users::{User, UserRole, UserStatus};

/// An access/refresh pair handed back after every successful authentication
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access: String,
    pub refresh: String,
    /// Access-token lifetime in seconds
    pub expires_in: i64,
}

pub struct AuthCoordinator {
    credentials: Arc<CredentialStore>,
    signer: Arc<TokenSigner>,
    refresh_tokens: Arc<RefreshTokenStore>,
    refresh_ttl: chrono::Duration,
}

impl AuthCoordinator {
    pub fn new(
        credentials: Arc<CredentialStore>,
        signer: Arc<TokenSigner>,
        refresh_tokens: Arc<RefreshTokenStore>,
        refresh_ttl: chrono::Duration,
    ) -> Self {
        Self {
            credentials,
            signer,
            refresh_tokens,
            refresh_ttl,
        }
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        self.refresh_ttl
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Create an account and open its first session
    ///
    /// # Errors
    /// `AppError::Conflict` if the email is taken, unchanged from the store
    pub async fn register(&self, email: &str, raw_password: &str) -> Result<AuthTokens, AppError> {
        let user = self.credentials.create_user(email, raw_password).await?;
        let tokens = self.issue_pair(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(tokens)
    }

    /// # Errors
    /// `AuthError::InvalidCredentials` for every kind of credential failure
    pub async fn login(&self, email: &str, raw_password: &str) -> Result<AuthTokens, AppError> {
        let user = match self.credentials.verify_password(email, raw_password).await {
            Ok(user) => user,
            Err(AppError::Auth(_)) => return Err(AuthError::InvalidCredentials.into()),
            Err(e) => return Err(e),
        };
        let tokens = self.issue_pair(&user).await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(tokens)
    }

    /// Rotate a refresh token
    ///
    /// The presented value is consumed before anything else happens, so a
    /// failure further down still leaves it unusable.
    ///
    /// # Errors
    /// `AuthError::InvalidRefreshToken` when the value is empty, unknown,
    /// expired, revoked or already rotated, or when its owner can no longer
    /// sign in
    pub async fn refresh(&self, presented: &str) -> Result<AuthTokens, AppError> {
        if presented.is_empty() {
            return Err(AuthError::InvalidRefreshToken.into());
        }

        let record = self
            .refresh_tokens
            .lookup_and_invalidate(presented)
            .await?
            .ok_or(AppError::Auth(AuthError::InvalidRefreshToken))?;

        let user = match self.credentials.find_by_id(record.user_id).await? {
            Some(user) if user.is_active() => user,
            _ => {
                tracing::warn!(user_id = %record.user_id, "Refresh token owner missing or not active");
                return Err(AuthError::InvalidRefreshToken.into());
            }
        };

        let tokens = self.issue_pair(&user).await?;
        tracing::info!(user_id = %user.id, "Refresh token rotated");
        Ok(tokens)
    }

    /// End a single session. Unknown values are ignored.
    pub async fn revoke(&self, presented: &str) -> Result<(), AppError> {
        if presented.is_empty() {
            return Ok(());
        }
        self.refresh_tokens.revoke(presented).await
    }

    /// End every session of a user
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        self.refresh_tokens.revoke_all_for_user(user_id).await
    }

    /// Logout everywhere
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        self.revoke_all_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, "User logged out everywhere");
        Ok(())
    }

    /// Change the password, drop every existing session and open a new one
    ///
    /// Sessions are revoked before the new hash is stored: when the revoke
    /// fails the old password stays in place and the call can be retried.
    ///
    /// # Errors
    /// `AuthError::InvalidCredentials` if `current_password` does not match
    /// or the account is not active
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<AuthTokens, AppError> {
        let user = self
            .credentials
            .verify_current_password(user_id, current_password)
            .await?;
        self.revoke_all_for_user(user.id).await?;
        self.credentials.set_password(user.id, new_password).await?;

        self.issue_pair(&user).await
    }

    /// Ban or unban an account. Banning also ends every session.
    ///
    /// # Errors
    /// `AppError::NotFound` if no such user exists
    pub async fn set_banned(&self, user_id: Uuid, banned: bool) -> Result<User, AppError> {
        let status = if banned {
            UserStatus::Banned
        } else {
            UserStatus::Active
        };
        let user = self.credentials.set_status(user_id, status).await?;
        if banned {
            let revoked = self.revoke_all_for_user(user_id).await?;
            tracing::info!(user_id = %user_id, revoked, "User banned");
        } else {
            tracing::info!(user_id = %user_id, "User unbanned");
        }
        Ok(user)
    }

    pub async fn set_role(&self, user_id: Uuid, role: UserRole) -> Result<User, AppError> {
        let user = self.credentials.set_role(user_id, role).await?;
        tracing::info!(user_id = %user_id, role = role.as_str(), "User role changed");
        Ok(user)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AppError> {
        self.signer.verify(token)
    }

    async fn issue_pair(&self, user: &User) -> Result<AuthTokens, AppError> {
        let access = self.signer.mint(user.id, &user.email)?;
        let refresh = self.refresh_tokens.issue(user.id, self.refresh_ttl).await?;

        Ok(AuthTokens {
            access,
            refresh,
            expires_in: self.signer.ttl_seconds(),
        })
    }
}
