/// Authentication module
///
/// Credential storage, access-token signing, refresh-token rotation and the
/// coordinator that ties them into sessions.

mod claims;
mod credentials;
mod jwt;
mod password;
mod refresh_token;
mod refresh_token_repository;
mod service;

pub use claims::Claims;
pub use credentials::CredentialStore;
pub use jwt::TokenSigner;
pub use password::{hash_password, verify_password};
pub use refresh_token::{generate_refresh_token, spawn_expired_token_sweeper, RefreshTokenStore};
pub use refresh_token_repository::{
    InMemoryRefreshTokenRepository, PgRefreshTokenRepository, RefreshTokenRecord,
    RefreshTokenRepository,
};
pub use service::{AuthCoordinator, AuthTokens};
