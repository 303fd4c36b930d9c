use std::fmt;

use config::{Config, Environment, File};

use crate::error::{AppError, ConfigError};

const MIN_SECRET_LENGTH: usize = 32;
const MIN_HASH_COST: u32 = 4;
const MAX_HASH_COST: u32 = 31;
const MAX_ACCESS_TOKEN_TTL_SECONDS: i64 = 24 * 3600;
const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 365;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub storage: StorageBackend,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

/// Where users and refresh tokens are persisted
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Process-local maps; everything is lost on restart
    Memory,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub max_connections: u32,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_name", &self.database_name)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Token and password-hashing settings
#[derive(serde::Deserialize, Clone)]
pub struct AuthSettings {
    /// HS256 key for access tokens
    pub access_token_secret: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_days: i64,
    /// bcrypt cost factor
    pub password_hash_cost: u32,
    pub issuer: String,
    /// How often the background sweep deletes expired refresh tokens
    pub purge_interval_seconds: u64,
}

impl AuthSettings {
    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_ttl_days)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "auth.access_token_secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            )));
        }
        if !(1..=MAX_ACCESS_TOKEN_TTL_SECONDS).contains(&self.access_token_ttl_seconds) {
            return Err(ConfigError::InvalidValue(format!(
                "auth.access_token_ttl_seconds must be between 1 and {}",
                MAX_ACCESS_TOKEN_TTL_SECONDS
            )));
        }
        if !(1..=MAX_REFRESH_TOKEN_TTL_DAYS).contains(&self.refresh_token_ttl_days) {
            return Err(ConfigError::InvalidValue(format!(
                "auth.refresh_token_ttl_days must be between 1 and {}",
                MAX_REFRESH_TOKEN_TTL_DAYS
            )));
        }
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.password_hash_cost) {
            return Err(ConfigError::InvalidValue(format!(
                "auth.password_hash_cost must be between {} and {}",
                MIN_HASH_COST, MAX_HASH_COST
            )));
        }
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::MissingRequired("auth.issuer".to_string()));
        }
        if self.purge_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.purge_interval_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("access_token_secret", &"<redacted>")
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("password_hash_cost", &self.password_hash_cost)
            .field("issuer", &self.issuer)
            .field("purge_interval_seconds", &self.purge_interval_seconds)
            .finish()
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth.validate()?;
        if self.storage == StorageBackend::Postgres && self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "database.max_connections must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn builder() -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
    Config::builder()
        .set_default("application.host", "127.0.0.1")?
        .set_default("application.port", 8080)?
        .set_default("database.username", "postgres")?
        .set_default("database.password", "password")?
        .set_default("database.host", "localhost")?
        .set_default("database.port", 5432)?
        .set_default("database.database_name", "wordgroups")?
        .set_default("database.max_connections", 5)?
        .set_default("auth.access_token_ttl_seconds", 900)?
        .set_default("auth.refresh_token_ttl_days", 10)?
        .set_default("auth.password_hash_cost", 12)?
        .set_default("auth.issuer", "wordgroups")?
        .set_default("auth.purge_interval_seconds", 3600)?
        .set_default("storage", "postgres")
}

/// Load settings: defaults, then `configuration.{yaml,toml,json}`, then
/// `APP_`-prefixed environment variables (`APP_AUTH__ACCESS_TOKEN_SECRET`).
pub fn get_configuration() -> Result<Settings, AppError> {
    let settings = builder()?
        .add_source(File::with_name("configuration").required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize::<Settings>()?;

    settings.validate()?;
    Ok(settings)
}
