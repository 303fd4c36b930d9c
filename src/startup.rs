use actix_web::dev::Server;
use actix_web::{guard, middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{
    spawn_expired_token_sweeper, AuthCoordinator, CredentialStore, InMemoryRefreshTokenRepository,
    PgRefreshTokenRepository, RefreshTokenRepository, RefreshTokenStore, TokenSigner,
};
use crate::configuration::{AuthSettings, Settings, StorageBackend};
use crate::dictionary::{
    DictionaryService, InMemoryDictionary, PgDictionary, WordGroupRepository, WordRepository,
};
use crate::error::{AppError, DatabaseError};
use crate::logger::RequestLogger;
use crate::middleware::{JwtMiddleware, RequireRole};
use crate::routes::{
    change_password, create_word, create_word_group, delete_word, delete_word_group, find_word,
    get_current_user, get_word_group, health_check, list_word_groups, login, logout, logout_all,
    refresh, register, set_user_ban, set_user_role, update_word, update_word_group,
};
use crate::users::{InMemoryUserRepository, PgUserRepository, UserRepository, UserRole};

/// Everything the HTTP layer shares across workers
pub struct AuthComponents {
    pub coordinator: Arc<AuthCoordinator>,
    pub signer: Arc<TokenSigner>,
    pub refresh_tokens: Arc<RefreshTokenStore>,
}

/// Wire the session core from its settings and two repositories
pub fn build_auth_components(
    settings: &AuthSettings,
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn RefreshTokenRepository>,
) -> AuthComponents {
    let credentials = Arc::new(CredentialStore::new(users, settings.password_hash_cost));
    let signer = Arc::new(TokenSigner::from_settings(settings));
    let refresh_tokens = Arc::new(RefreshTokenStore::new(tokens));
    let coordinator = Arc::new(AuthCoordinator::new(
        credentials,
        Arc::clone(&signer),
        Arc::clone(&refresh_tokens),
        settings.refresh_token_ttl(),
    ));

    AuthComponents {
        coordinator,
        signer,
        refresh_tokens,
    }
}

pub fn build_dictionary(
    groups: Arc<dyn WordGroupRepository>,
    words: Arc<dyn WordRepository>,
) -> Arc<DictionaryService> {
    Arc::new(DictionaryService::new(groups, words))
}

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    /// Bind the listener, connect storage and start the expired-token sweep
    pub async fn build(settings: Settings) -> Result<Self, AppError> {
        settings.validate()?;

        let users: Arc<dyn UserRepository>;
        let tokens: Arc<dyn RefreshTokenRepository>;
        let groups: Arc<dyn WordGroupRepository>;
        let words: Arc<dyn WordRepository>;
        match settings.storage {
            StorageBackend::Postgres => {
                tracing::info!("Attempting to connect to database");
                let pool = PgPoolOptions::new()
                    .max_connections(settings.database.max_connections)
                    .connect(&settings.database.connection_string())
                    .await
                    .map_err(|e| {
                        tracing::error!(error = %e, "Failed to create connection pool");
                        AppError::Database(DatabaseError::ConnectionPool(e.to_string()))
                    })?;
                tracing::info!("Database connection pool created successfully");
                users = Arc::new(PgUserRepository::new(pool.clone()));
                tokens = Arc::new(PgRefreshTokenRepository::new(pool.clone()));
                let dictionary = Arc::new(PgDictionary::new(pool));
                groups = dictionary.clone();
                words = dictionary;
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; sessions are lost on restart");
                users = Arc::new(InMemoryUserRepository::new());
                tokens = Arc::new(InMemoryRefreshTokenRepository::new());
                let dictionary = Arc::new(InMemoryDictionary::new());
                groups = dictionary.clone();
                words = dictionary;
            }
        }

        let components = build_auth_components(&settings.auth, users, tokens);
        spawn_expired_token_sweeper(
            Arc::clone(&components.refresh_tokens),
            std::time::Duration::from_secs(settings.auth.purge_interval_seconds),
        );

        let address = format!("{}:{}", settings.application.host, settings.application.port);
        let listener = TcpListener::bind(&address)
            .map_err(|e| AppError::Internal(format!("Failed to bind {}: {}", address, e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| AppError::Internal(e.to_string()))?
            .port();
        tracing::info!(%address, port, "Server listening");

        let server = run(listener, components, build_dictionary(groups, words))
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn run(
    listener: TcpListener,
    auth: AuthComponents,
    dictionary: Arc<DictionaryService>,
) -> Result<Server, std::io::Error> {
    let AuthComponents {
        coordinator, signer, ..
    } = auth;
    let coordinator_data = web::Data::from(Arc::clone(&coordinator));
    let dictionary = web::Data::from(dictionary);

    let server = HttpServer::new(move || {
        let bearer = || JwtMiddleware::new(Arc::clone(&signer));
        let admins = || RequireRole::new(Arc::clone(&coordinator), &[UserRole::Admin]);
        let editors = || {
            RequireRole::new(
                Arc::clone(&coordinator),
                &[UserRole::Admin, UserRole::Author],
            )
        };

        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(RequestLogger)

            // Shared state
            .app_data(coordinator_data.clone())
            .app_data(dictionary.clone())

            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/auth")
                    // Public routes
                    .route("/registration", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout))

                    // Protected routes (require a bearer access token)
                    .service(
                        web::resource("/logout-all")
                            .wrap(bearer())
                            .route(web::post().to(logout_all)),
                    )
                    .service(
                        web::resource("/password")
                            .wrap(bearer())
                            .route(web::post().to(change_password)),
                    )
                    .service(
                        web::resource("/me")
                            .wrap(bearer())
                            .route(web::get().to(get_current_user)),
                    ),
            )
            .service(
                web::scope("/api")
                    // Public reads
                    .service(
                        web::resource("/word-groups")
                            .guard(guard::Get())
                            .to(list_word_groups),
                    )
                    .service(
                        web::resource("/word-groups/{group_id}")
                            .guard(guard::Get())
                            .to(get_word_group),
                    )
                    .service(web::resource("/words").guard(guard::Get()).to(find_word))

                    // Writes (admins and authors)
                    .service(
                        web::resource("/word-groups")
                            .wrap(editors())
                            .wrap(bearer())
                            .route(web::post().to(create_word_group)),
                    )
                    .service(
                        web::resource("/word-groups/{group_id}")
                            .wrap(editors())
                            .wrap(bearer())
                            .route(web::patch().to(update_word_group))
                            .route(web::delete().to(delete_word_group)),
                    )
                    .service(
                        web::resource("/words")
                            .wrap(editors())
                            .wrap(bearer())
                            .route(web::post().to(create_word)),
                    )
                    .service(
                        web::resource("/words/{word_id}")
                            .wrap(editors())
                            .wrap(bearer())
                            .route(web::patch().to(update_word))
                            .route(web::delete().to(delete_word)),
                    )

                    // Account administration (admins)
                    .service(
                        web::resource("/users/{user_id}/ban")
                            .wrap(admins())
                            .wrap(bearer())
                            .route(web::put().to(set_user_ban)),
                    )
                    .service(
                        web::resource("/users/{user_id}/role")
                            .wrap(admins())
                            .wrap(bearer())
                            .route(web::put().to(set_user_role)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
