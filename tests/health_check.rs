//! Integration tests for the health endpoint

use std::net::TcpListener;
use std::sync::Arc;
use wordgroups::auth::InMemoryRefreshTokenRepository;
use wordgroups::configuration::AuthSettings;
use wordgroups::dictionary::InMemoryDictionary;
use wordgroups::startup::{build_auth_components, build_dictionary, run};
use wordgroups::users::InMemoryUserRepository;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let settings = AuthSettings {
        access_token_secret: "health-check-secret-health-check-secret".to_string(),
        access_token_ttl_seconds: 900,
        refresh_token_ttl_days: 10,
        password_hash_cost: 4,
        issuer: "wordgroups".to_string(),
        purge_interval_seconds: 3600,
    };
    let components = build_auth_components(
        &settings,
        Arc::new(InMemoryUserRepository::new()),
        Arc::new(InMemoryRefreshTokenRepository::new()),
    );
    let dictionary = Arc::new(InMemoryDictionary::new());
    let server = run(
        listener,
        components,
        build_dictionary(dictionary.clone(), dictionary),
    )
    .expect("Failed to create server");

    let _ = tokio::spawn(async move {
        let _ = server.await;
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn responses_carry_request_id() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .header("x-request-id", "req-123")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(
        response.headers().get("x-request-id").unwrap().to_str().unwrap(),
        "req-123"
    );
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/does-not-exist", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}
