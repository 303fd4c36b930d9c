//! Integration tests for the dictionary routes and account administration

use chrono::Utc;
use reqwest::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;
use wordgroups::auth::InMemoryRefreshTokenRepository;
use wordgroups::configuration::AuthSettings;
use wordgroups::dictionary::InMemoryDictionary;
use wordgroups::startup::{build_auth_components, build_dictionary, run};
use wordgroups::users::{InMemoryUserRepository, UserRepository, UserRole};

pub struct TestApp {
    pub address: String,
    pub users: Arc<InMemoryUserRepository>,
    pub client: reqwest::Client,
}

/// A registered account: access token plus the refresh cookie value
pub struct Session {
    pub access: String,
    pub refresh: String,
}

fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let settings = AuthSettings {
        access_token_secret: "dictionary-test-secret-dictionary-test".to_string(),
        access_token_ttl_seconds: 900,
        refresh_token_ttl_days: 10,
        password_hash_cost: 4,
        issuer: "wordgroups".to_string(),
        purge_interval_seconds: 3600,
    };
    let users = Arc::new(InMemoryUserRepository::new());
    let components = build_auth_components(
        &settings,
        users.clone(),
        Arc::new(InMemoryRefreshTokenRepository::new()),
    );
    let dictionary = Arc::new(InMemoryDictionary::new());
    let server = run(
        listener,
        components,
        build_dictionary(dictionary.clone(), dictionary),
    )
    .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        users,
        client: reqwest::Client::new(),
    }
}

fn refresh_cookie(response: &reqwest::Response) -> String {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix("refresh_token="))
        .and_then(|v| v.split(';').next())
        .unwrap_or_default()
        .to_string()
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn session(&self, email: &str, role: UserRole) -> Session {
        let response = self
            .client
            .post(&self.url("/api/auth/registration"))
            .json(&json!({ "email": email, "password": "pw1", "passwordConfirm": "pw1" }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);
        let refresh = refresh_cookie(&response);
        let body: Value = response.json().await.unwrap();

        if role != UserRole::Member {
            let record = self.users.find_by_email(email).await.unwrap().unwrap();
            self.users
                .update_role(record.user.id, role, Utc::now())
                .await
                .unwrap();
        }

        Session {
            access: body["access_token"].as_str().unwrap().to_string(),
            refresh,
        }
    }

    async fn user_id(&self, email: &str) -> String {
        let record = self.users.find_by_email(email).await.unwrap().unwrap();
        record.user.id.to_string()
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> reqwest::Response {
        let mut request = self.client.request(method, &self.url(path));
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        request.send().await.expect("Failed to execute request")
    }

    async fn create_group(&self, token: &str, main_word: &str) -> Value {
        let response = self
            .send(
                reqwest::Method::POST,
                "/api/word-groups",
                Some(token),
                Some(json!({ "name": format!("{} words", main_word), "mainWord": main_word })),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        response.json().await.unwrap()
    }

    async fn create_word(&self, token: &str, group_id: &str, text: &str) -> reqwest::Response {
        self.send(
            reqwest::Method::POST,
            "/api/words",
            Some(token),
            Some(json!({
                "group": group_id,
                "text": text,
                "transcription": format!("[{}]", text),
                "examples": [format!("The {} is here.", text)],
                "translations": [{ "language": "de", "translation": text.to_uppercase() }],
            })),
        )
        .await
    }
}

// --- Role gate ---

#[tokio::test]
async fn reads_are_public() {
    let app = spawn_app();

    let response = app
        .send(reqwest::Method::GET, "/api/word-groups", None, None)
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn writes_without_a_token_return_401() {
    let app = spawn_app();

    let response = app
        .send(
            reqwest::Method::POST,
            "/api/word-groups",
            None,
            Some(json!({ "name": "Animals", "mainWord": "animal" })),
        )
        .await;

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn members_cannot_write() {
    let app = spawn_app();
    let member = app.session("m@x.com", UserRole::Member).await;

    let response = app
        .send(
            reqwest::Method::POST,
            "/api/word-groups",
            Some(&member.access),
            Some(json!({ "name": "Animals", "mainWord": "animal" })),
        )
        .await;

    assert_eq!(response.status().as_u16(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn role_change_applies_to_an_existing_token() {
    let app = spawn_app();
    let admin = app.session("admin@x.com", UserRole::Admin).await;
    let member = app.session("m@x.com", UserRole::Member).await;
    let member_id = app.user_id("m@x.com").await;

    let response = app
        .send(
            reqwest::Method::PUT,
            &format!("/api/users/{}/role", member_id),
            Some(&admin.access),
            Some(json!({ "role": "author" })),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["role"], "author");

    app.create_group(&member.access, "animal").await;
}

// --- Word groups and words ---

#[tokio::test]
async fn author_builds_a_group_with_words() {
    let app = spawn_app();
    let author = app.session("author@x.com", UserRole::Author).await;

    let group = app.create_group(&author.access, "animal").await;
    let group_id = group["id"].as_str().unwrap().to_string();
    assert_eq!(group["is_published"], false);
    for text in ["cat", "dog"] {
        let response = app.create_word(&author.access, &group_id, text).await;
        assert_eq!(response.status().as_u16(), 201);
    }

    let response = app
        .send(
            reqwest::Method::GET,
            &format!("/api/word-groups/{}", group_id),
            None,
            None,
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["main_word"], "animal");
    assert_eq!(body["words"].as_array().unwrap().len(), 2);

    let response = app
        .send(reqwest::Method::GET, "/api/word-groups?type=full", None, None)
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body[0]["words"].as_array().unwrap().len(), 2);

    let response = app
        .send(reqwest::Method::GET, "/api/word-groups", None, None)
        .await;
    let body: Value = response.json().await.unwrap();
    assert!(body[0].get("words").is_none());

    let response = app
        .send(reqwest::Method::GET, "/api/words?text=cat", None, None)
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["translations"][0]["translation"], "CAT");
    assert_eq!(body["group_id"], group_id.as_str());
}

#[tokio::test]
async fn duplicates_return_409() {
    let app = spawn_app();
    let author = app.session("author@x.com", UserRole::Author).await;
    let group = app.create_group(&author.access, "animal").await;

    let response = app
        .send(
            reqwest::Method::POST,
            "/api/word-groups",
            Some(&author.access),
            Some(json!({ "name": "Other", "mainWord": "animal" })),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["message"],
        "Group with the main word 'animal' already exists"
    );

    let group_id = group["id"].as_str().unwrap();
    app.create_word(&author.access, group_id, "cat").await;
    let response = app.create_word(&author.access, group_id, "cat").await;
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn invalid_payloads_return_400_with_fields() {
    let app = spawn_app();
    let author = app.session("author@x.com", UserRole::Author).await;

    let response = app
        .send(
            reqwest::Method::POST,
            "/api/words",
            Some(&author.access),
            Some(json!({ "group": "not-an-id", "text": "" })),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["field"].as_str())
        .collect();
    assert!(fields.contains(&"group"));
    assert!(fields.contains(&"text"));

    let response = app
        .send(reqwest::Method::GET, "/api/word-groups/not-an-id", None, None)
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn word_in_unknown_group_returns_404() {
    let app = spawn_app();
    let author = app.session("author@x.com", UserRole::Author).await;

    let response = app
        .create_word(&author.access, &uuid_string(), "cat")
        .await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn only_admins_approve_groups() {
    let app = spawn_app();
    let admin = app.session("admin@x.com", UserRole::Admin).await;
    let author = app.session("author@x.com", UserRole::Author).await;
    let group = app.create_group(&author.access, "animal").await;
    let path = format!("/api/word-groups/{}", group["id"].as_str().unwrap());

    let response = app
        .send(
            reqwest::Method::PATCH,
            &path,
            Some(&author.access),
            Some(json!({ "isApproved": true })),
        )
        .await;
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .send(
            reqwest::Method::PATCH,
            &path,
            Some(&author.access),
            Some(json!({ "isPublished": true, "description": "Living things" })),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .send(
            reqwest::Method::PATCH,
            &path,
            Some(&admin.access),
            Some(json!({ "isApproved": true })),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["is_approved"], true);
    assert_eq!(body["is_published"], true);
    assert_eq!(body["description"], "Living things");
}

#[tokio::test]
async fn deleting_a_group_removes_its_words() {
    let app = spawn_app();
    let author = app.session("author@x.com", UserRole::Author).await;
    let group = app.create_group(&author.access, "animal").await;
    let group_id = group["id"].as_str().unwrap();
    app.create_word(&author.access, group_id, "cat").await;
    let path = format!("/api/word-groups/{}", group_id);

    for _ in 0..2 {
        let response = app
            .send(reqwest::Method::DELETE, &path, Some(&author.access), None)
            .await;
        assert_eq!(response.status().as_u16(), 204);
    }

    let response = app.send(reqwest::Method::GET, &path, None, None).await;
    assert_eq!(response.status().as_u16(), 404);
    let response = app
        .send(reqwest::Method::GET, "/api/words?text=cat", None, None)
        .await;
    assert_eq!(response.status().as_u16(), 404);
}

// --- Account administration ---

#[tokio::test]
async fn ban_ends_sessions_and_unban_restores_login() {
    let app = spawn_app();
    let admin = app.session("admin@x.com", UserRole::Admin).await;
    let member = app.session("m@x.com", UserRole::Member).await;
    let ban_path = format!("/api/users/{}/ban", app.user_id("m@x.com").await);

    let response = app
        .send(
            reqwest::Method::PUT,
            &ban_path,
            Some(&admin.access),
            Some(json!({ "banned": true })),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "banned");

    let response = app
        .client
        .post(&app.url("/api/auth/refresh"))
        .header(COOKIE, format!("refresh_token={}", member.refresh))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let login = json!({ "email": "m@x.com", "password": "pw1" });
    let response = app
        .send(reqwest::Method::POST, "/api/auth/login", None, Some(login.clone()))
        .await;
    assert_eq!(response.status().as_u16(), 401);

    let response = app
        .send(
            reqwest::Method::PUT,
            &ban_path,
            Some(&admin.access),
            Some(json!({ "banned": false })),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app
        .send(reqwest::Method::POST, "/api/auth/login", None, Some(login))
        .await;
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn administration_is_admin_only() {
    let app = spawn_app();
    let author = app.session("author@x.com", UserRole::Author).await;
    let target = format!("/api/users/{}/ban", app.user_id("author@x.com").await);

    let response = app
        .send(
            reqwest::Method::PUT,
            &target,
            Some(&author.access),
            Some(json!({ "banned": true })),
        )
        .await;

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn administration_of_unknown_user_returns_404() {
    let app = spawn_app();
    let admin = app.session("admin@x.com", UserRole::Admin).await;

    let response = app
        .send(
            reqwest::Method::PUT,
            &format!("/api/users/{}/role", uuid_string()),
            Some(&admin.access),
            Some(json!({ "role": "author" })),
        )
        .await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app
        .send(
            reqwest::Method::PUT,
            &format!("/api/users/{}/role", app.user_id("admin@x.com").await),
            Some(&admin.access),
            Some(json!({ "role": "owner" })),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

fn uuid_string() -> String {
    uuid::Uuid::new_v4().to_string()
}
