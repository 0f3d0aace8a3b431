#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::AUTHORIZATION},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use filmstrip::clock::ManualClock;
use filmstrip::db::{Database, UserRepository, UserRole};
use filmstrip::{ServerConfig, create_app};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789abcdef";

pub struct TestApp {
    pub router: Router,
    pub db: Database,
    pub clock: Arc<ManualClock>,
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(|config| config).await
}

pub async fn create_test_app_with(
    customize: impl FnOnce(ServerConfig) -> ServerConfig,
) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let config = ServerConfig::new(db.clone(), ACCESS_SECRET.to_vec(), REFRESH_SECRET.to_vec())
        .with_clock(clock.clone())
        .with_hash_rounds(4);
    let config = customize(config);

    TestApp {
        router: create_app(&config),
        db,
        clock,
    }
}

pub fn basic(email: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{email}:{password}")))
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

impl TestApp {
    /// Send a request and return the status and the JSON body (`Null` if empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn post(&self, uri: &str, authorization: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        authorization: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn get(&self, uri: &str, authorization: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Register a user and log in. Returns (access token, refresh token).
    pub async fn register_and_login(&self, email: &str, password: &str) -> (String, String) {
        let (status, _) = self
            .post("/auth/register", Some(&basic(email, password)))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        self.login(email, password).await
    }

    pub async fn login(&self, email: &str, password: &str) -> (String, String) {
        let (status, json) = self.post("/auth/login", Some(&basic(email, password))).await;
        assert_eq!(status, StatusCode::OK);
        (
            json["accessToken"].as_str().unwrap().to_string(),
            json["refreshToken"].as_str().unwrap().to_string(),
        )
    }

    /// Register an admin and return its access token.
    pub async fn admin_token(&self) -> String {
        let (status, json) = self
            .post("/auth/register", Some(&basic("admin@example.com", "secret")))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = json["id"].as_i64().unwrap();
        self.db.users().set_role(id, UserRole::Admin).await.unwrap();
        self.login("admin@example.com", "secret").await.0
    }

    pub async fn create_movie(&self, admin: &str, title: &str) -> i64 {
        let (status, json) = self
            .post_json(
                "/movies",
                Some(&bearer(admin)),
                serde_json::json!({ "title": title }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        json["id"].as_i64().unwrap()
    }
}
