#![allow(dead_code)]

//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use fake::faker::name::en::Name;
use fake::Fake;
use serde_json::{json, Value};
use tower::ServiceExt;

use chat_backend::config::Settings;
use chat_backend::startup::{build_router, AppState};

pub const TEST_JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Response status plus decoded JSON body (`Null` when empty)
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Test application over the in-memory store
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let settings = Settings::with_defaults(TEST_JWT_SECRET).expect("test settings");
        let state = AppState::in_memory(settings);

        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, None, Some(token)).await
    }

    pub async fn post(&self, uri: &str, body: Value, token: &str) -> TestResponse {
        self.request(Method::POST, uri, Some(body), Some(token)).await
    }

    pub async fn patch(&self, uri: &str, body: Value, token: &str) -> TestResponse {
        self.request(Method::PATCH, uri, Some(body), Some(token)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None, Some(token)).await
    }

    /// Register a fresh user; returns its id and access token
    pub async fn register_user(&self) -> TestUser {
        let email = unique_email();
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                Some(json!({
                    "name": Name().fake::<String>(),
                    "email": email,
                    "password": TEST_PASSWORD,
                })),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);

        TestUser {
            id: response.body["user"]["id"].as_i64().unwrap(),
            email,
            access_token: response.body["access_token"].as_str().unwrap().to_string(),
            refresh_token: response.body["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    /// Conversation created by `owner` with `others` as participants
    pub async fn create_conversation(&self, owner: &TestUser, others: &[&TestUser]) -> i64 {
        let ids: Vec<i64> = others.iter().map(|u| u.id).collect();
        let response = self
            .post(
                "/api/v1/conversations",
                json!({ "title": "Test conversation", "participant_ids": ids }),
                &owner.access_token,
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_i64().unwrap()
    }
}

pub const TEST_PASSWORD: &str = "TestPassword123!";

/// Registered test user
pub struct TestUser {
    pub id: i64,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Generate a unique test email
pub fn unique_email() -> String {
    format!("test_{}@example.com", uuid::Uuid::new_v4())
}
