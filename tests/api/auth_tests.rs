//! Authentication API Tests

use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::common::{unique_email, TestApp, TEST_PASSWORD};

#[tokio::test]
async fn test_register_with_valid_data() {
    let app = TestApp::new().await;
    let email = unique_email();

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({ "name": "Ann", "email": email, "password": TEST_PASSWORD })),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["user"]["email"], email.as_str());
    assert_eq!(response.body["token_type"], "Bearer");
    assert!(response.body["access_token"].is_string());
    assert!(response.body["user"].get("password").is_none());
}

#[tokio::test]
async fn test_register_with_invalid_email_fails() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({ "name": "Ann", "email": "not-an-email", "password": TEST_PASSWORD })),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["errors"][0]["field"], "email");
}

#[tokio::test]
async fn test_register_with_short_password_fails() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({ "name": "Ann", "email": unique_email(), "password": "short" })),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_with_duplicate_email_fails() {
    let app = TestApp::new().await;
    let user = app.register_user().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            Some(json!({
                "name": "Someone Else",
                "email": user.email.to_uppercase(),
                "password": TEST_PASSWORD
            })),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_with_valid_credentials() {
    let app = TestApp::new().await;
    let user = app.register_user().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": user.email, "password": TEST_PASSWORD })),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user"]["id"], user.id);
}

#[tokio::test]
async fn test_login_with_wrong_password_fails() {
    let app = TestApp::new().await;
    let user = app.register_user().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": user.email, "password": "WrongPassword1!" })),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Invalid email or password");
}

#[tokio::test]
async fn test_refresh_token_rotates() {
    let app = TestApp::new().await;
    let user = app.register_user().await;

    let first = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            Some(json!({ "refresh_token": user.refresh_token })),
            None,
        )
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_ne!(first.body["refresh_token"], user.refresh_token.as_str());

    // A used refresh token cannot be replayed
    let replay = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            Some(json!({ "refresh_token": user.refresh_token })),
            None,
        )
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let app = TestApp::new().await;
    let user = app.register_user().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/logout",
            Some(json!({ "refresh_token": user.refresh_token })),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let refresh = app
        .request(
            Method::POST,
            "/api/v1/auth/refresh",
            Some(json!({ "refresh_token": user.refresh_token })),
            None,
        )
        .await;
    assert_eq!(refresh.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = TestApp::new().await;

    let missing = app
        .request(Method::GET, "/api/v1/users/@me", None, None)
        .await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let invalid = app.get("/api/v1/users/@me", "not-a-jwt").await;
    assert_eq!(invalid.status, StatusCode::UNAUTHORIZED);
    assert_eq!(invalid.body["message"], "Invalid token");
}
