//! Generic Query Endpoint Tests

use axum::http::StatusCode;
use serde_json::json;

use crate::common::TestApp;

#[tokio::test]
async fn test_query_users_by_email() {
    let app = TestApp::new().await;
    let viewer = app.register_user().await;
    let target = app.register_user().await;

    let response = app
        .post(
            "/api/v1/users/query",
            json!({ "where": { "email": target.email } }),
            &viewer.access_token,
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 1);
    assert_eq!(response.body["data"][0]["id"], target.id);
    assert!(response.body["data"][0].get("password").is_none());
}

#[tokio::test]
async fn test_query_users_with_in_filter_and_pagination() {
    let app = TestApp::new().await;
    let a = app.register_user().await;
    let b = app.register_user().await;
    let c = app.register_user().await;

    let response = app
        .post(
            "/api/v1/users/query",
            json!({
                "where": { "id": { "in": [a.id, b.id, c.id] } },
                "sort": ["-id"],
                "page": 2,
                "pageSize": 2
            }),
            &a.access_token,
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 3);
    assert_eq!(response.body["page"], 2);
    let data = response.body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], a.id);
}

#[tokio::test]
async fn test_query_messages_with_or_branches() {
    let app = TestApp::new().await;
    let owner = app.register_user().await;
    let conversation_id = app.create_conversation(&owner, &[]).await;
    let uri = format!("/api/v1/conversations/{}/messages", conversation_id);
    for text in ["alpha", "beta", "gamma"] {
        app.post(&uri, json!({ "message": text }), &owner.access_token)
            .await;
    }

    let response = app
        .post(
            "/api/v1/messages/query",
            json!({
                "where": {
                    "and": [{ "conversation_id": conversation_id }],
                    "or": [{ "message": "alpha" }, { "message": { "contain": "AMM" } }]
                },
                "sort": ["message"]
            }),
            &owner.access_token,
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let texts: Vec<&str> = response.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["alpha", "gamma"]);
}

#[tokio::test]
async fn test_query_conversations_with_join() {
    let app = TestApp::new().await;
    let owner = app.register_user().await;
    let guest = app.register_user().await;
    let conversation_id = app.create_conversation(&owner, &[&guest]).await;

    let response = app
        .post(
            "/api/v1/conversations/query",
            json!({ "where": { "id": conversation_id }, "join": ["users"] }),
            &owner.access_token,
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"][0]["users"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_field_is_a_client_error() {
    let app = TestApp::new().await;
    let user = app.register_user().await;

    let response = app
        .post(
            "/api/v1/users/query",
            json!({ "where": { "nickname": "x" } }),
            &user.access_token,
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_operator_is_a_client_error() {
    let app = TestApp::new().await;
    let user = app.register_user().await;

    let response = app
        .post(
            "/api/v1/users/query",
            json!({ "where": { "name": { "like": "x" } } }),
            &user.access_token,
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_range_pagination_is_a_client_error() {
    let app = TestApp::new().await;
    let user = app.register_user().await;

    let huge_page = app
        .post(
            "/api/v1/users/query",
            json!({ "page": u64::MAX, "pageSize": 10 }),
            &user.access_token,
        )
        .await;
    assert_eq!(huge_page.status, StatusCode::BAD_REQUEST);

    let huge_size = app
        .post(
            "/api/v1/users/query",
            json!({ "pageSize": 100_000 }),
            &user.access_token,
        )
        .await;
    assert_eq!(huge_size.status, StatusCode::BAD_REQUEST);
}
