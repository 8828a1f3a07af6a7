//! User, Profile and Presence API Tests

use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::common::{TestApp, TEST_PASSWORD};

#[tokio::test]
async fn test_get_and_update_current_user() {
    let app = TestApp::new().await;
    let user = app.register_user().await;

    let me = app.get("/api/v1/users/@me", &user.access_token).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["id"], user.id);
    assert!(me.body.get("password").is_none());

    let updated = app
        .patch(
            "/api/v1/users/@me",
            json!({ "name": "Renamed" }),
            &user.access_token,
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["name"], "Renamed");
}

#[tokio::test]
async fn test_current_user_with_conversations() {
    let app = TestApp::new().await;
    let user = app.register_user().await;
    let conversation_id = app.create_conversation(&user, &[]).await;

    let response = app
        .get("/api/v1/users/@me/conversations", &user.access_token)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["conversations"][0]["id"], conversation_id);
}

#[tokio::test]
async fn test_change_password_rules() {
    let app = TestApp::new().await;
    let user = app.register_user().await;

    let wrong_old = app
        .post(
            "/api/v1/users/@me/password",
            json!({ "old_password": "NotMyPassword1", "new_password": "NewPassword123" }),
            &user.access_token,
        )
        .await;
    assert_eq!(wrong_old.status, StatusCode::BAD_REQUEST);

    let same = app
        .post(
            "/api/v1/users/@me/password",
            json!({ "old_password": TEST_PASSWORD, "new_password": TEST_PASSWORD }),
            &user.access_token,
        )
        .await;
    assert_eq!(same.status, StatusCode::BAD_REQUEST);

    let changed = app
        .post(
            "/api/v1/users/@me/password",
            json!({ "old_password": TEST_PASSWORD, "new_password": "NewPassword123" }),
            &user.access_token,
        )
        .await;
    assert_eq!(changed.status, StatusCode::NO_CONTENT);

    let login = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": user.email, "password": "NewPassword123" })),
            None,
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn test_get_user_by_id() {
    let app = TestApp::new().await;
    let viewer = app.register_user().await;
    let other = app.register_user().await;

    let found = app
        .get(&format!("/api/v1/users/{}", other.id), &viewer.access_token)
        .await;
    assert_eq!(found.status, StatusCode::OK);
    assert_eq!(found.body["email"], other.email.as_str());

    let missing = app.get("/api/v1/users/1", &viewer.access_token).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_lifecycle() {
    let app = TestApp::new().await;
    let user = app.register_user().await;
    let uri = "/api/v1/users/@me/profile";

    assert_eq!(
        app.get(uri, &user.access_token).await.status,
        StatusCode::NOT_FOUND
    );

    let created = app
        .post(
            uri,
            json!({ "phone": "555-0100", "birthday": "1990-04-01" }),
            &user.access_token,
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["phone"], "555-0100");

    let duplicate = app
        .post(uri, json!({ "phone": "555-0199" }), &user.access_token)
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let bad_avatar = app
        .patch(uri, json!({ "avatar": "not a url" }), &user.access_token)
        .await;
    assert_eq!(bad_avatar.status, StatusCode::BAD_REQUEST);

    let updated = app
        .patch(uri, json!({ "position": "Engineer" }), &user.access_token)
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["position"], "Engineer");
    assert_eq!(updated.body["phone"], "555-0100");

    assert_eq!(
        app.delete(uri, &user.access_token).await.status,
        StatusCode::NO_CONTENT
    );
}

#[tokio::test]
async fn test_presence_rows_belong_to_their_user() {
    let app = TestApp::new().await;
    let user = app.register_user().await;
    let other = app.register_user().await;

    let created = app
        .post(
            "/api/v1/presences",
            json!({ "kind": "device", "connection_id": "phone-1" }),
            &user.access_token,
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let uri = format!("/api/v1/presences/{}", created.body["id"]);

    let listed = app.get("/api/v1/presences", &user.access_token).await;
    assert_eq!(listed.body.as_array().unwrap().len(), 1);

    assert_eq!(
        app.get(&uri, &other.access_token).await.status,
        StatusCode::FORBIDDEN
    );

    let updated = app
        .patch(&uri, json!({ "active": false }), &user.access_token)
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["active"], false);

    assert_eq!(
        app.delete(&uri, &user.access_token).await.status,
        StatusCode::NO_CONTENT
    );
}
