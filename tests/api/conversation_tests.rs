//! Conversation API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::TestApp;

#[tokio::test]
async fn test_create_conversation_links_every_participant() {
    let app = TestApp::new().await;
    let owner = app.register_user().await;
    let guest = app.register_user().await;

    let conversation_id = app.create_conversation(&owner, &[&guest]).await;

    let response = app
        .get(
            &format!("/api/v1/conversations/{}/participants", conversation_id),
            &guest.access_token,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let mut ids: Vec<i64> = serde_json::from_value(response.body).unwrap();
    ids.sort_unstable();
    let mut expected = vec![owner.id, guest.id];
    expected.sort_unstable();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_create_conversation_with_unknown_participant_fails() {
    let app = TestApp::new().await;
    let owner = app.register_user().await;

    let response = app
        .post(
            "/api/v1/conversations",
            json!({ "title": "Ghosts", "participant_ids": [42] }),
            &owner.access_token,
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_outsider_cannot_read_conversation() {
    let app = TestApp::new().await;
    let owner = app.register_user().await;
    let outsider = app.register_user().await;
    let conversation_id = app.create_conversation(&owner, &[]).await;

    let response = app
        .get(
            &format!("/api/v1/conversations/{}", conversation_id),
            &outsider.access_token,
        )
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_get_conversation_includes_participants_without_passwords() {
    let app = TestApp::new().await;
    let owner = app.register_user().await;
    let guest = app.register_user().await;
    let conversation_id = app.create_conversation(&owner, &[&guest]).await;

    let response = app
        .get(
            &format!("/api/v1/conversations/{}", conversation_id),
            &owner.access_token,
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let users = response.body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("password").is_none()));
}

#[tokio::test]
async fn test_list_update_and_delete_conversation() {
    let app = TestApp::new().await;
    let owner = app.register_user().await;
    let conversation_id = app.create_conversation(&owner, &[]).await;
    app.create_conversation(&owner, &[]).await;

    let list = app
        .get("/api/v1/conversations?page=1&pageSize=1", &owner.access_token)
        .await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.body["total"], 2);
    assert_eq!(list.body["pageSize"], 1);
    assert_eq!(list.body["data"].as_array().unwrap().len(), 1);

    let updated = app
        .patch(
            &format!("/api/v1/conversations/{}", conversation_id),
            json!({ "title": "Renamed" }),
            &owner.access_token,
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["title"], "Renamed");

    let deleted = app
        .delete(
            &format!("/api/v1/conversations/{}", conversation_id),
            &owner.access_token,
        )
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = app
        .get(
            &format!("/api/v1/conversations/{}", conversation_id),
            &owner.access_token,
        )
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_links_track_last_message_and_flags() {
    let app = TestApp::new().await;
    let owner = app.register_user().await;
    let conversation_id = app.create_conversation(&owner, &[]).await;

    let links = app
        .get("/api/v1/user-conversations", &owner.access_token)
        .await;
    assert_eq!(links.status, StatusCode::OK);
    let link_id = links.body[0]["id"].as_i64().unwrap();
    assert_eq!(links.body[0]["conversation_id"], conversation_id);

    let pointer = app
        .patch(
            "/api/v1/user-conversations/last-message",
            json!({ "conversation_id": conversation_id, "last_message_id": 7 }),
            &owner.access_token,
        )
        .await;
    assert_eq!(pointer.status, StatusCode::OK);
    assert_eq!(pointer.body["last_message_id"], 7);

    let muted = app
        .patch(
            &format!("/api/v1/user-conversations/{}", link_id),
            json!({ "mute": true }),
            &owner.access_token,
        )
        .await;
    assert_eq!(muted.status, StatusCode::OK);
    assert_eq!(muted.body["mute"], true);
}
