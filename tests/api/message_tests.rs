//! Message API Tests

use axum::http::StatusCode;
use serde_json::json;

use crate::common::TestApp;

#[tokio::test]
async fn test_send_and_list_messages_newest_first() {
    let app = TestApp::new().await;
    let owner = app.register_user().await;
    let guest = app.register_user().await;
    let conversation_id = app.create_conversation(&owner, &[&guest]).await;
    let uri = format!("/api/v1/conversations/{}/messages", conversation_id);

    for text in ["first", "second", "third"] {
        let response = app
            .post(&uri, json!({ "message": text }), &owner.access_token)
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.body["user_id"], owner.id);
    }

    let history = app.get(&uri, &guest.access_token).await;
    assert_eq!(history.status, StatusCode::OK);
    assert_eq!(history.body["total"], 3);
    assert_eq!(history.body["pageSize"], 30);
    assert_eq!(history.body["data"][0]["message"], "third");
    assert_eq!(history.body["data"][2]["message"], "first");
}

#[tokio::test]
async fn test_outsider_cannot_post() {
    let app = TestApp::new().await;
    let owner = app.register_user().await;
    let outsider = app.register_user().await;
    let conversation_id = app.create_conversation(&owner, &[]).await;

    let response = app
        .post(
            &format!("/api/v1/conversations/{}/messages", conversation_id),
            json!({ "message": "let me in" }),
            &outsider.access_token,
        )
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let app = TestApp::new().await;
    let owner = app.register_user().await;
    let conversation_id = app.create_conversation(&owner, &[]).await;

    let response = app
        .post(
            &format!("/api/v1/conversations/{}/messages", conversation_id),
            json!({ "message": "" }),
            &owner.access_token,
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_author_edits_and_deletes() {
    let app = TestApp::new().await;
    let owner = app.register_user().await;
    let guest = app.register_user().await;
    let conversation_id = app.create_conversation(&owner, &[&guest]).await;

    let sent = app
        .post(
            &format!("/api/v1/conversations/{}/messages", conversation_id),
            json!({ "message": "hello" }),
            &owner.access_token,
        )
        .await;
    let uri = format!("/api/v1/messages/{}", sent.body["id"]);

    let hijack = app
        .patch(&uri, json!({ "message": "edited" }), &guest.access_token)
        .await;
    assert_eq!(hijack.status, StatusCode::FORBIDDEN);

    // Any participant may mark the message as read
    let read = app
        .patch(&uri, json!({ "status": true }), &guest.access_token)
        .await;
    assert_eq!(read.status, StatusCode::OK);
    assert_eq!(read.body["status"], true);

    let edited = app
        .patch(&uri, json!({ "message": "edited" }), &owner.access_token)
        .await;
    assert_eq!(edited.body["message"], "edited");

    assert_eq!(
        app.delete(&uri, &guest.access_token).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.delete(&uri, &owner.access_token).await.status,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        app.get(&uri, &owner.access_token).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_history_rejects_out_of_range_page() {
    let app = TestApp::new().await;
    let owner = app.register_user().await;
    let conversation_id = app.create_conversation(&owner, &[]).await;

    let response = app
        .get(
            &format!(
                "/api/v1/conversations/{}/messages?page={}&pageSize=30",
                conversation_id,
                u64::MAX
            ),
            &owner.access_token,
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
