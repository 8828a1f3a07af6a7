//! Gateway Authentication and Fan-out Tests
//!
//! Drives the gateway entry points directly with in-process channels in
//! place of sockets.

use serde_json::json;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

use chat_backend::application::services::MESSAGE_RECEIVED_EVENT;
use chat_backend::domain::ports::PushEvent;
use chat_backend::presentation::websocket::{
    authenticate_connection, disconnect, handle_frame, GatewayError, SessionState,
};

use crate::common::{TestApp, TestUser};

struct Client {
    session: SessionState,
    rx: mpsc::UnboundedReceiver<PushEvent>,
}

impl Client {
    fn drain(&mut self) -> Vec<PushEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

async fn connect(app: &TestApp, user: &TestUser) -> Client {
    let connection_id = uuid::Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::unbounded_channel();
    app.state.hub.register(&connection_id, tx);

    let user_id = assert_ok!(
        authenticate_connection(&app.state, &connection_id, Some(user.access_token.as_str())).await
    );
    assert_eq!(user_id, user.id);

    let mut session = SessionState::new(connection_id);
    session.authenticate(user_id);
    Client { session, rx }
}

fn message_frame(user: &TestUser, conversation_id: i64, text: &str) -> String {
    json!({
        "event": "messages",
        "data": {
            "message": text,
            "conversation_id": conversation_id,
            "user_id": user.id
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_message_reaches_every_participant_connection() {
    let app = TestApp::new().await;
    let alice = app.register_user().await;
    let bob = app.register_user().await;
    let conversation_id = app.create_conversation(&alice, &[&bob]).await;

    let mut alice_client = connect(&app, &alice).await;
    let mut bob_phone = connect(&app, &bob).await;
    let mut bob_laptop = connect(&app, &bob).await;

    assert_ok!(
        handle_frame(
            &app.state,
            &alice_client.session,
            &message_frame(&alice, conversation_id, "hi bob"),
        )
        .await
    );

    for client in [&mut alice_client, &mut bob_phone, &mut bob_laptop] {
        let events = client.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, MESSAGE_RECEIVED_EVENT);
        assert_eq!(events[0].data["message"], "hi bob");
        assert_eq!(events[0].data["user_id"], alice.id);
        assert!(events[0].data["createdAt"].is_string());
    }

    // Persisted and the sender's pointer moved
    let history = app
        .get(
            &format!("/api/v1/conversations/{}/messages", conversation_id),
            &bob.access_token,
        )
        .await;
    assert_eq!(history.body["total"], 1);
    let message_id = history.body["data"][0]["id"].clone();

    let links = app
        .get("/api/v1/user-conversations", &alice.access_token)
        .await;
    assert_eq!(links.body[0]["last_message_id"], message_id);
}

#[tokio::test]
async fn test_offline_participant_still_gets_history() {
    let app = TestApp::new().await;
    let alice = app.register_user().await;
    let bob = app.register_user().await;
    let conversation_id = app.create_conversation(&alice, &[&bob]).await;

    let mut alice_client = connect(&app, &alice).await;

    assert_ok!(
        handle_frame(
            &app.state,
            &alice_client.session,
            &message_frame(&alice, conversation_id, "are you there?"),
        )
        .await
    );
    assert_eq!(alice_client.drain().len(), 1);

    let history = app
        .get(
            &format!("/api/v1/conversations/{}/messages", conversation_id),
            &bob.access_token,
        )
        .await;
    assert_eq!(history.body["data"][0]["message"], "are you there?");
}

#[tokio::test]
async fn test_disconnect_stops_delivery() {
    let app = TestApp::new().await;
    let alice = app.register_user().await;
    let bob = app.register_user().await;
    let conversation_id = app.create_conversation(&alice, &[&bob]).await;

    let alice_client = connect(&app, &alice).await;
    let mut bob_client = connect(&app, &bob).await;
    disconnect(&app.state, &bob_client.session).await;

    assert_ok!(
        handle_frame(
            &app.state,
            &alice_client.session,
            &message_frame(&alice, conversation_id, "bye"),
        )
        .await
    );

    assert!(bob_client.drain().is_empty());
    assert_eq!(app.state.hub.authenticated_count(), 1);
}

#[tokio::test]
async fn test_connection_without_valid_token_is_rejected() {
    let app = TestApp::new().await;

    let missing = authenticate_connection(&app.state, "conn-1", None).await;
    assert!(matches!(missing, Err(GatewayError::Unauthorized)));

    let invalid = authenticate_connection(&app.state, "conn-2", Some("garbage")).await;
    assert!(matches!(invalid, Err(GatewayError::Unauthorized)));
}

#[tokio::test]
async fn test_unauthenticated_session_cannot_send() {
    let app = TestApp::new().await;
    let alice = app.register_user().await;
    let conversation_id = app.create_conversation(&alice, &[]).await;
    let session = SessionState::new("anonymous".to_string());

    let result = handle_frame(
        &app.state,
        &session,
        &message_frame(&alice, conversation_id, "sneaky"),
    )
    .await;

    assert!(matches!(result, Err(GatewayError::Unauthorized)));
}

#[tokio::test]
async fn test_sender_must_match_connection_user() {
    let app = TestApp::new().await;
    let alice = app.register_user().await;
    let bob = app.register_user().await;
    let conversation_id = app.create_conversation(&alice, &[&bob]).await;
    let alice_client = connect(&app, &alice).await;

    let result = handle_frame(
        &app.state,
        &alice_client.session,
        &message_frame(&bob, conversation_id, "impersonation"),
    )
    .await;

    assert!(matches!(result, Err(GatewayError::SenderMismatch)));
}

#[tokio::test]
async fn test_unknown_conversation_and_bad_frames() {
    let app = TestApp::new().await;
    let alice = app.register_user().await;
    let alice_client = connect(&app, &alice).await;

    let missing = handle_frame(
        &app.state,
        &alice_client.session,
        &message_frame(&alice, 999, "hello?"),
    )
    .await;
    let err = assert_err!(missing);
    assert_eq!(err.to_event().event, "exception");
    assert_eq!(err.to_event().data["message"], "Conversation not found");

    let garbled = handle_frame(&app.state, &alice_client.session, "{not json").await;
    assert!(matches!(garbled, Err(GatewayError::InvalidFrame(_))));

    let unknown = handle_frame(
        &app.state,
        &alice_client.session,
        r#"{"event":"typing","data":{}}"#,
    )
    .await;
    assert!(matches!(unknown, Err(GatewayError::UnknownEvent(_))));
}
