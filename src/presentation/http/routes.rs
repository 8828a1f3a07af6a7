//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::auth_middleware;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        // WebSocket gateway; the token travels in the query string
        .route("/ws", get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

/// API v1 routes
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Public routes
        .nest("/auth", auth_routes())
        // Protected routes (require authentication)
        .merge(
            Router::new()
                .merge(user_routes())
                .merge(conversation_routes())
                .merge(message_routes())
                .merge(link_routes())
                .merge(presence_routes())
                .route_layer(middleware::from_fn_with_state(state, auth_middleware)),
        )
}

/// Authentication routes (public)
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh_token))
        .route("/logout", post(handlers::auth::logout))
}

/// User and profile routes
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(handlers::user::list_users))
        .route("/users/query", post(handlers::query::query_users))
        .route(
            "/users/@me",
            get(handlers::user::get_current_user)
                .patch(handlers::user::update_current_user)
                .delete(handlers::user::delete_current_user),
        )
        .route(
            "/users/@me/conversations",
            get(handlers::user::get_current_user_conversations),
        )
        .route("/users/@me/password", post(handlers::user::change_password))
        .route(
            "/users/@me/profile",
            get(handlers::profile::get_profile)
                .post(handlers::profile::create_profile)
                .patch(handlers::profile::update_profile)
                .delete(handlers::profile::delete_profile),
        )
        .route("/users/{user_id}", get(handlers::user::get_user))
}

/// Conversation routes
fn conversation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations",
            get(handlers::conversation::list_conversations)
                .post(handlers::conversation::create_conversation),
        )
        .route(
            "/conversations/query",
            post(handlers::query::query_conversations),
        )
        .route(
            "/conversations/{conversation_id}",
            get(handlers::conversation::get_conversation)
                .patch(handlers::conversation::update_conversation)
                .delete(handlers::conversation::delete_conversation),
        )
        .route(
            "/conversations/{conversation_id}/participants",
            get(handlers::conversation::get_participants),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            get(handlers::message::get_messages).post(handlers::message::send_message),
        )
}

/// Message routes
fn message_routes() -> Router<AppState> {
    Router::new()
        .route("/messages/query", post(handlers::query::query_messages))
        .route(
            "/messages/{message_id}",
            get(handlers::message::get_message)
                .patch(handlers::message::update_message)
                .delete(handlers::message::delete_message),
        )
}

/// User-conversation link routes
fn link_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/user-conversations",
            get(handlers::user_conversation::list_links),
        )
        .route(
            "/user-conversations/last-message",
            patch(handlers::user_conversation::update_last_message),
        )
        .route(
            "/user-conversations/{link_id}",
            get(handlers::user_conversation::get_link)
                .patch(handlers::user_conversation::update_link)
                .delete(handlers::user_conversation::delete_link),
        )
}

/// Presence routes
fn presence_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/presences",
            get(handlers::presence::list_presences).post(handlers::presence::create_presence),
        )
        .route(
            "/presences/{presence_id}",
            get(handlers::presence::get_presence)
                .patch(handlers::presence::update_presence)
                .delete(handlers::presence::delete_presence),
        )
}
