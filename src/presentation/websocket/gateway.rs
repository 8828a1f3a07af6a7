//! Connection Hub
//!
//! Tracks every open WebSocket by connection id and delivers outbound events
//! to it. The hub is the transport side of [`ConnectionPusher`]; which
//! connections belong to which user is the presence registry's concern.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::domain::ports::{ConnectionPusher, PushEvent};
use crate::infrastructure::metrics;

/// An open connection and its outbound queue
struct ConnectedClient {
    user_id: Option<i64>,
    sender: mpsc::UnboundedSender<PushEvent>,
}

/// All connections of this process
#[derive(Default)]
pub struct ConnectionHub {
    connections: DashMap<String, ConnectedClient>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly opened connection
    pub fn register(&self, connection_id: &str, sender: mpsc::UnboundedSender<PushEvent>) {
        self.connections.insert(
            connection_id.to_string(),
            ConnectedClient {
                user_id: None,
                sender,
            },
        );
        self.publish_gauge();
        tracing::debug!(connection_id, "Connection registered");
    }

    /// Mark a connection as authenticated
    pub fn authenticate(&self, connection_id: &str, user_id: i64) {
        if let Some(mut client) = self.connections.get_mut(connection_id) {
            client.user_id = Some(user_id);
        }
        self.publish_gauge();
    }

    /// Forget a connection
    pub fn unregister(&self, connection_id: &str) {
        if let Some((_, client)) = self.connections.remove(connection_id) {
            tracing::debug!(
                connection_id,
                user_id = ?client.user_id,
                "Connection unregistered"
            );
        }
        self.publish_gauge();
    }

    /// Queue an event for one connection; `false` if it is gone
    pub fn send(&self, connection_id: &str, event: PushEvent) -> bool {
        match self.connections.get(connection_id) {
            Some(client) => client.sender.send(event).is_ok(),
            None => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn authenticated_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|client| client.user_id.is_some())
            .count()
    }

    fn publish_gauge(&self) {
        metrics::set_websocket_connections(
            self.connection_count() as i64,
            self.authenticated_count() as i64,
        );
    }
}

#[async_trait]
impl ConnectionPusher for ConnectionHub {
    async fn push(&self, connection_id: &str, event: PushEvent) -> bool {
        let delivered = self.send(connection_id, event);
        if !delivered {
            tracing::debug!(connection_id, "Skipping closed connection");
        }
        delivered
    }
}
