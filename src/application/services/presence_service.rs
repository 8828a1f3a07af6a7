//! Presence Registry
//!
//! Maps users to their live gateway connections. Each connection is one
//! `presences` row of kind [`SOCKET_ID_KIND`]; rows are written only after the
//! connection authenticated.

use serde::Serialize;
use tracing::{debug, instrument};

use super::record_service::{DeleteMode, RecordContext, RecordError, RecordService};
use crate::domain::ports::Document;
use crate::domain::query::{fields, FieldFilter, QueryRequest};
use crate::domain::{Presence, SOCKET_ID_KIND};

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    #[error("Presence not found")]
    NotFound,

    #[error("Permission denied")]
    Forbidden,

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Presence row changes; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdatePresenceDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Clone)]
pub struct PresenceRegistry {
    presences: RecordService<Presence>,
}

impl PresenceRegistry {
    pub fn new(ctx: &RecordContext) -> Self {
        Self {
            presences: RecordService::new(ctx),
        }
    }

    /// Records a live connection for an authenticated user.
    ///
    /// Registering the same pair twice stores two rows.
    #[instrument(skip(self))]
    pub async fn register_connection(
        &self,
        user_id: i64,
        connection_id: &str,
    ) -> Result<Presence, PresenceError> {
        Ok(self
            .presences
            .create_one(Presence::socket(user_id, connection_id))
            .await?)
    }

    /// Connection ids of the given users.
    pub async fn resolve_connections(&self, user_ids: &[i64]) -> Result<Vec<String>, PresenceError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let request = QueryRequest::new()
            .matching(fields([
                ("user_id", FieldFilter::is_in(user_ids.iter().copied())),
                ("kind", FieldFilter::eq(SOCKET_ID_KIND)),
            ]))
            .select(["connection_id"]);

        let connections: Vec<String> = self
            .presences
            .find_all(&request)
            .await?
            .into_iter()
            .map(|p| p.connection_id)
            .collect();
        debug!(users = user_ids.len(), connections = connections.len(), "Resolved connections");
        Ok(connections)
    }

    /// Removes every row for the pair. Returns how many were removed.
    #[instrument(skip(self))]
    pub async fn remove_connection(
        &self,
        user_id: i64,
        connection_id: &str,
    ) -> Result<usize, PresenceError> {
        let request = QueryRequest::new().matching(fields([
            ("user_id", FieldFilter::eq(user_id)),
            ("connection_id", FieldFilter::eq(connection_id)),
        ]));

        Ok(self
            .presences
            .delete_many(&request, DeleteMode::Hard)
            .await?
            .map_or(0, |removed| removed.len()))
    }

    // ========================================================================
    // Row management
    // ========================================================================

    pub async fn list(&self, user_id: i64) -> Result<Vec<Presence>, PresenceError> {
        let request = QueryRequest::new()
            .matching(fields([("user_id", FieldFilter::eq(user_id))]))
            .sort(["-id"]);
        Ok(self.presences.find_all(&request).await?)
    }

    pub async fn get(&self, id: i64, user_id: i64) -> Result<Presence, PresenceError> {
        let presence = self
            .presences
            .find_one_by_id(id)
            .await?
            .ok_or(PresenceError::NotFound)?;
        if presence.user_id != user_id {
            return Err(PresenceError::Forbidden);
        }
        Ok(presence)
    }

    pub async fn create(
        &self,
        user_id: i64,
        kind: &str,
        connection_id: &str,
    ) -> Result<Presence, PresenceError> {
        let presence = Presence {
            kind: kind.to_string(),
            ..Presence::socket(user_id, connection_id)
        };
        Ok(self.presences.create_one(presence).await?)
    }

    pub async fn update(
        &self,
        id: i64,
        user_id: i64,
        dto: UpdatePresenceDto,
    ) -> Result<Presence, PresenceError> {
        let presence = self.get(id, user_id).await?;
        let patch: Document = match serde_json::to_value(dto) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Document::new(),
        };
        if patch.is_empty() {
            return Ok(presence);
        }
        Ok(self.presences.update_one_by_id(presence.id, patch).await?)
    }

    pub async fn delete(&self, id: i64, user_id: i64) -> Result<(), PresenceError> {
        let presence = self.get(id, user_id).await?;
        self.presences
            .delete_one_by_id(presence.id, DeleteMode::Hard)
            .await?
            .map(|_| ())
            .ok_or(PresenceError::NotFound)
    }
}
