//! Presence rows.
//!
//! Maps to the `presences` table. One row per live gateway connection of a
//! user; the registry is the only writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::schema::{audit_columns, Column, ColumnType, Entity, EntitySchema};

pub(crate) static SCHEMA: EntitySchema = EntitySchema {
    table: "presences",
    columns: audit_columns![
        Column::new("user_id", ColumnType::BigInt),
        Column::new("kind", ColumnType::Text),
        Column::new("active", ColumnType::Boolean),
        Column::new("connection_id", ColumnType::Text),
    ],
    relations: &[],
};

/// Kind of presence row written for gateway connections.
pub const SOCKET_ID_KIND: &str = "socket_id";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Presence {
    pub id: i64,
    pub user_id: i64,
    /// Row kind; gateway connections use [`SOCKET_ID_KIND`]
    pub kind: String,
    pub active: bool,
    /// Gateway connection id
    pub connection_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Presence {
    /// Active socket row for a connection.
    pub fn socket(user_id: i64, connection_id: impl Into<String>) -> Self {
        Self {
            user_id,
            kind: SOCKET_ID_KIND.to_string(),
            active: true,
            connection_id: connection_id.into(),
            ..Self::default()
        }
    }
}

impl Entity for Presence {
    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> i64 {
        self.id
    }
}
