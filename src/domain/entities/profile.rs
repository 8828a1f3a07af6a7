//! Profile entity.
//!
//! Maps to the `profiles` table, one optional row per user.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::schema::{
    audit_columns, Column, ColumnType, Entity, EntitySchema, RelationDef, RelationKind,
};

pub(crate) static SCHEMA: EntitySchema = EntitySchema {
    table: "profiles",
    columns: audit_columns![
        Column::new("user_id", ColumnType::BigInt),
        Column::nullable("avatar", ColumnType::Text),
        Column::nullable("address", ColumnType::Text),
        Column::nullable("phone", ColumnType::Text),
        Column::nullable("description", ColumnType::Text),
        Column::nullable("gender", ColumnType::Text),
        Column::nullable("position", ColumnType::Text),
        Column::nullable("birthday", ColumnType::Date),
    ],
    relations: &[RelationDef {
        name: "user",
        kind: RelationKind::BelongsTo {
            local_key: "user_id",
        },
        target: || &super::user::SCHEMA,
    }],
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub avatar: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub gender: Option<String>,
    pub position: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Profile {
    fn schema() -> &'static EntitySchema {
        &SCHEMA
    }

    fn id(&self) -> i64 {
        self.id
    }
}
