//! Entity metadata.
//!
//! Every persisted type describes its table, columns and relations with a
//! static [`EntitySchema`]. The query compiler validates paths against it and
//! storage adapters use it to build statements and expand relations.

use serde::{de::DeserializeOwned, Serialize};

/// Column type, used by adapters for casts and comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Integer,
    Text,
    Boolean,
    Timestamp,
    Date,
}

impl ColumnType {
    /// Postgres type name.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::BigInt => "BIGINT",
            Self::Integer => "INTEGER",
            Self::Text => "TEXT",
            Self::Boolean => "BOOLEAN",
            Self::Timestamp => "TIMESTAMPTZ",
            Self::Date => "DATE",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
        }
    }

    pub const fn nullable(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
        }
    }
}

/// How a relation's rows are found.
#[derive(Debug, Clone, Copy)]
pub enum RelationKind {
    /// Target rows whose `foreign_key` equals this row's id.
    HasMany { foreign_key: &'static str },
    /// The target row whose id equals this row's `local_key`.
    BelongsTo { local_key: &'static str },
    /// Target rows linked through a join table.
    ManyToMany {
        through: &'static str,
        local_key: &'static str,
        foreign_key: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct RelationDef {
    pub name: &'static str,
    pub kind: RelationKind,
    pub target: fn() -> &'static EntitySchema,
}

impl RelationDef {
    /// Whether the relation expands into a list.
    pub fn is_many(&self) -> bool {
        !matches!(self.kind, RelationKind::BelongsTo { .. })
    }
}

#[derive(Debug)]
pub struct EntitySchema {
    pub table: &'static str,
    pub columns: &'static [Column],
    pub relations: &'static [RelationDef],
}

impl EntitySchema {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }
}

/// Columns every entity carries.
macro_rules! audit_columns {
    ($($column:expr),* $(,)?) => {
        &[
            $crate::domain::schema::Column::new("id", $crate::domain::schema::ColumnType::BigInt),
            $($column,)*
            $crate::domain::schema::Column::new("created_at", $crate::domain::schema::ColumnType::Timestamp),
            $crate::domain::schema::Column::new("updated_at", $crate::domain::schema::ColumnType::Timestamp),
            $crate::domain::schema::Column::nullable("deleted_at", $crate::domain::schema::ColumnType::Timestamp),
        ]
    };
}

pub(crate) use audit_columns;

/// A persisted record handled by the generic record service.
///
/// Implementors deserialize with `#[serde(default)]` so projected reads can
/// omit columns.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn schema() -> &'static EntitySchema;

    fn id(&self) -> i64;
}
