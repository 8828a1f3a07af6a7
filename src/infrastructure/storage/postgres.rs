//! PostgreSQL record store.
//!
//! Builds statements with `sqlx::QueryBuilder` from the entity schema and the
//! compiled query. Rows travel as JSONB: reads select `to_jsonb(t.*)` merged
//! with one sub-select per joined relation, writes go through
//! `jsonb_populate_record`. Every operand is bound as text and cast to the
//! column type, so user input never reaches the SQL text; identifiers are
//! checked against the schema and quoted.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};

use super::eval::project;
use crate::domain::ports::{Document, RecordStore, StoreError};
use crate::domain::query::{
    Condition, ConditionGroup, NativeCondition, NativeQuery, OrderTree, PathNode, SortDirection,
    WhereSpec,
};
use crate::domain::schema::{Column, EntitySchema, RelationDef, RelationKind};

/// Columns the store maintains itself on update.
const MANAGED_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Statement building
// ============================================================================

fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column<'s>(schema: &'s EntitySchema, name: &str) -> Result<&'s Column, StoreError> {
    schema.column(name).ok_or_else(|| {
        StoreError::Unsupported(format!("unknown column {}.{}", schema.table, name))
    })
}

/// Operand as text for a `CAST($n AS <type>)`.
fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn like_pattern(value: &Value) -> String {
    let raw = text(value).unwrap_or_default();
    let escaped = raw
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_cast(qb: &mut QueryBuilder<'_, Postgres>, value: &Value, column: &Column) {
    qb.push("CAST(")
        .push_bind(text(value))
        .push(" AS ")
        .push(column.ty.sql_type())
        .push(")");
}

fn push_condition(
    qb: &mut QueryBuilder<'_, Postgres>,
    alias: &str,
    schema: &EntitySchema,
    condition: &Condition,
) -> Result<(), StoreError> {
    let column = column(schema, &condition.field)?;
    let target = format!("{}.{}", alias, ident(column.name));

    match &condition.condition {
        NativeCondition::IsNull | NativeCondition::Eq(Value::Null) => {
            qb.push(&target).push(" IS NULL");
        }
        NativeCondition::NotNull | NativeCondition::Ne(Value::Null) => {
            qb.push(&target).push(" IS NOT NULL");
        }
        NativeCondition::Eq(value) => push_comparison(qb, &target, "=", value, column),
        NativeCondition::Ne(value) => push_comparison(qb, &target, "<>", value, column),
        NativeCondition::Gt(value) => push_comparison(qb, &target, ">", value, column),
        NativeCondition::Lt(value) => push_comparison(qb, &target, "<", value, column),
        NativeCondition::Gte(value) => push_comparison(qb, &target, ">=", value, column),
        NativeCondition::Lte(value) => push_comparison(qb, &target, "<=", value, column),
        NativeCondition::Contain(value) => {
            qb.push("CAST(")
                .push(&target)
                .push(" AS TEXT) ILIKE ")
                .push_bind(like_pattern(value));
        }
        NativeCondition::In(values) if values.is_empty() => {
            qb.push("FALSE");
        }
        NativeCondition::NotIn(values) if values.is_empty() => {
            qb.push(&target).push(" IS NOT NULL");
        }
        NativeCondition::In(values) => push_any(qb, &target, false, values, column),
        NativeCondition::NotIn(values) => push_any(qb, &target, true, values, column),
        NativeCondition::Between(low, high) => {
            qb.push(&target).push(" BETWEEN ");
            push_cast(qb, low, column);
            qb.push(" AND ");
            push_cast(qb, high, column);
        }
    }
    Ok(())
}

fn push_comparison(
    qb: &mut QueryBuilder<'_, Postgres>,
    target: &str,
    operator: &str,
    value: &Value,
    column: &Column,
) {
    qb.push(target).push(" ").push(operator).push(" ");
    push_cast(qb, value, column);
}

fn push_any(
    qb: &mut QueryBuilder<'_, Postgres>,
    target: &str,
    negate: bool,
    values: &[Value],
    column: &Column,
) {
    let items: Vec<String> = values.iter().filter_map(text).collect();
    if negate {
        qb.push("NOT (");
    }
    qb.push(target)
        .push(" = ANY(CAST(")
        .push_bind(items)
        .push(" AS ")
        .push(column.ty.sql_type())
        .push("[]))");
    if negate {
        qb.push(")");
    }
}

fn push_group(
    qb: &mut QueryBuilder<'_, Postgres>,
    alias: &str,
    schema: &EntitySchema,
    group: &ConditionGroup,
) -> Result<(), StoreError> {
    if group.is_empty() {
        qb.push("TRUE");
        return Ok(());
    }
    qb.push("(");
    for (i, condition) in group.iter().enumerate() {
        if i > 0 {
            qb.push(" AND ");
        }
        push_condition(qb, alias, schema, condition)?;
    }
    qb.push(")");
    Ok(())
}

fn push_where(
    qb: &mut QueryBuilder<'_, Postgres>,
    schema: &EntitySchema,
    spec: &WhereSpec,
    with_deleted: bool,
) -> Result<(), StoreError> {
    qb.push(" WHERE ");
    if with_deleted {
        qb.push("TRUE");
    } else {
        qb.push("t.deleted_at IS NULL");
    }

    for group in &spec.groups {
        qb.push(" AND ");
        push_group(qb, "t", schema, group)?;
    }

    if !spec.alternatives.is_empty() {
        qb.push(" AND (");
        for (i, branch) in spec.alternatives.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            push_group(qb, "t", schema, branch)?;
        }
        qb.push(")");
    }
    Ok(())
}

/// `ORDER BY` from the column leaves of `order`, then id.
fn order_clause(alias: &str, schema: &EntitySchema, order: &OrderTree) -> String {
    let mut keys: Vec<String> = order
        .iter()
        .filter_map(|(key, node)| match node {
            PathNode::Leaf(direction) if schema.column(key).is_some() => {
                let direction = match direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                Some(format!("{}.{} {}", alias, ident(key), direction))
            }
            _ => None,
        })
        .collect();
    keys.push(format!("{}.\"id\" ASC", alias));
    keys.join(", ")
}

fn push_relation(qb: &mut QueryBuilder<'_, Postgres>, def: &RelationDef, order: &OrderTree) {
    let target = (def.target)();
    let table = ident(target.table);

    match def.kind {
        RelationKind::BelongsTo { local_key } => {
            qb.push(format!(
                "(SELECT to_jsonb(r.*) FROM {table} r WHERE r.\"id\" = t.{key} AND r.deleted_at IS NULL)",
                table = table,
                key = ident(local_key),
            ));
        }
        RelationKind::HasMany { foreign_key } => {
            qb.push(format!(
                "COALESCE((SELECT jsonb_agg(to_jsonb(r.*) ORDER BY {order}) FROM {table} r \
                 WHERE r.{fk} = t.\"id\" AND r.deleted_at IS NULL), '[]'::jsonb)",
                order = order_clause("r", target, order),
                table = table,
                fk = ident(foreign_key),
            ));
        }
        RelationKind::ManyToMany {
            through,
            local_key,
            foreign_key,
        } => {
            qb.push(format!(
                "COALESCE((SELECT jsonb_agg(to_jsonb(r.*) ORDER BY {order}) FROM {table} r \
                 JOIN {through} l ON l.{fk} = r.\"id\" \
                 WHERE l.{lk} = t.\"id\" AND l.deleted_at IS NULL AND r.deleted_at IS NULL), '[]'::jsonb)",
                order = order_clause("r", target, order),
                table = table,
                through = ident(through),
                fk = ident(foreign_key),
                lk = ident(local_key),
            ));
        }
    }
}

/// `SELECT <document> AS doc FROM <table> t WHERE ... ORDER BY ... LIMIT ... OFFSET ...`
fn select_statement(
    schema: &EntitySchema,
    query: &NativeQuery,
) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    let mut qb = QueryBuilder::new("SELECT to_jsonb(t.*)");

    for name in query.relations.iter() {
        let def = schema.relation(name).ok_or_else(|| {
            StoreError::Unsupported(format!("unknown relation {}.{}", schema.table, name))
        })?;
        let nested = match query.order.get(name) {
            Some(PathNode::Branch(tree)) => tree.clone(),
            _ => OrderTree::default(),
        };
        qb.push(" || jsonb_build_object('")
            .push(def.name)
            .push("', ");
        push_relation(&mut qb, def, &nested);
        qb.push(")");
    }

    qb.push(" AS doc FROM ").push(ident(schema.table)).push(" t");
    push_where(&mut qb, schema, &query.filter, query.with_deleted)?;
    qb.push(" ORDER BY ").push(order_clause("t", schema, &query.order));

    if let Some(take) = query.take {
        qb.push(" LIMIT ").push_bind(i64::try_from(take).unwrap_or(i64::MAX));
    }
    if query.skip > 0 {
        qb.push(" OFFSET ").push_bind(i64::try_from(query.skip).unwrap_or(i64::MAX));
    }
    Ok(qb)
}

fn count_statement(
    schema: &EntitySchema,
    query: &NativeQuery,
) -> Result<QueryBuilder<'static, Postgres>, StoreError> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM ");
    qb.push(ident(schema.table)).push(" t");
    push_where(&mut qb, schema, &query.filter, query.with_deleted)?;
    Ok(qb)
}

fn insert_statement(schema: &EntitySchema, row: Document) -> QueryBuilder<'static, Postgres> {
    let table = ident(schema.table);
    let mut qb = QueryBuilder::new(format!(
        "INSERT INTO {table} SELECT * FROM jsonb_populate_record(NULL::{table}, ",
        table = table
    ));
    qb.push_bind(Json(Value::Object(row)))
        .push(format!(") RETURNING to_jsonb({}.*) AS doc", table));
    qb
}

fn update_statement(
    schema: &EntitySchema,
    id: i64,
    patch: &Document,
) -> QueryBuilder<'static, Postgres> {
    let table = ident(schema.table);
    let mut qb = QueryBuilder::new(format!("UPDATE {} AS t SET ", table));

    for key in patch.keys() {
        if MANAGED_COLUMNS.contains(&key.as_str()) || schema.column(key).is_none() {
            continue;
        }
        qb.push(format!("{col} = p.{col}, ", col = ident(key)));
    }
    qb.push("updated_at = NOW() FROM jsonb_populate_record(NULL::")
        .push(&table)
        .push(", ")
        .push_bind(Json(Value::Object(patch.clone())))
        .push(") AS p WHERE t.\"id\" = ")
        .push_bind(id)
        .push(" AND t.deleted_at IS NULL");
    qb
}

fn soft_delete_statement(schema: &EntitySchema, ids: &[i64]) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "UPDATE {} SET deleted_at = NOW(), updated_at = NOW() WHERE \"id\" = ANY(",
        ident(schema.table)
    ));
    qb.push_bind(ids.to_vec()).push(") AND deleted_at IS NULL");
    qb
}

fn hard_delete_statement(schema: &EntitySchema, ids: &[i64]) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("DELETE FROM {} WHERE \"id\" = ANY(", ident(schema.table)));
    qb.push_bind(ids.to_vec()).push(")");
    qb
}

// ============================================================================
// RecordStore
// ============================================================================

impl PgStore {
    async fn fetch_documents(
        &self,
        schema: &EntitySchema,
        query: &NativeQuery,
    ) -> Result<Vec<Document>, StoreError> {
        let mut qb = select_statement(schema, query)?;
        debug!(sql = qb.sql(), "Executing select");
        let rows: Vec<Json<Document>> = qb
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|Json(doc)| project(doc, &query.projection, &query.relations))
            .collect())
    }
}

#[async_trait]
impl RecordStore for PgStore {
    #[instrument(skip(self, schema, query), fields(table = schema.table))]
    async fn find_by_id(
        &self,
        schema: &EntitySchema,
        id: i64,
        query: &NativeQuery,
    ) -> Result<Option<Document>, StoreError> {
        let mut scoped = query.clone();
        scoped.filter.groups.push(vec![Condition {
            field: "id".into(),
            condition: NativeCondition::Eq(Value::from(id)),
        }]);
        scoped.skip = 0;
        scoped.take = Some(1);
        Ok(self.fetch_documents(schema, &scoped).await?.into_iter().next())
    }

    #[instrument(skip(self, schema, query), fields(table = schema.table))]
    async fn find_one(
        &self,
        schema: &EntitySchema,
        query: &NativeQuery,
    ) -> Result<Option<Document>, StoreError> {
        let mut scoped = query.clone();
        scoped.take = Some(1);
        Ok(self.fetch_documents(schema, &scoped).await?.into_iter().next())
    }

    #[instrument(skip(self, schema, query), fields(table = schema.table))]
    async fn find_and_count(
        &self,
        schema: &EntitySchema,
        query: &NativeQuery,
    ) -> Result<(Vec<Document>, u64), StoreError> {
        let rows = self.fetch_documents(schema, query).await?;
        let total = self.count(schema, query).await?;
        Ok((rows, total))
    }

    #[instrument(skip(self, schema, query), fields(table = schema.table))]
    async fn count(&self, schema: &EntitySchema, query: &NativeQuery) -> Result<u64, StoreError> {
        let mut qb = count_statement(schema, query)?;
        let total: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    #[instrument(skip(self, schema, rows), fields(table = schema.table, rows = rows.len()))]
    async fn insert(
        &self,
        schema: &EntitySchema,
        rows: Vec<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(rows.len());

        for row in rows {
            let mut qb = insert_statement(schema, row);
            let Json(doc): Json<Document> = qb.build_query_scalar().fetch_one(&mut *tx).await?;
            inserted.push(doc);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    #[instrument(skip(self, schema, patch), fields(table = schema.table))]
    async fn update_by_id(
        &self,
        schema: &EntitySchema,
        id: i64,
        patch: &Document,
    ) -> Result<u64, StoreError> {
        let mut qb = update_statement(schema, id, patch);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, schema), fields(table = schema.table))]
    async fn soft_delete(&self, schema: &EntitySchema, ids: &[i64]) -> Result<u64, StoreError> {
        let mut qb = soft_delete_statement(schema, ids);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, schema), fields(table = schema.table))]
    async fn hard_delete(&self, schema: &EntitySchema, ids: &[i64]) -> Result<u64, StoreError> {
        let mut qb = hard_delete_statement(schema, ids);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Conversation, Message, Presence};
    use crate::domain::ports::document;
    use crate::domain::query::{
        compile_query, Condition, FieldFilter, NativeCondition, QueryRequest, WhereClause, WhereSpec,
    };
    use crate::domain::schema::Entity;
    use serde_json::json;

    fn select_sql<E: Entity>(request: QueryRequest) -> String {
        let query = compile_query(&request, E::schema()).unwrap();
        select_statement(E::schema(), &query).unwrap().sql().to_string()
    }

    #[test]
    fn test_select_binds_operands_and_hides_deleted() {
        let sql = select_sql::<Presence>(QueryRequest::new().filter(
            WhereClause::new()
                .field("user_id", FieldFilter::is_in([1, 2]))
                .field("kind", FieldFilter::eq("socket_id")),
        ));

        assert!(sql.starts_with("SELECT to_jsonb(t.*) AS doc FROM \"presences\" t WHERE t.deleted_at IS NULL AND ("));
        assert!(sql.contains("t.\"kind\" = CAST($1 AS TEXT)"));
        assert!(sql.contains("t.\"user_id\" = ANY(CAST($2 AS BIGINT[]))"));
        assert!(sql.ends_with("ORDER BY t.\"id\" ASC LIMIT $3"));
        assert!(!sql.contains("socket_id"));
    }

    #[test]
    fn test_select_or_and_between() {
        let sql = select_sql::<Message>(
            QueryRequest::new()
                .filter(
                    WhereClause::new()
                        .field("id", FieldFilter::between(1, 9))
                        .or(crate::domain::query::fields([("status", FieldFilter::eq(true))]))
                        .or(crate::domain::query::fields([("message", FieldFilter::contain("50%"))])),
                )
                .sort(["-created_at"])
                .page(2, 5)
                .with_deleted(true),
        );

        assert!(sql.contains("WHERE TRUE AND (t.\"id\" BETWEEN CAST($1 AS BIGINT) AND CAST($2 AS BIGINT))"));
        assert!(sql.contains("AND ((t.\"status\" = CAST($3 AS BOOLEAN)) OR (CAST(t.\"message\" AS TEXT) ILIKE $4))"));
        assert!(sql.contains("ORDER BY t.\"created_at\" DESC, t.\"id\" ASC LIMIT $5 OFFSET $6"));
    }

    #[test]
    fn test_select_expands_many_to_many() {
        let sql = select_sql::<Conversation>(QueryRequest::new().join(["users"]));
        assert!(sql.contains("jsonb_build_object('users', COALESCE((SELECT jsonb_agg(to_jsonb(r.*) ORDER BY r.\"id\" ASC) FROM \"users\" r JOIN \"user_conversation\" l ON l.\"user_id\" = r.\"id\""));
        assert!(sql.contains("WHERE l.\"conversation_id\" = t.\"id\""));
    }

    #[test]
    fn test_null_equality_needs_no_bind() {
        let sql = select_sql::<Conversation>(
            QueryRequest::new().filter(WhereClause::new().field("title", FieldFilter::eq(Value::Null))),
        );
        assert!(sql.contains("t.\"title\" IS NULL"));
    }

    #[test]
    fn test_update_skips_managed_and_unknown_columns() {
        let patch = document(json!({ "id": 5, "title": "x", "bogus": 1, "created_at": "2020-01-01T00:00:00Z" }));
        let sql = update_statement(Conversation::schema(), 7, &patch).sql().to_string();
        assert_eq!(
            sql,
            "UPDATE \"conversations\" AS t SET \"title\" = p.\"title\", updated_at = NOW() \
             FROM jsonb_populate_record(NULL::\"conversations\", $1) AS p \
             WHERE t.\"id\" = $2 AND t.deleted_at IS NULL"
        );
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(&json!("50%_off")), "%50\\%\\_off%");
    }

    #[test]
    fn test_unknown_column_is_rejected() {
        let query = NativeQuery {
            filter: WhereSpec {
                groups: vec![vec![Condition {
                    field: "nope".into(),
                    condition: NativeCondition::Eq(json!(1)),
                }]],
                alternatives: Vec::new(),
            },
            ..NativeQuery::default()
        };
        assert!(matches!(
            select_statement(Presence::schema(), &query),
            Err(StoreError::Unsupported(_))
        ));
    }
}
