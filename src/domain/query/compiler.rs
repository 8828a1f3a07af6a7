//! Query compiler
//!
//! Turns a [`QueryRequest`] into a [`NativeQuery`]: condition groups, projection
//! and order trees, relation list and pagination. Pure; storage adapters
//! interpret the result.

use serde::Serialize;
use serde_json::{Map, Value};

use super::request::{FieldFilter, FieldMap, QueryRequest, WhereClause, MAX_PAGE_SIZE};
use super::tree::{PathNode, PathTree};
use crate::domain::schema::EntitySchema;

/// Compilation errors. All of them are caller mistakes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid \"{operator}\" operator value for field \"{field}\": {reason}")]
    InvalidOperatorValue {
        field: String,
        operator: String,
        reason: String,
    },

    #[error("Invalid field path: \"{0}\"")]
    InvalidFieldPath(String),

    #[error("Unknown field \"{field}\" on {table}")]
    UnknownField { table: String, field: String },

    #[error("Unknown relation \"{relation}\" on {table}")]
    UnknownRelation { table: String, relation: String },

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
}

/// Sort direction of an order-tree leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Store-neutral comparison, one per DSL operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "value", rename_all = "lowercase")]
pub enum NativeCondition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Lt(Value),
    Gte(Value),
    Lte(Value),
    Contain(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    IsNull,
    NotNull,
    Between(Value, Value),
}

/// A condition bound to a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub field: String,
    pub condition: NativeCondition,
}

/// Conditions that must all hold.
pub type ConditionGroup = Vec<Condition>;

/// Compiled `where`.
///
/// A row matches when it satisfies every group in `groups` and, if
/// `alternatives` is non-empty, at least one alternative.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WhereSpec {
    pub groups: Vec<ConditionGroup>,
    pub alternatives: Vec<ConditionGroup>,
}

impl WhereSpec {
    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(Vec::is_empty) && self.alternatives.is_empty()
    }

    /// Every field referenced by any condition.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .chain(self.alternatives.iter())
            .flatten()
            .map(|c| c.field.as_str())
    }
}

/// Dotted select paths as a tree; leaves are `true`.
pub type ProjectionTree = PathTree<bool>;

/// Dotted sort keys as a tree; leaves carry the direction.
pub type OrderTree = PathTree<SortDirection>;

/// Relations to expand, in request order without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelationSpec(Vec<String>);

impl RelationSpec {
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|r| r == name)
    }

    pub fn insert(&mut self, name: &str) {
        if !self.contains(name) {
            self.0.push(name.to_string());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Fully compiled read, handed to a `RecordStore`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NativeQuery {
    #[serde(rename = "where")]
    pub filter: WhereSpec,
    pub projection: ProjectionTree,
    pub relations: RelationSpec,
    pub order: OrderTree,
    pub skip: u64,
    pub take: Option<u64>,
    pub with_deleted: bool,
}

// ============================================================================
// Where
// ============================================================================

/// Compiles a `where` clause.
///
/// Top-level fields form one group, each `and` element another. Groups are
/// ANDed together; `or` branches become alternatives.
pub fn compile_where(clause: &WhereClause) -> Result<WhereSpec, QueryError> {
    let mut spec = WhereSpec::default();

    if !clause.fields.is_empty() {
        spec.groups.push(compile_group(&clause.fields)?);
    }
    for group in &clause.and {
        spec.groups.push(compile_group(group)?);
    }
    for branch in &clause.or {
        spec.alternatives.push(compile_group(branch)?);
    }

    Ok(spec)
}

fn compile_group(fields: &FieldMap) -> Result<ConditionGroup, QueryError> {
    let mut group = Vec::with_capacity(fields.len());
    for (field, filter) in fields {
        validate_identifier(field, field)?;
        match filter {
            FieldFilter::Value(value) => group.push(Condition {
                field: field.clone(),
                condition: compile_operator(field, "eq", value)?,
            }),
            FieldFilter::Operators(operators) => {
                if operators.is_empty() {
                    return Err(invalid(field, "eq", "operator object is empty"));
                }
                for (operator, operand) in operators {
                    group.push(Condition {
                        field: field.clone(),
                        condition: compile_operator(field, operator, operand)?,
                    });
                }
            }
        }
    }
    Ok(group)
}

fn compile_operator(field: &str, operator: &str, operand: &Value) -> Result<NativeCondition, QueryError> {
    let condition = match operator {
        "eq" => NativeCondition::Eq(nullable_scalar(field, operator, operand)?),
        "ne" => NativeCondition::Ne(nullable_scalar(field, operator, operand)?),
        "gt" => NativeCondition::Gt(scalar(field, operator, operand)?),
        "lt" => NativeCondition::Lt(scalar(field, operator, operand)?),
        "gte" => NativeCondition::Gte(scalar(field, operator, operand)?),
        "lte" => NativeCondition::Lte(scalar(field, operator, operand)?),
        "contain" => match operand {
            Value::String(_) | Value::Number(_) => NativeCondition::Contain(operand.clone()),
            _ => return Err(invalid(field, operator, "expected a string or number")),
        },
        "in" => NativeCondition::In(scalar_list(field, operator, operand)?),
        "notin" => NativeCondition::NotIn(scalar_list(field, operator, operand)?),
        "isnull" => NativeCondition::IsNull,
        "notnull" => NativeCondition::NotNull,
        "between" => match operand {
            Value::Array(bounds) if bounds.len() == 2 => NativeCondition::Between(
                scalar(field, operator, &bounds[0])?,
                scalar(field, operator, &bounds[1])?,
            ),
            _ => {
                return Err(invalid(
                    field,
                    operator,
                    "expected an array with exactly two elements",
                ))
            }
        },
        other => return Err(QueryError::UnsupportedOperator(other.to_string())),
    };
    Ok(condition)
}

fn scalar(field: &str, operator: &str, operand: &Value) -> Result<Value, QueryError> {
    match operand {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(operand.clone()),
        _ => Err(invalid(field, operator, "expected a scalar")),
    }
}

fn nullable_scalar(field: &str, operator: &str, operand: &Value) -> Result<Value, QueryError> {
    match operand {
        Value::Null => Ok(Value::Null),
        _ => scalar(field, operator, operand),
    }
}

fn scalar_list(field: &str, operator: &str, operand: &Value) -> Result<Vec<Value>, QueryError> {
    match operand {
        Value::Array(items) => items
            .iter()
            .map(|item| scalar(field, operator, item))
            .collect(),
        _ => Err(invalid(field, operator, "expected an array")),
    }
}

fn invalid(field: &str, operator: &str, reason: &str) -> QueryError {
    QueryError::InvalidOperatorValue {
        field: field.to_string(),
        operator: operator.to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// Select / Sort / Join
// ============================================================================

/// Builds the projection tree from dotted select paths.
pub fn compile_select(paths: &[String]) -> ProjectionTree {
    PathTree::from_paths(paths.iter().map(|p| (p.as_str(), true)))
}

/// Builds the order tree; a leading `-` means descending.
pub fn compile_sort(keys: &[String]) -> OrderTree {
    PathTree::from_paths(keys.iter().map(|key| match key.strip_prefix('-') {
        Some(rest) => (rest, SortDirection::Desc),
        None => (key.as_str(), SortDirection::Asc),
    }))
}

/// Collects relation names.
pub fn compile_join(names: &[String]) -> RelationSpec {
    let mut spec = RelationSpec::default();
    for name in names {
        spec.insert(name);
    }
    spec
}

// ============================================================================
// Full request
// ============================================================================

/// Compiles a request and checks every field and relation against `schema`.
///
/// Relations referenced from `select` or `sort` are joined implicitly.
pub fn compile_query(request: &QueryRequest, schema: &EntitySchema) -> Result<NativeQuery, QueryError> {
    let filter = match &request.filter {
        Some(clause) => compile_where(clause)?,
        None => WhereSpec::default(),
    };
    for field in filter.fields() {
        if schema.column(field).is_none() {
            return Err(unknown_field(schema, field));
        }
    }

    let mut relations = compile_join(&request.join);
    for name in relations.iter() {
        validate_identifier(name, name)?;
        if schema.relation(name).is_none() {
            return Err(QueryError::UnknownRelation {
                table: schema.table.to_string(),
                relation: name.to_string(),
            });
        }
    }

    for path in &request.select {
        validate_path(path, schema)?;
    }
    for key in &request.sort {
        validate_path(key.strip_prefix('-').unwrap_or(key), schema)?;
    }

    let projection = compile_select(&request.select);
    let order = compile_sort(&request.sort);
    for (name, node) in projection.iter() {
        if matches!(node, PathNode::Branch(_)) || schema.column(name).is_none() {
            relations.insert(name);
        }
    }
    for (name, node) in order.iter() {
        if matches!(node, PathNode::Branch(_)) {
            relations.insert(name);
        }
    }

    let (page, page_size) = request.pagination();
    if page_size > MAX_PAGE_SIZE {
        return Err(QueryError::InvalidPagination(format!(
            "pageSize must not exceed {}",
            MAX_PAGE_SIZE
        )));
    }
    let skip = (page - 1)
        .checked_mul(page_size)
        .ok_or_else(|| QueryError::InvalidPagination(format!("page {} is out of range", page)))?;

    Ok(NativeQuery {
        filter,
        projection,
        relations,
        order,
        skip,
        take: Some(page_size),
        with_deleted: request.with_deleted,
    })
}

/// `column`, `relation` or `relation.column`.
fn validate_path(path: &str, schema: &EntitySchema) -> Result<(), QueryError> {
    let segments: Vec<&str> = path.split('.').collect();
    for segment in &segments {
        validate_identifier(segment, path)?;
    }

    match segments.as_slice() {
        [single] => {
            if schema.column(single).is_some() || schema.relation(single).is_some() {
                Ok(())
            } else {
                Err(unknown_field(schema, path))
            }
        }
        [relation, column] => {
            let def = schema.relation(relation).ok_or_else(|| QueryError::UnknownRelation {
                table: schema.table.to_string(),
                relation: relation.to_string(),
            })?;
            let target = (def.target)();
            if target.column(column).is_some() {
                Ok(())
            } else {
                Err(unknown_field(target, column))
            }
        }
        _ => Err(QueryError::InvalidFieldPath(path.to_string())),
    }
}

fn validate_identifier(segment: &str, path: &str) -> Result<(), QueryError> {
    let mut chars = segment.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(QueryError::InvalidFieldPath(path.to_string()))
    }
}

fn unknown_field(schema: &EntitySchema, field: &str) -> QueryError {
    QueryError::UnknownField {
        table: schema.table.to_string(),
        field: field.to_string(),
    }
}

/// Serializes a compiled query into a stable JSON object, used for cache keys.
pub fn fingerprint(query: &NativeQuery) -> Value {
    serde_json::to_value(query).unwrap_or_else(|_| Value::Object(Map::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Conversation, Presence};
    use crate::domain::query::request::{fields, FieldFilter, QueryRequest, WhereClause};
    use crate::domain::schema::Entity;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    fn clause(value: Value) -> WhereClause {
        serde_json::from_value(value).unwrap()
    }

    // ========================================================================
    // compile_where
    // ========================================================================

    #[test]
    fn test_flat_map_equals_single_and_group() {
        let flat = compile_where(&clause(json!({ "user_id": 1, "kind": "socket_id" }))).unwrap();
        let grouped = compile_where(&clause(json!({
            "and": [{ "user_id": 1, "kind": "socket_id" }]
        })))
        .unwrap();

        assert_eq!(flat, grouped);
        assert_eq!(flat.groups.len(), 1);
        assert_eq!(flat.groups[0].len(), 2);
    }

    #[test]
    fn test_each_and_element_is_its_own_group() {
        let spec = compile_where(&clause(json!({
            "and": [{ "user_id": { "in": [1, 2] } }, { "kind": "socket_id" }]
        })))
        .unwrap();

        assert_eq!(
            spec.groups,
            vec![
                vec![Condition {
                    field: "user_id".into(),
                    condition: NativeCondition::In(vec![json!(1), json!(2)]),
                }],
                vec![Condition {
                    field: "kind".into(),
                    condition: NativeCondition::Eq(json!("socket_id")),
                }],
            ]
        );
    }

    #[test]
    fn test_flat_fields_next_to_and_become_extra_group() {
        let spec = compile_where(&clause(json!({
            "status": false,
            "and": [{ "user_id": 3 }]
        })))
        .unwrap();
        assert_eq!(spec.groups.len(), 2);
    }

    #[test]
    fn test_or_branches_become_alternatives() {
        let spec = compile_where(
            &WhereClause::new()
                .or(fields([("mute", FieldFilter::eq(true))]))
                .or(fields([("block", FieldFilter::eq(true))])),
        )
        .unwrap();
        assert!(spec.groups.is_empty());
        assert_eq!(spec.alternatives.len(), 2);
    }

    #[test_case(json!({ "gt": 5 }), NativeCondition::Gt(json!(5)) ; "gt")]
    #[test_case(json!({ "lt": 5 }), NativeCondition::Lt(json!(5)) ; "lt")]
    #[test_case(json!({ "gte": 5 }), NativeCondition::Gte(json!(5)) ; "gte")]
    #[test_case(json!({ "lte": 5 }), NativeCondition::Lte(json!(5)) ; "lte")]
    #[test_case(json!({ "ne": 5 }), NativeCondition::Ne(json!(5)) ; "ne")]
    #[test_case(json!({ "eq": null }), NativeCondition::Eq(Value::Null) ; "eq null")]
    #[test_case(json!({ "contain": "ell" }), NativeCondition::Contain(json!("ell")) ; "contain")]
    #[test_case(json!({ "notin": [1] }), NativeCondition::NotIn(vec![json!(1)]) ; "notin")]
    #[test_case(json!({ "isnull": true }), NativeCondition::IsNull ; "isnull")]
    #[test_case(json!({ "notnull": true }), NativeCondition::NotNull ; "notnull")]
    #[test_case(json!({ "between": [1, 9] }), NativeCondition::Between(json!(1), json!(9)) ; "between")]
    #[test_case(json!("hello"), NativeCondition::Eq(json!("hello")) ; "bare value")]
    fn test_operator_translation(filter: Value, expected: NativeCondition) {
        let spec = compile_where(&clause(json!({ "field": filter }))).unwrap();
        assert_eq!(spec.groups[0][0].condition, expected);
    }

    #[test_case(json!([1]) ; "one bound")]
    #[test_case(json!([1, 2, 3]) ; "three bounds")]
    #[test_case(json!(5) ; "not an array")]
    #[test_case(json!([null, 2]) ; "null bound")]
    fn test_between_requires_two_bounds(operand: Value) {
        let err = compile_where(&clause(json!({ "id": { "between": operand } }))).unwrap_err();
        assert!(matches!(
            err,
            QueryError::InvalidOperatorValue { ref operator, .. } if operator == "between"
        ));
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let err = compile_where(&clause(json!({ "id": { "like": "a%" } }))).unwrap_err();
        assert_eq!(err, QueryError::UnsupportedOperator("like".into()));
        assert_eq!(err.to_string(), "Unsupported operator: like");
    }

    #[test_case(json!({ "in": 5 }) ; "in scalar")]
    #[test_case(json!({ "in": [[1]] }) ; "in nested")]
    #[test_case(json!({ "gt": [1] }) ; "gt array")]
    #[test_case(json!({ "gt": null }) ; "gt null")]
    #[test_case(json!({}) ; "empty object")]
    #[test_case(json!([1, 2]) ; "bare array")]
    fn test_malformed_operand_is_rejected(filter: Value) {
        let err = compile_where(&clause(json!({ "id": filter }))).unwrap_err();
        assert!(matches!(err, QueryError::InvalidOperatorValue { .. }));
    }

    // ========================================================================
    // compile_select / compile_sort / compile_join
    // ========================================================================

    #[test]
    fn test_select_builds_nested_tree() {
        let tree = compile_select(&["a.b".into(), "a.c".into(), "d".into()]);
        assert_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!({ "a": { "b": true, "c": true }, "d": true })
        );
        assert!(compile_select(&[]).is_empty());
    }

    #[test]
    fn test_sort_direction_from_prefix() {
        let tree = compile_sort(&["-created_at".into(), "users.name".into()]);
        assert_eq!(
            serde_json::to_value(&tree).unwrap(),
            json!({ "created_at": "DESC", "users": { "name": "ASC" } })
        );
    }

    #[test]
    fn test_join_deduplicates() {
        let spec = compile_join(&["users".into(), "messages".into(), "users".into()]);
        assert_eq!(spec.iter().collect::<Vec<_>>(), vec!["users", "messages"]);
    }

    // ========================================================================
    // compile_query
    // ========================================================================

    #[test]
    fn test_compile_query_pagination() {
        let request = QueryRequest::new().page(3, 20);
        let query = compile_query(&request, Presence::schema()).unwrap();
        assert_eq!(query.skip, 40);
        assert_eq!(query.take, Some(20));
    }

    #[test_case(u64::MAX, 10 ; "page overflows offset")]
    #[test_case(1, MAX_PAGE_SIZE + 1 ; "page size above cap")]
    fn test_compile_query_rejects_out_of_range_pagination(page: u64, page_size: u64) {
        let request = QueryRequest::new().page(page, page_size);
        let err = compile_query(&request, Presence::schema()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidPagination(_)));
    }

    #[test]
    fn test_compile_query_accepts_largest_page_size() {
        let request = QueryRequest::new().page(2, MAX_PAGE_SIZE);
        let query = compile_query(&request, Presence::schema()).unwrap();
        assert_eq!(query.skip, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_compile_query_rejects_unknown_column() {
        let request = QueryRequest::new().filter(WhereClause::new().field("nope", FieldFilter::eq(1)));
        let err = compile_query(&request, Presence::schema()).unwrap_err();
        assert!(matches!(err, QueryError::UnknownField { .. }));
    }

    #[test]
    fn test_compile_query_rejects_unknown_relation() {
        let request = QueryRequest::new().join(["participants"]);
        let err = compile_query(&request, Conversation::schema()).unwrap_err();
        assert!(matches!(err, QueryError::UnknownRelation { .. }));
    }

    #[test]
    fn test_compile_query_joins_relations_named_in_select() {
        let request = QueryRequest::new().select(["id", "users.name"]);
        let query = compile_query(&request, Conversation::schema()).unwrap();
        assert!(query.relations.contains("users"));
    }

    #[test]
    fn test_compile_query_rejects_deep_paths() {
        let request = QueryRequest::new().select(["users.profile.avatar"]);
        let err = compile_query(&request, Conversation::schema()).unwrap_err();
        assert_eq!(err, QueryError::InvalidFieldPath("users.profile.avatar".into()));
    }

    #[test]
    fn test_compile_query_rejects_malformed_segment() {
        let request = QueryRequest::new().sort(["-"]);
        let err = compile_query(&request, Conversation::schema()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidFieldPath(_)));
    }
}
