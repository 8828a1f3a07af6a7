//! Evaluation of compiled queries over JSON documents.
//!
//! Used by the in-memory store for filtering and ordering, and by both stores
//! for projection. Comparison follows SQL: a NULL operand never satisfies a
//! comparison, only `IS NULL`.

use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::domain::ports::Document;
use crate::domain::query::{
    Condition, NativeCondition, OrderTree, PathNode, ProjectionTree, RelationSpec, SortDirection,
    WhereSpec,
};

/// Timestamp as stored in documents.
pub fn timestamp(now: DateTime<Utc>) -> Value {
    Value::String(now.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// Whether a document satisfies a where spec.
pub fn matches(doc: &Document, spec: &WhereSpec) -> bool {
    let all_groups = spec
        .groups
        .iter()
        .all(|group| group.iter().all(|c| matches_condition(doc, c)));

    all_groups
        && (spec.alternatives.is_empty()
            || spec
                .alternatives
                .iter()
                .any(|branch| branch.iter().all(|c| matches_condition(doc, c))))
}

fn matches_condition(doc: &Document, condition: &Condition) -> bool {
    let value = doc.get(&condition.field).unwrap_or(&Value::Null);

    match &condition.condition {
        NativeCondition::IsNull => value.is_null(),
        NativeCondition::NotNull => !value.is_null(),
        NativeCondition::Eq(Value::Null) => value.is_null(),
        NativeCondition::Ne(Value::Null) => !value.is_null(),
        _ if value.is_null() => false,
        NativeCondition::Eq(operand) => compare(value, operand) == Some(Ordering::Equal),
        NativeCondition::Ne(operand) => {
            matches!(compare(value, operand), Some(o) if o != Ordering::Equal)
        }
        NativeCondition::Gt(operand) => compare(value, operand) == Some(Ordering::Greater),
        NativeCondition::Lt(operand) => compare(value, operand) == Some(Ordering::Less),
        NativeCondition::Gte(operand) => {
            matches!(compare(value, operand), Some(Ordering::Greater | Ordering::Equal))
        }
        NativeCondition::Lte(operand) => {
            matches!(compare(value, operand), Some(Ordering::Less | Ordering::Equal))
        }
        NativeCondition::Contain(operand) => {
            let needle = text(operand).to_lowercase();
            text(value).to_lowercase().contains(&needle)
        }
        NativeCondition::In(items) => items
            .iter()
            .any(|item| compare(value, item) == Some(Ordering::Equal)),
        NativeCondition::NotIn(items) => items
            .iter()
            .all(|item| compare(value, item) != Some(Ordering::Equal)),
        NativeCondition::Between(low, high) => {
            matches!(compare(value, low), Some(Ordering::Greater | Ordering::Equal))
                && matches!(compare(value, high), Some(Ordering::Less | Ordering::Equal))
        }
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Compares two scalars.
///
/// Integers compare exactly, numeric strings are coerced when the other side
/// is a number, and RFC 3339 strings compare as instants.
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(_), Value::Number(_)) => compare_numbers(left, right),
        (Value::Number(_), Value::String(s)) => {
            let parsed: Value = s.parse::<i64>().map(Value::from).ok().or_else(|| {
                s.parse::<f64>().ok().and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
            })?;
            compare_numbers(left, &parsed)
        }
        (Value::String(_), Value::Number(_)) => compare(right, left).map(Ordering::reverse),
        (Value::String(a), Value::String(b)) => {
            match (
                DateTime::parse_from_rfc3339(a),
                DateTime::parse_from_rfc3339(b),
            ) {
                (Ok(x), Ok(y)) => Some(x.cmp(&y)),
                _ => Some(a.cmp(b)),
            }
        }
        (Value::Bool(a), Value::String(s)) => s.parse::<bool>().ok().map(|b| a.cmp(&b)),
        (Value::String(_), Value::Bool(_)) => compare(right, left).map(Ordering::reverse),
        _ => None,
    }
}

fn compare_numbers(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (left.as_u64(), right.as_u64()) {
        return Some(a.cmp(&b));
    }
    left.as_f64()?.partial_cmp(&right.as_f64()?)
}

/// Orders documents by the leaves of `order` that name top-level columns,
/// then by id ascending.
pub fn sort_documents(docs: &mut [Document], order: &OrderTree) {
    let keys: Vec<(&str, SortDirection)> = order
        .iter()
        .filter_map(|(key, node)| match node {
            PathNode::Leaf(direction) => Some((key, *direction)),
            PathNode::Branch(_) => None,
        })
        .collect();

    docs.sort_by(|a, b| {
        for (key, direction) in &keys {
            let ordering = order_values(
                a.get(*key).unwrap_or(&Value::Null),
                b.get(*key).unwrap_or(&Value::Null),
            );
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        order_values(
            a.get("id").unwrap_or(&Value::Null),
            b.get("id").unwrap_or(&Value::Null),
        )
    });
}

/// Total order for sorting; NULL sorts last ascending like Postgres.
fn order_values(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

/// Applies a projection to a document.
///
/// An empty projection keeps everything. Joined relations not mentioned in
/// the projection are kept whole.
pub fn project(doc: Document, projection: &ProjectionTree, relations: &RelationSpec) -> Document {
    if projection.is_empty() {
        return doc;
    }

    doc.into_iter()
        .filter_map(|(key, value)| match projection.get(&key) {
            Some(PathNode::Leaf(_)) => Some((key, value)),
            Some(PathNode::Branch(child)) => {
                let value = project_value(value, child);
                Some((key, value))
            }
            None if relations.contains(&key) => Some((key, value)),
            None => None,
        })
        .collect()
}

fn project_value(value: Value, projection: &ProjectionTree) -> Value {
    match value {
        Value::Object(map) => Value::Object(project(map, projection, &RelationSpec::default())),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| project_value(item, projection))
                .collect(),
        ),
        other => other,
    }
}
