//! Query DSL
//!
//! Storage-agnostic request shape consumed by the query compiler.
//!
//! ```json
//! {
//!   "where": { "and": [{ "user_id": { "in": [1, 2] } }, { "kind": "socket_id" }] },
//!   "select": ["connection_id"],
//!   "join": ["users"],
//!   "sort": ["-created_at"],
//!   "page": 1,
//!   "pageSize": 10,
//!   "withDeleted": false,
//!   "cache": 30000
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Page number used when the request omits one.
pub const DEFAULT_PAGE: u64 = 1;

/// Page size used when the request omits one.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Largest page size a request may ask for.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Filter applied to a single field.
///
/// An object is read as a set of `operator -> operand` pairs; anything else is
/// shorthand for `eq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldFilter {
    Operators(Map<String, Value>),
    Value(Value),
}

impl FieldFilter {
    /// Single `operator -> operand` pair.
    pub fn op(operator: &str, operand: impl Into<Value>) -> Self {
        let mut map = Map::new();
        map.insert(operator.to_string(), operand.into());
        Self::Operators(map)
    }

    pub fn eq(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn ne(value: impl Into<Value>) -> Self {
        Self::op("ne", value)
    }

    pub fn gt(value: impl Into<Value>) -> Self {
        Self::op("gt", value)
    }

    pub fn gte(value: impl Into<Value>) -> Self {
        Self::op("gte", value)
    }

    pub fn lt(value: impl Into<Value>) -> Self {
        Self::op("lt", value)
    }

    pub fn lte(value: impl Into<Value>) -> Self {
        Self::op("lte", value)
    }

    pub fn contain(value: impl Into<Value>) -> Self {
        Self::op("contain", value)
    }

    pub fn is_in<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Self {
        Self::op("in", Value::Array(values.into_iter().map(Into::into).collect()))
    }

    pub fn not_in<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Self {
        Self::op("notin", Value::Array(values.into_iter().map(Into::into).collect()))
    }

    pub fn is_null() -> Self {
        Self::op("isnull", true)
    }

    pub fn not_null() -> Self {
        Self::op("notnull", true)
    }

    pub fn between(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::op("between", Value::Array(vec![low.into(), high.into()]))
    }

    /// Adds another operator to this filter, turning a bare value into `eq`.
    pub fn and_op(self, operator: &str, operand: impl Into<Value>) -> Self {
        let mut map = match self {
            Self::Operators(map) => map,
            Self::Value(value) => {
                let mut map = Map::new();
                map.insert("eq".to_string(), value);
                map
            }
        };
        map.insert(operator.to_string(), operand.into());
        Self::Operators(map)
    }
}

/// Field name -> filter; every entry must hold.
pub type FieldMap = BTreeMap<String, FieldFilter>;

/// Builds a [`FieldMap`] from `(field, filter)` pairs.
pub fn fields<K: Into<String>>(pairs: impl IntoIterator<Item = (K, FieldFilter)>) -> FieldMap {
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// The `where` clause.
///
/// On the wire this is a single JSON object: the reserved keys `and` and `or`
/// hold lists of field maps, every other key is a field filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct WhereClause {
    /// Top-level fields, implicitly ANDed.
    pub fields: FieldMap,
    /// Explicit AND groups.
    pub and: Vec<FieldMap>,
    /// Alternatives; at least one must hold when present.
    pub or: Vec<FieldMap>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a top-level field filter.
    pub fn field(mut self, name: impl Into<String>, filter: FieldFilter) -> Self {
        self.fields.insert(name.into(), filter);
        self
    }

    /// Appends an AND group.
    pub fn and(mut self, group: FieldMap) -> Self {
        self.and.push(group);
        self
    }

    /// Appends an OR branch.
    pub fn or(mut self, branch: FieldMap) -> Self {
        self.or.push(branch);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.and.is_empty() && self.or.is_empty()
    }
}

impl TryFrom<Map<String, Value>> for WhereClause {
    type Error = String;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut clause = WhereClause::default();
        for (key, value) in map {
            match key.as_str() {
                "and" => clause.and = parse_groups("and", value)?,
                "or" => clause.or = parse_groups("or", value)?,
                _ => {
                    let filter = serde_json::from_value(value)
                        .map_err(|e| format!("invalid filter for field `{}`: {}", key, e))?;
                    clause.fields.insert(key, filter);
                }
            }
        }
        Ok(clause)
    }
}

fn parse_groups(key: &str, value: Value) -> Result<Vec<FieldMap>, String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<FieldMap>(item)
                    .map_err(|e| format!("`{}` entries must be field maps: {}", key, e))
            })
            .collect(),
        // A single map is accepted as a one-element list.
        Value::Object(_) => serde_json::from_value::<FieldMap>(value)
            .map(|group| vec![group])
            .map_err(|e| format!("`{}` entries must be field maps: {}", key, e)),
        _ => Err(format!("`{}` must be a list of field maps", key)),
    }
}

impl From<WhereClause> for Map<String, Value> {
    fn from(clause: WhereClause) -> Self {
        let mut map = Map::new();
        for (field, filter) in clause.fields {
            map.insert(field, serde_json::to_value(filter).unwrap_or(Value::Null));
        }
        if !clause.and.is_empty() {
            map.insert(
                "and".into(),
                serde_json::to_value(clause.and).unwrap_or(Value::Null),
            );
        }
        if !clause.or.is_empty() {
            map.insert(
                "or".into(),
                serde_json::to_value(clause.or).unwrap_or(Value::Null),
            );
        }
        map
    }
}

/// Whether a read may be served from the query cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CacheOption {
    Enabled(bool),
    /// Time to live in milliseconds.
    Ttl(u64),
}

impl CacheOption {
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Enabled(enabled) => *enabled,
            Self::Ttl(ms) => *ms > 0,
        }
    }

    /// Explicit TTL, if one was given.
    pub fn ttl_ms(&self) -> Option<u64> {
        match self {
            Self::Enabled(_) => None,
            Self::Ttl(ms) => Some(*ms),
        }
    }
}

/// A complete read request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryRequest {
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<WhereClause>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub select: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub join: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u64>,
    pub with_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheOption>,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, clause: WhereClause) -> Self {
        self.filter = Some(clause);
        self
    }

    /// Shorthand for a single explicit AND group.
    pub fn matching(self, group: FieldMap) -> Self {
        self.filter(WhereClause::new().and(group))
    }

    pub fn select<S: Into<String>>(mut self, paths: impl IntoIterator<Item = S>) -> Self {
        self.select = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn join<S: Into<String>>(mut self, relations: impl IntoIterator<Item = S>) -> Self {
        self.join = relations.into_iter().map(Into::into).collect();
        self
    }

    pub fn sort<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.sort = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn page(mut self, page: u64, page_size: u64) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    pub fn with_deleted(mut self, with_deleted: bool) -> Self {
        self.with_deleted = with_deleted;
        self
    }

    pub fn cached(mut self, option: CacheOption) -> Self {
        self.cache = Some(option);
        self
    }

    /// Effective `(page, page_size)`; out-of-range values fall back to defaults.
    pub fn pagination(&self) -> (u64, u64) {
        let page = self.page.filter(|p| *p >= 1).unwrap_or(DEFAULT_PAGE);
        let page_size = self
            .page_size
            .filter(|s| *s >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        (page, page_size)
    }
}
