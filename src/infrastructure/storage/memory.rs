//! In-memory record store.
//!
//! Tables are `BTreeMap`s of documents keyed by id behind one
//! `parking_lot::RwLock`. Used for development and tests; semantics follow the
//! Postgres store (soft delete visibility, NULL handling, relation expansion).

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;

use super::eval::{self, matches, project, sort_documents};
use crate::domain::ports::{Document, RecordStore, StoreError};
use crate::domain::query::{NativeQuery, OrderTree, PathNode, RelationSpec, SortDirection};
use crate::domain::schema::{EntitySchema, RelationDef, RelationKind};

type Table = BTreeMap<i64, Document>;

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows in a table, soft-deleted included.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map(BTreeMap::len).unwrap_or(0)
    }

    fn select(
        tables: &HashMap<String, Table>,
        schema: &EntitySchema,
        query: &NativeQuery,
    ) -> Vec<Document> {
        let mut rows: Vec<Document> = tables
            .get(schema.table)
            .map(|table| {
                table
                    .values()
                    .filter(|doc| query.with_deleted || is_live(doc))
                    .filter(|doc| matches(doc, &query.filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        sort_documents(&mut rows, &query.order);
        rows
    }

    fn page(rows: Vec<Document>, query: &NativeQuery) -> Vec<Document> {
        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let iter = rows.into_iter().skip(skip);
        match query.take {
            Some(take) => iter.take(usize::try_from(take).unwrap_or(usize::MAX)).collect(),
            None => iter.collect(),
        }
    }

    fn finish(
        tables: &HashMap<String, Table>,
        schema: &EntitySchema,
        doc: Document,
        query: &NativeQuery,
    ) -> Document {
        let doc = expand_relations(tables, schema, doc, &query.relations, &query.order);
        project(doc, &query.projection, &query.relations)
    }
}

fn is_live(doc: &Document) -> bool {
    doc.get("deleted_at").map_or(true, Value::is_null)
}

fn live_rows<'a>(tables: &'a HashMap<String, Table>, table: &str) -> impl Iterator<Item = &'a Document> {
    tables
        .get(table)
        .into_iter()
        .flat_map(|t| t.values())
        .filter(|doc| is_live(doc))
}

fn id_of(doc: &Document) -> Option<i64> {
    doc.get("id").and_then(Value::as_i64)
}

fn expand_relations(
    tables: &HashMap<String, Table>,
    schema: &EntitySchema,
    mut doc: Document,
    relations: &RelationSpec,
    order: &OrderTree,
) -> Document {
    let Some(id) = id_of(&doc) else {
        return doc;
    };

    for name in relations.iter() {
        let Some(def) = schema.relation(name) else {
            continue;
        };
        let value = load_relation(tables, def, id, &doc, order.get(name));
        doc.insert(name.to_string(), value);
    }
    doc
}

fn load_relation(
    tables: &HashMap<String, Table>,
    def: &RelationDef,
    id: i64,
    doc: &Document,
    order: Option<&PathNode<SortDirection>>,
) -> Value {
    let target = (def.target)();

    let mut related: Vec<Document> = match def.kind {
        RelationKind::HasMany { foreign_key } => live_rows(tables, target.table)
            .filter(|row| row.get(foreign_key).and_then(Value::as_i64) == Some(id))
            .cloned()
            .collect(),
        RelationKind::BelongsTo { local_key } => {
            let Some(key) = doc.get(local_key).and_then(Value::as_i64) else {
                return Value::Null;
            };
            return live_rows(tables, target.table)
                .find(|row| id_of(row) == Some(key))
                .cloned()
                .map(Value::Object)
                .unwrap_or(Value::Null);
        }
        RelationKind::ManyToMany {
            through,
            local_key,
            foreign_key,
        } => {
            let linked: Vec<i64> = live_rows(tables, through)
                .filter(|link| link.get(local_key).and_then(Value::as_i64) == Some(id))
                .filter_map(|link| link.get(foreign_key).and_then(Value::as_i64))
                .collect();
            live_rows(tables, target.table)
                .filter(|row| id_of(row).map_or(false, |rid| linked.contains(&rid)))
                .cloned()
                .collect()
        }
    };

    match order {
        Some(PathNode::Branch(tree)) => sort_documents(&mut related, tree),
        _ => sort_documents(&mut related, &OrderTree::default()),
    }
    Value::Array(related.into_iter().map(Value::Object).collect())
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_by_id(
        &self,
        schema: &EntitySchema,
        id: i64,
        query: &NativeQuery,
    ) -> Result<Option<Document>, StoreError> {
        let tables = self.tables.read();
        let found = tables
            .get(schema.table)
            .and_then(|table| table.get(&id))
            .filter(|doc| query.with_deleted || is_live(doc))
            .cloned();
        Ok(found.map(|doc| Self::finish(&tables, schema, doc, query)))
    }

    async fn find_one(
        &self,
        schema: &EntitySchema,
        query: &NativeQuery,
    ) -> Result<Option<Document>, StoreError> {
        let tables = self.tables.read();
        let first = Self::select(&tables, schema, query)
            .into_iter()
            .skip(usize::try_from(query.skip).unwrap_or(usize::MAX))
            .next();
        Ok(first.map(|doc| Self::finish(&tables, schema, doc, query)))
    }

    async fn find_and_count(
        &self,
        schema: &EntitySchema,
        query: &NativeQuery,
    ) -> Result<(Vec<Document>, u64), StoreError> {
        let tables = self.tables.read();
        let rows = Self::select(&tables, schema, query);
        let total = rows.len() as u64;
        let page = Self::page(rows, query)
            .into_iter()
            .map(|doc| Self::finish(&tables, schema, doc, query))
            .collect();
        Ok((page, total))
    }

    async fn count(&self, schema: &EntitySchema, query: &NativeQuery) -> Result<u64, StoreError> {
        let tables = self.tables.read();
        let total = tables
            .get(schema.table)
            .map(|table| {
                table
                    .values()
                    .filter(|doc| query.with_deleted || is_live(doc))
                    .filter(|doc| matches(doc, &query.filter))
                    .count()
            })
            .unwrap_or(0);
        Ok(total as u64)
    }

    async fn insert(
        &self,
        schema: &EntitySchema,
        rows: Vec<Document>,
    ) -> Result<Vec<Document>, StoreError> {
        let mut tables = self.tables.write();
        let table = tables.entry(schema.table.to_string()).or_default();

        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = id_of(row)
                .ok_or_else(|| StoreError::Unsupported("row without an integer id".into()))?;
            if table.contains_key(&id) || ids.contains(&id) {
                return Err(StoreError::Unsupported(format!(
                    "duplicate id {} in {}",
                    id, schema.table
                )));
            }
            ids.push(id);
        }

        for (id, row) in ids.into_iter().zip(rows.iter()) {
            table.insert(id, row.clone());
        }
        Ok(rows)
    }

    async fn update_by_id(
        &self,
        schema: &EntitySchema,
        id: i64,
        patch: &Document,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.write();
        let Some(row) = tables
            .get_mut(schema.table)
            .and_then(|table| table.get_mut(&id))
            .filter(|doc| is_live(doc))
        else {
            return Ok(0);
        };

        for (key, value) in patch {
            if key != "id" && schema.column(key).is_some() {
                row.insert(key.clone(), value.clone());
            }
        }
        row.insert("updated_at".into(), eval::timestamp(Utc::now()));
        Ok(1)
    }

    async fn soft_delete(&self, schema: &EntitySchema, ids: &[i64]) -> Result<u64, StoreError> {
        let mut tables = self.tables.write();
        let Some(table) = tables.get_mut(schema.table) else {
            return Ok(0);
        };

        let now = eval::timestamp(Utc::now());
        let mut affected = 0;
        for id in ids {
            if let Some(row) = table.get_mut(id).filter(|doc| is_live(doc)) {
                row.insert("deleted_at".into(), now.clone());
                row.insert("updated_at".into(), now.clone());
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn hard_delete(&self, schema: &EntitySchema, ids: &[i64]) -> Result<u64, StoreError> {
        let mut tables = self.tables.write();
        let Some(table) = tables.get_mut(schema.table) else {
            return Ok(0);
        };
        Ok(ids.iter().filter(|id| table.remove(*id).is_some()).count() as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
