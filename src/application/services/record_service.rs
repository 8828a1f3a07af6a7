//! Generic Record Service
//!
//! CRUD over any [`Entity`] on top of the query compiler and a
//! [`RecordStore`]. The service owns ids, audit timestamps and soft delete;
//! domain rules live in the services that compose it.

use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{error, instrument, warn};

use crate::domain::ports::{Document, QueryCache, RecordStore};
use crate::domain::query::{
    compile_query, fingerprint, NativeQuery, QueryError, QueryRequest,
};
use crate::domain::schema::{Entity, EntitySchema, RelationKind};
use crate::infrastructure::metrics;
use crate::shared::snowflake::SnowflakeGenerator;

/// Upper bound on rows returned by [`RecordService::find_all`].
pub const FIND_ALL_LIMIT: u64 = 1000;

/// Columns a patch may never set.
const PROTECTED_COLUMNS: [&str; 4] = ["id", "created_at", "updated_at", "deleted_at"];

/// Record service errors.
///
/// Storage failures are logged with their cause and collapse into one fixed
/// message per operation.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Failed to find entity")]
    FindFailed,

    #[error("Failed to create entity")]
    CreateFailed,

    #[error("Failed to update entity")]
    UpdateFailed,

    #[error("Failed to delete entity")]
    DeleteFailed,

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// How rows are removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Set `deleted_at`; the row disappears from default reads.
    #[default]
    Soft,
    /// Remove the row.
    Hard,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Matches ignoring pagination
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Dependencies shared by every record service.
#[derive(Clone)]
pub struct RecordContext {
    pub store: Arc<dyn RecordStore>,
    pub ids: Arc<SnowflakeGenerator>,
    pub cache: Option<Arc<dyn QueryCache>>,
    /// TTL applied when a request enables caching without one
    pub default_ttl_ms: u64,
}

impl RecordContext {
    pub fn new(store: Arc<dyn RecordStore>, ids: Arc<SnowflakeGenerator>) -> Self {
        Self {
            store,
            ids,
            cache: None,
            default_ttl_ms: 30_000,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn QueryCache>, default_ttl_ms: u64) -> Self {
        self.cache = Some(cache);
        self.default_ttl_ms = default_ttl_ms;
        self
    }
}

/// Record service for one entity type.
pub struct RecordService<E: Entity> {
    ctx: RecordContext,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for RecordService<E> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> RecordService<E> {
    pub fn new(ctx: &RecordContext) -> Self {
        Self {
            ctx: ctx.clone(),
            _entity: PhantomData,
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Live row by id. Absence is not an error.
    #[instrument(skip(self), fields(table = E::schema().table))]
    pub async fn find_one_by_id(&self, id: i64) -> Result<Option<E>, RecordError> {
        self.timed("find_one_by_id", self.fetch_by_id(id, false)).await
    }

    /// First row matching `request`.
    #[instrument(skip(self, request), fields(table = E::schema().table))]
    pub async fn find_one(&self, request: &QueryRequest) -> Result<Option<E>, RecordError> {
        self.timed("find_one", async {
            let query = &single(compile_query(request, E::schema())?);
            self.read_through("find_one", request, query, move || self.fetch_one(query))
                .await
        })
        .await
    }

    /// One page plus the total match count.
    #[instrument(skip(self, request), fields(table = E::schema().table))]
    pub async fn find_many(&self, request: &QueryRequest) -> Result<Page<E>, RecordError> {
        self.timed("find_many", async {
            let query = &compile_query(request, E::schema())?;
            let (page, page_size) = request.pagination();
            self.read_through("find_many", request, query, move || async move {
                let (rows, total) = self
                    .ctx
                    .store
                    .find_and_count(E::schema(), query)
                    .await
                    .map_err(|e| failure(RecordError::FindFailed, E::schema().table, e))?;
                Ok(Page {
                    data: to_entities(rows, RecordError::FindFailed)?,
                    total,
                    page,
                    page_size,
                })
            })
            .await
        })
        .await
    }

    /// Every match up to [`FIND_ALL_LIMIT`]; pagination is ignored.
    #[instrument(skip(self, request), fields(table = E::schema().table))]
    pub async fn find_all(&self, request: &QueryRequest) -> Result<Vec<E>, RecordError> {
        self.timed("find_all", async {
            let query = &unbounded(compile_query(request, E::schema())?);
            self.read_through("find_all", request, query, move || self.fetch_all(query))
                .await
        })
        .await
    }

    /// Number of matches. Only `where` and `withDeleted` matter.
    #[instrument(skip(self, request), fields(table = E::schema().table))]
    pub async fn count(&self, request: &QueryRequest) -> Result<u64, RecordError> {
        self.timed("count", async {
            let compiled = compile_query(request, E::schema())?;
            let query = &NativeQuery {
                filter: compiled.filter,
                with_deleted: compiled.with_deleted,
                ..NativeQuery::default()
            };
            self.read_through("count", request, query, move || async move {
                self.ctx
                    .store
                    .count(E::schema(), query)
                    .await
                    .map_err(|e| failure(RecordError::FindFailed, E::schema().table, e))
            })
            .await
        })
        .await
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Inserts an entity under a fresh id and returns it as stored.
    #[instrument(skip(self, entity), fields(table = E::schema().table))]
    pub async fn create_one(&self, entity: E) -> Result<E, RecordError> {
        self.timed("create_one", async {
            self.insert(vec![entity])
                .await?
                .into_iter()
                .next()
                .ok_or(RecordError::CreateFailed)
        })
        .await
    }

    #[instrument(skip(self, entities), fields(table = E::schema().table, count = entities.len()))]
    pub async fn create_many(&self, entities: Vec<E>) -> Result<Vec<E>, RecordError> {
        self.timed("create_many", self.insert(entities)).await
    }

    /// Shallow-merges `patch` into a live row and returns the updated row.
    ///
    /// `id` and audit columns in the patch are ignored.
    #[instrument(skip(self, patch), fields(table = E::schema().table))]
    pub async fn update_one_by_id(&self, id: i64, patch: Document) -> Result<E, RecordError> {
        self.timed("update_one_by_id", async {
            let patch = sanitize_patch::<E>(patch)?;
            self.apply_update(id, &patch).await
        })
        .await
    }

    /// Updates the first match. `None` when nothing matched.
    #[instrument(skip(self, request, patch), fields(table = E::schema().table))]
    pub async fn update_one(
        &self,
        request: &QueryRequest,
        patch: Document,
    ) -> Result<Option<E>, RecordError> {
        self.timed("update_one", async {
            let patch = sanitize_patch::<E>(patch)?;
            let query = single(compile_query(request, E::schema())?);
            match self.fetch_one(&query).await? {
                Some(found) => self.apply_update(found.id(), &patch).await.map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    /// Updates every match. `None` when nothing matched.
    #[instrument(skip(self, request, patch), fields(table = E::schema().table))]
    pub async fn update_many(
        &self,
        request: &QueryRequest,
        patch: Document,
    ) -> Result<Option<Vec<E>>, RecordError> {
        self.timed("update_many", async {
            let patch = sanitize_patch::<E>(patch)?;
            let query = unbounded(compile_query(request, E::schema())?);
            let found = self.fetch_all(&query).await?;
            if found.is_empty() {
                return Ok(None);
            }

            let mut updated = Vec::with_capacity(found.len());
            for row in found {
                updated.push(self.apply_update(row.id(), &patch).await?);
            }
            Ok(Some(updated))
        })
        .await
    }

    /// Deletes a row by id and returns it as it was. `None` when it did not exist.
    #[instrument(skip(self), fields(table = E::schema().table))]
    pub async fn delete_one_by_id(
        &self,
        id: i64,
        mode: DeleteMode,
    ) -> Result<Option<E>, RecordError> {
        self.timed("delete_one_by_id", async {
            let found = self
                .fetch_by_id(id, mode == DeleteMode::Hard)
                .await
                .map_err(|_| RecordError::DeleteFailed)?;
            match found {
                Some(row) => {
                    self.remove(&[row.id()], mode).await?;
                    Ok(Some(row))
                }
                None => Ok(None),
            }
        })
        .await
    }

    #[instrument(skip(self, request), fields(table = E::schema().table))]
    pub async fn delete_one(
        &self,
        request: &QueryRequest,
        mode: DeleteMode,
    ) -> Result<Option<E>, RecordError> {
        self.timed("delete_one", async {
            let query = single(compile_query(request, E::schema())?);
            match self.fetch_one(&query).await? {
                Some(row) => {
                    self.remove(&[row.id()], mode).await?;
                    Ok(Some(row))
                }
                None => Ok(None),
            }
        })
        .await
    }

    #[instrument(skip(self, request), fields(table = E::schema().table))]
    pub async fn delete_many(
        &self,
        request: &QueryRequest,
        mode: DeleteMode,
    ) -> Result<Option<Vec<E>>, RecordError> {
        self.timed("delete_many", async {
            let query = unbounded(compile_query(request, E::schema())?);
            let found = self.fetch_all(&query).await?;
            if found.is_empty() {
                return Ok(None);
            }
            let ids: Vec<i64> = found.iter().map(Entity::id).collect();
            self.remove(&ids, mode).await?;
            Ok(Some(found))
        })
        .await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn fetch_by_id(&self, id: i64, with_deleted: bool) -> Result<Option<E>, RecordError> {
        let query = NativeQuery {
            with_deleted,
            ..NativeQuery::default()
        };
        let row = self
            .ctx
            .store
            .find_by_id(E::schema(), id, &query)
            .await
            .map_err(|e| failure(RecordError::FindFailed, E::schema().table, e))?;
        row.map(|doc| to_entity(doc, RecordError::FindFailed))
            .transpose()
    }

    async fn fetch_one(&self, query: &NativeQuery) -> Result<Option<E>, RecordError> {
        let row = self
            .ctx
            .store
            .find_one(E::schema(), query)
            .await
            .map_err(|e| failure(RecordError::FindFailed, E::schema().table, e))?;
        row.map(|doc| to_entity(doc, RecordError::FindFailed))
            .transpose()
    }

    async fn fetch_all(&self, query: &NativeQuery) -> Result<Vec<E>, RecordError> {
        let (rows, _) = self
            .ctx
            .store
            .find_and_count(E::schema(), query)
            .await
            .map_err(|e| failure(RecordError::FindFailed, E::schema().table, e))?;
        to_entities(rows, RecordError::FindFailed)
    }

    async fn insert(&self, entities: Vec<E>) -> Result<Vec<E>, RecordError> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let schema = E::schema();
        let now = json!(Utc::now());

        let mut rows = Vec::with_capacity(entities.len());
        for entity in &entities {
            let mut row = match serde_json::to_value(entity) {
                Ok(Value::Object(map)) => map,
                Ok(other) => {
                    return Err(failure(
                        RecordError::CreateFailed,
                        schema.table,
                        format!("entity serialized to {}", other),
                    ))
                }
                Err(e) => return Err(failure(RecordError::CreateFailed, schema.table, e)),
            };
            row.retain(|key, _| schema.column(key).is_some());
            row.insert("id".into(), Value::from(self.ctx.ids.generate()));
            row.insert("created_at".into(), now.clone());
            row.insert("updated_at".into(), now.clone());
            row.insert("deleted_at".into(), Value::Null);
            rows.push(row);
        }

        let stored = self
            .ctx
            .store
            .insert(schema, rows)
            .await
            .map_err(|e| failure(RecordError::CreateFailed, schema.table, e))?;
        self.invalidate().await;
        to_entities(stored, RecordError::CreateFailed)
    }

    async fn apply_update(&self, id: i64, patch: &Document) -> Result<E, RecordError> {
        let table = E::schema().table;
        let affected = self
            .ctx
            .store
            .update_by_id(E::schema(), id, patch)
            .await
            .map_err(|e| failure(RecordError::UpdateFailed, table, e))?;
        if affected == 0 {
            warn!(table, id, "Update matched no live row");
            return Err(RecordError::UpdateFailed);
        }
        self.invalidate().await;

        self.fetch_by_id(id, false)
            .await
            .map_err(|_| RecordError::UpdateFailed)?
            .ok_or(RecordError::UpdateFailed)
    }

    async fn remove(&self, ids: &[i64], mode: DeleteMode) -> Result<(), RecordError> {
        let table = E::schema().table;
        let result = match mode {
            DeleteMode::Soft => self.ctx.store.soft_delete(E::schema(), ids).await,
            DeleteMode::Hard => self.ctx.store.hard_delete(E::schema(), ids).await,
        };
        let affected = result.map_err(|e| failure(RecordError::DeleteFailed, table, e))?;
        if affected == 0 {
            warn!(table, ?ids, ?mode, "Delete affected no rows");
            return Err(RecordError::DeleteFailed);
        }
        self.invalidate().await;
        Ok(())
    }

    async fn invalidate(&self) {
        if let Some(cache) = &self.ctx.cache {
            cache.invalidate(E::schema().table).await;
        }
    }

    /// Serves a read from the query cache when the request opts in.
    async fn read_through<T, F, Fut>(
        &self,
        operation: &str,
        request: &QueryRequest,
        query: &NativeQuery,
        load: F,
    ) -> Result<T, RecordError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RecordError>>,
    {
        let (cache, option) = match (&self.ctx.cache, &request.cache) {
            (Some(cache), Some(option)) if option.is_enabled() => (cache, option),
            _ => return load().await,
        };
        let table = E::schema().table;
        let mut generations = Vec::new();
        for source in source_tables(E::schema(), query) {
            generations.push((source, cache.generation(source).await));
        }
        let key = cache_key(table, operation, &generations, query);

        if let Some(hit) = cache.get(&key).await {
            match serde_json::from_value(hit) {
                Ok(value) => {
                    metrics::record_operation(operation, table, "cache_hit", 0.0);
                    return Ok(value);
                }
                Err(e) => warn!(table, error = %e, "Discarding unreadable cache entry"),
            }
        }

        let value = load().await?;
        match serde_json::to_value(&value) {
            Ok(json) => {
                let ttl = option.ttl_ms().unwrap_or(self.ctx.default_ttl_ms);
                cache.put(&key, &json, ttl).await;
            }
            Err(e) => warn!(table, error = %e, "Result is not cacheable"),
        }
        Ok(value)
    }

    async fn timed<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, RecordError>>,
    ) -> Result<T, RecordError> {
        let started = Instant::now();
        let result = fut.await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::record_operation(
            operation,
            E::schema().table,
            outcome,
            started.elapsed().as_secs_f64(),
        );
        result
    }
}

/// Logs a storage failure and returns the operation's fixed error.
fn failure(kind: RecordError, table: &str, cause: impl Display) -> RecordError {
    error!(table, error = %cause, "{}", kind);
    kind
}

fn to_entity<E: Entity>(doc: Document, kind: RecordError) -> Result<E, RecordError> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| failure(kind, E::schema().table, e))
}

fn to_entities<E: Entity>(docs: Vec<Document>, kind: RecordError) -> Result<Vec<E>, RecordError> {
    let table = E::schema().table;
    docs.into_iter()
        .map(|doc| serde_json::from_value(Value::Object(doc)))
        .collect::<Result<Vec<E>, _>>()
        .map_err(|e| failure(kind, table, e))
}

fn single(query: NativeQuery) -> NativeQuery {
    NativeQuery {
        skip: 0,
        take: Some(1),
        ..query
    }
}

fn unbounded(query: NativeQuery) -> NativeQuery {
    NativeQuery {
        skip: 0,
        take: Some(FIND_ALL_LIMIT),
        ..query
    }
}

/// Drops protected columns; any other key must be a column.
fn sanitize_patch<E: Entity>(mut patch: Document) -> Result<Document, RecordError> {
    let schema = E::schema();
    patch.retain(|key, _| !PROTECTED_COLUMNS.contains(&key.as_str()));
    if let Some(key) = patch.keys().find(|key| schema.column(key).is_none()) {
        return Err(QueryError::UnknownField {
            table: schema.table.to_string(),
            field: key.clone(),
        }
        .into());
    }
    Ok(patch)
}

/// The entity's table plus every table a joined relation reads from.
fn source_tables(schema: &EntitySchema, query: &NativeQuery) -> Vec<&'static str> {
    let mut tables = vec![schema.table];
    for def in query.relations.iter().filter_map(|name| schema.relation(name)) {
        let mut add = |table: &'static str| {
            if !tables.contains(&table) {
                tables.push(table);
            }
        };
        add((def.target)().table);
        if let RelationKind::ManyToMany { through, .. } = def.kind {
            add(through);
        }
    }
    tables
}

/// `<table>:<sha256(operation, source generations, compiled query)>`
fn cache_key(
    table: &str,
    operation: &str,
    generations: &[(&str, u64)],
    query: &NativeQuery,
) -> String {
    let material = json!({
        "op": operation,
        "gen": generations,
        "query": fingerprint(query),
    });
    let mut hasher = Sha256::new();
    hasher.update(material.to_string().as_bytes());
    format!("{}:{:x}", table, hasher.finalize())
}
