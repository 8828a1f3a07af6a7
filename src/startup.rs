//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::application::services::{
    AuthService, AuthServiceImpl, ConversationService, ConversationServiceImpl, MessageFanout,
    MessageService, MessageServiceImpl, PresenceRegistry, ProfileService, RecordContext,
    UserConversationService, UserService, UserServiceImpl,
};
use crate::config::{Settings, StorageBackend};
use crate::domain::ports::{RecordStore, TokenService};
use crate::infrastructure::auth::JwtTokenService;
use crate::infrastructure::cache::{self, MemoryQueryCache, RedisQueryCache};
use crate::infrastructure::database;
use crate::infrastructure::storage::{MemoryStore, PgStore};
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging, request_context};
use crate::presentation::websocket::ConnectionHub;
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub records: RecordContext,
    pub tokens: Arc<dyn TokenService>,
    pub auth: Arc<dyn AuthService>,
    pub users: Arc<dyn UserService>,
    pub profiles: ProfileService,
    pub conversations: Arc<dyn ConversationService>,
    pub messages: Arc<dyn MessageService>,
    pub links: UserConversationService,
    pub presence: PresenceRegistry,
    pub fanout: MessageFanout,
    pub hub: Arc<ConnectionHub>,
}

impl AppState {
    /// Wire every service on top of one record context
    pub fn new(settings: Settings, records: RecordContext) -> Self {
        let tokens: Arc<dyn TokenService> = Arc::new(JwtTokenService::new(&settings.jwt));
        let hub = Arc::new(ConnectionHub::new());

        Self {
            auth: Arc::new(AuthServiceImpl::new(
                &records,
                tokens.clone(),
                settings.jwt.refresh_token_expiry_days,
            )),
            users: Arc::new(UserServiceImpl::new(&records)),
            profiles: ProfileService::new(&records),
            conversations: Arc::new(ConversationServiceImpl::new(&records)),
            messages: Arc::new(MessageServiceImpl::new(&records)),
            links: UserConversationService::new(&records),
            presence: PresenceRegistry::new(&records),
            fanout: MessageFanout::new(&records, hub.clone()),
            hub,
            tokens,
            records,
            settings: Arc::new(settings),
        }
    }

    /// State over the in-memory store with an in-process query cache
    pub fn in_memory(settings: Settings) -> Self {
        let records = RecordContext::new(Arc::new(MemoryStore::new()), snowflake(&settings))
            .with_cache(
                Arc::new(MemoryQueryCache::new()),
                settings.query.default_cache_ttl_ms,
            );
        Self::new(settings, records)
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.records.store
    }
}

fn snowflake(settings: &Settings) -> Arc<SnowflakeGenerator> {
    Arc::new(SnowflakeGenerator::new(
        settings.snowflake.machine_id as u64,
        settings.snowflake.node_id as u64,
    ))
}

/// Build the router with every middleware layer applied
pub fn build_router(state: AppState) -> Router {
    let cors = cors::create_cors_layer(&state.settings.cors);

    routes::create_router(state)
        .layer(middleware::from_fn(logging::track_metrics))
        .layer(logging::create_trace_layer())
        .layer(middleware::from_fn(request_context))
        .layer(CompressionLayer::new())
        .layer(cors)
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let store: Arc<dyn RecordStore> = match settings.storage.backend {
            StorageBackend::Memory => {
                tracing::warn!("Using the in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
            StorageBackend::Postgres => {
                let pool = database::create_pool(&settings.database).await?;
                tracing::info!("Database connection pool created");
                if settings.database.run_migrations {
                    database::run_migrations(&pool).await?;
                    tracing::info!("Database schema is up to date");
                }
                Arc::new(PgStore::new(pool))
            }
        };

        let ttl = settings.query.default_cache_ttl_ms;
        let records = RecordContext::new(store, snowflake(&settings));
        let records = match settings.redis.url.as_deref() {
            Some(url) => {
                let conn = cache::create_redis_client(url).await?;
                records.with_cache(Arc::new(RedisQueryCache::new(conn)), ttl)
            }
            None => records.with_cache(Arc::new(MemoryQueryCache::new()), ttl),
        };

        let addr: SocketAddr = settings.server_addr().parse()?;
        let state = AppState::new(settings, records);
        let router = build_router(state);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
