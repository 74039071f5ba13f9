//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use redis::aio::ConnectionManager;
use tokio::net::TcpListener;

use crate::application::services::{ChatServiceImpl, DeliveryService};
use crate::config::Settings;
use crate::domain::{ConversationRepository, MessageRepository, UserDirectory};
use crate::infrastructure::cache::{self, CachedUserDirectory, RedisCache};
use crate::infrastructure::database;
use crate::infrastructure::repositories::{
    PgConversationRepository, PgMessageRepository, PgUserDirectory,
};
use crate::presentation::http::{handlers, routes};
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::Gateway;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatServiceImpl>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub gateway: Arc<Gateway>,
    /// Only used by the readiness probe; absent when running without Redis.
    pub redis: Option<ConnectionManager>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire the chat services over the given stores.
    pub fn new(
        settings: Settings,
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let gateway = Arc::new(Gateway::with_heartbeat_interval(
            settings.websocket.heartbeat_interval_ms,
        ));
        let chat = Arc::new(
            ChatServiceImpl::new(conversations.clone(), messages, directory, gateway.clone())
                .with_rest_push_fanout(settings.chat.rest_push_fanout),
        );

        Self {
            chat,
            conversations,
            gateway,
            redis: None,
            settings: Arc::new(settings),
        }
    }

    pub fn with_redis(mut self, redis: ConnectionManager) -> Self {
        self.redis = Some(redis);
        self
    }

    /// Push-channel operations over the shared chat service.
    pub fn delivery_service(&self) -> DeliveryService {
        DeliveryService::new(self.chat.clone())
    }
}

/// Build the full router (routes plus cross-cutting layers) for a state.
pub fn build_router(state: AppState) -> Router {
    let cors = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state)
        .layer(logging::create_trace_layer())
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
        let db = database::connect(&settings.database).await?;
        tracing::info!("Database connection pool created");

        let redis = cache::create_redis_client(&settings.redis).await?;

        let directory = CachedUserDirectory::new(
            PgUserDirectory::new(db.clone()),
            Arc::new(RedisCache::new(
                redis.clone(),
                settings.redis.key_prefix.clone(),
            )),
            settings.redis.profile_ttl_secs,
        );

        let addr = settings.server_addr();
        let state = AppState::new(
            settings,
            Arc::new(PgConversationRepository::new(db.clone())),
            Arc::new(PgMessageRepository::new(db)),
            Arc::new(directory),
        )
        .with_redis(redis);

        handlers::health::init_server_start();
        let router = build_router(state);

        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

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
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
