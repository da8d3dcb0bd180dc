//! Buyer Lead Intake - Backend library
//!
//! Capture and manage real-estate buyer leads: validated intake, filtered
//! listing, optimistic-concurrency updates with change history, and CSV
//! import/export.

use std::{sync::Arc, time::Duration};

use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;

pub use config::Config;
use config::StorageBackend;
use repository::{BuyerRepository, MemoryStore, PgRepository, UserRepository};
use services::RateLimiter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub buyers: Arc<dyn BuyerRepository>,
    pub users: Arc<dyn UserRepository>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// State over the in-process store
    pub fn in_memory(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let rate_limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        Self::with_store(config, store, rate_limiter)
    }

    /// State over one store implementing both repositories
    pub fn with_store<S>(config: Config, store: Arc<S>, rate_limiter: Arc<RateLimiter>) -> Self
    where
        S: BuyerRepository + UserRepository + 'static,
    {
        Self {
            config: Arc::new(config),
            buyers: store.clone(),
            users: store,
            rate_limiter,
        }
    }

    /// Build state for the configured storage backend
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        match config.storage.backend {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Ok(Self::in_memory(config))
            }
            StorageBackend::Postgres => {
                // Create database connection pool
                tracing::info!("Connecting to database...");
                let db_pool = PgPoolOptions::new()
                    .max_connections(config.database.max_connections)
                    .min_connections(config.database.min_connections)
                    .acquire_timeout(Duration::from_secs(30))
                    .connect(&config.database.url)
                    .await?;

                tracing::info!("Database connection established");

                // Run migrations in development
                if config.environment == "development" {
                    tracing::info!("Running database migrations...");
                    sqlx::migrate!("./migrations").run(&db_pool).await?;
                    tracing::info!("Migrations completed");
                }

                let rate_limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
                Ok(Self::with_store(
                    config,
                    Arc::new(PgRepository::new(db_pool)),
                    rate_limiter,
                ))
            }
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Buyer Lead Intake API v1.0"
}
