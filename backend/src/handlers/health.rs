//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::config::StorageBackend;
use crate::models::BuyerFilter;
use crate::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub storage_backend: StorageBackend,
    pub storage: &'static str,
    /// Stored buyer leads, absent when storage is unreachable
    pub buyer_count: Option<u64>,
}

/// Liveness plus a look at the buyer store
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let buyer_count = match state.buyers.ping().await {
        Ok(()) => state.buyers.count_buyers(&BuyerFilter::default()).await.ok(),
        Err(e) => {
            tracing::warn!(backend = ?state.config.storage.backend, "Buyer store unreachable: {}", e);
            None
        }
    };

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        storage_backend: state.config.storage.backend,
        storage: if buyer_count.is_some() { "connected" } else { "disconnected" },
        buyer_count,
    })
}
