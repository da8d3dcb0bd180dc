//! Route definitions for the Buyer Lead Intake service

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes
        .nest("/auth", auth_routes(state.clone()))
        // Protected routes - buyer management
        .nest("/buyers", buyer_routes(state))
}

/// Authentication routes
fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/magic-link", post(handlers::request_magic_link))
        .route("/verify", get(handlers::verify_magic_link))
        .route("/demo-login", post(handlers::demo_login))
        .merge(
            Router::new()
                .route("/session", get(handlers::current_session))
                .route_layer(middleware::from_fn_with_state(state, auth_middleware)),
        )
}

/// Buyer routes (protected)
fn buyer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_buyers).post(handlers::create_buyer))
        .route("/csv", get(handlers::export_buyers).post(handlers::import_buyers))
        .route(
            "/:id",
            get(handlers::get_buyer)
                .put(handlers::update_buyer)
                .delete(handlers::delete_buyer),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
