//! Bank ledger service.
//!
//! A REST API for managing bank customers and their accounts, and for moving
//! money through deposit, withdrawal and transfer.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Ledger**: [`services::ledger::Ledger`], the only code that changes balances
//! - **Store**: PostgreSQL with sqlx, or an in-memory store for tests
//! - **Authentication**: shared API key, SHA-256 hashed
//! - **Format**: JSON requests/responses

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod store;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the HTTP router.
///
/// Everything except `/health` sits behind the API key middleware.
pub fn router(state: AppState) -> Router {
    let authenticated_routes = Router::new()
        // User routes
        .route(
            "/users",
            get(handlers::users::list_users).post(handlers::users::create_user),
        )
        .route(
            "/users/{id}",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        // Account routes
        .route(
            "/users/{id}/bankAccounts",
            post(handlers::accounts::create_account).get(handlers::accounts::list_user_accounts),
        )
        .route(
            "/bankAccounts/{id}",
            get(handlers::accounts::get_account)
                .put(handlers::accounts::rename_account)
                .delete(handlers::accounts::delete_account),
        )
        .route(
            "/bankAccounts/{id}/withdraw",
            put(handlers::accounts::withdraw),
        )
        .route("/bankAccounts/{id}/deposit", put(handlers::accounts::deposit))
        // Money movement
        .route("/transfers", post(handlers::transfers::create_transfer))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .merge(authenticated_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
