//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use crate::api::websocket::ws_handler;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// JSON 404 for unknown paths
async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "application/json")],
        Body::from(r#"{"error":"Not Found","code":"NotFound"}"#),
    )
}

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Event stream
        .route("/ws", get(ws_handler))
        // Wallets
        .route(
            "/api/wallets",
            get(handlers::list_wallets).post(handlers::create_wallet),
        )
        .route("/api/wallets/{address}", get(handlers::get_wallet))
        // Transactions
        .route(
            "/api/wallets/{address}/transactions",
            get(handlers::list_transactions).post(handlers::initiate_transaction),
        )
        .route(
            "/api/wallets/{address}/transactions/{id}",
            get(handlers::get_transaction),
        )
        .route(
            "/api/wallets/{address}/transactions/{id}/vote",
            post(handlers::vote_for_transaction),
        )
        .route(
            "/api/wallets/{address}/transactions/{id}/reset",
            post(handlers::reset_vote),
        )
        .route(
            "/api/wallets/{address}/transactions/{id}/finalize",
            post(handlers::finalize_transaction),
        )
        .route(
            "/api/wallets/{address}/transactions/{id}/votes/{signatory}",
            get(handlers::get_signatory_vote),
        )
        // Ledger
        .route("/api/ledger/{address}", get(handlers::get_balance))
        .route("/api/ledger/{address}/deposit", post(handlers::deposit))
        .fallback(fallback_handler)
        .with_state(state)
        .layer(cors)
}

/// Routes printed when the server starts
pub const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/health", "Health check"),
    ("GET", "/ws", "Wallet event stream"),
    ("GET", "/api/wallets", "List wallets (?owner=)"),
    ("POST", "/api/wallets", "Create wallet"),
    ("GET", "/api/wallets/{addr}", "Wallet info"),
    ("GET", "/api/wallets/{addr}/transactions", "List transactions"),
    ("POST", "/api/wallets/{addr}/transactions", "Propose transaction"),
    ("GET", "/api/wallets/{addr}/transactions/{id}", "Get transaction"),
    ("POST", "/api/wallets/{addr}/transactions/{id}/vote", "Vote"),
    ("POST", "/api/wallets/{addr}/transactions/{id}/reset", "Withdraw vote"),
    ("POST", "/api/wallets/{addr}/transactions/{id}/finalize", "Execute"),
    ("GET", "/api/wallets/{addr}/transactions/{id}/votes/{who}", "Signatory ballot"),
    ("GET", "/api/ledger/{addr}", "Balance"),
    ("POST", "/api/ledger/{addr}/deposit", "Deposit"),
];
