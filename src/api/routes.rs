//! REST API routes

use crate::api::handlers::{self, ApiState};
use crate::api::websocket::ws_handler;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Creates the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/blocks", get(handlers::get_blocks))
        .route("/api/LatestBlock", get(handlers::get_latest_block))
        .route("/api/status", get(handlers::get_status))
        .route("/api/unspent", get(handlers::get_unspent))
        .route("/api/block/{hash}", get(handlers::get_block))
        .route("/api/address/{address}", get(handlers::get_address))
        .route("/api/transaction/{id}", get(handlers::get_transaction))
        .route("/api/transactionPool", get(handlers::get_transaction_pool))
        .route("/api/sendTransaction", post(handlers::send_transaction))
        .route("/api/mine", post(handlers::mine_block))
        .route("/ws", get(ws_handler))
        .with_state(state)
        .layer(cors)
}
