//! HTTP surface of the node
//!
//! # Endpoints
//!
//! - `GET /api/blocks` - Full chain
//! - `GET /api/LatestBlock` - Tip block
//! - `GET /api/status` - Circulation and per-address holdings
//! - `GET /api/unspent` - Current unspent-output set
//! - `GET /api/block/{hash}` - Block lookup
//! - `GET /api/address/{address}` - Unspent outputs of an address
//! - `GET /api/transaction/{id}` - Transaction lookup (chain, then pool)
//! - `GET /api/transactionPool` - Pending transactions
//! - `POST /api/sendTransaction` - Submit a transaction
//! - `POST /api/mine` - Mine and append the next block
//! - `GET /ws` - Chain-event fan-out

pub mod handlers;
pub mod routes;
pub mod websocket;

pub use handlers::ApiState;
pub use routes::create_router;
