//! REST API handlers

use crate::core::block::Block;
use crate::core::transaction::{Transaction, UnspentTxOut};
use crate::mining::mempool::MempoolError;
use crate::mining::miner::{
    generate_next_block, generate_next_block_with_coinbase, MinerError,
};
use crate::node::{ChainBroadcaster, Node};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub node: Arc<RwLock<Node>>,
    pub broadcaster: Arc<ChainBroadcaster>,
}

// ============================================================================
// Response and request types
// ============================================================================

#[derive(Serialize)]
pub struct ApiError {
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub alias: String,
    pub address: String,
    pub balance: u64,
    pub unspent_transactions: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub circulation: u64,
    pub chain_size: u64,
    pub number_of_wallets: u64,
    pub unspent_tx_outs: u64,
    pub wallets: Vec<WalletSummary>,
}

#[derive(Deserialize)]
pub struct SendTransactionRequest {
    pub transaction: Transaction,
}

#[derive(Deserialize)]
pub struct MineRequest {
    /// Verbatim block payload; the first entry must be the coinbase
    #[serde(default)]
    pub transactions: Option<Vec<Transaction>>,
    /// Miner address; the node builds the coinbase and pulls the pool
    #[serde(default)]
    pub address: Option<String>,
}

fn not_found(message: &str) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError {
            message: message.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/blocks - the full chain
pub async fn get_blocks(State(state): State<ApiState>) -> Json<Vec<Block>> {
    let node = state.node.read().await;
    Json(node.chain().blocks.clone())
}

/// GET /api/LatestBlock - the tip block
pub async fn get_latest_block(State(state): State<ApiState>) -> Json<Block> {
    let node = state.node.read().await;
    Json(node.chain().latest_block().clone())
}

/// GET /api/status - circulation and per-address holdings
pub async fn get_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let node = state.node.read().await;
    let chain = node.chain();
    let unspent = chain.unspent_tx_outs();

    let mut holdings: HashMap<&str, (u64, u64)> = HashMap::new();
    for entry in unspent {
        let holding = holdings.entry(entry.address.as_str()).or_default();
        holding.0 += entry.amount;
        holding.1 += 1;
    }

    let wallets: Vec<WalletSummary> = holdings
        .iter()
        .map(|(address, (balance, outputs))| WalletSummary {
            alias: String::new(),
            address: address.to_string(),
            balance: *balance,
            unspent_transactions: *outputs,
        })
        .collect();

    Json(StatusResponse {
        circulation: chain.circulation(),
        chain_size: chain.blocks.len() as u64,
        number_of_wallets: wallets.len() as u64,
        unspent_tx_outs: unspent.len() as u64,
        wallets,
    })
}

/// GET /api/unspent - the current unspent-output set
pub async fn get_unspent(State(state): State<ApiState>) -> Json<Vec<UnspentTxOut>> {
    let node = state.node.read().await;
    Json(node.chain().unspent_tx_outs().to_vec())
}

/// GET /api/block/{hash} - block lookup
pub async fn get_block(
    State(state): State<ApiState>,
    Path(hash): Path<String>,
) -> Result<Json<Block>, (StatusCode, Json<ApiError>)> {
    let node = state.node.read().await;
    node.chain()
        .get_block_by_hash(&hash)
        .map(|block| Json(block.clone()))
        .ok_or_else(|| not_found("Block not found"))
}

/// GET /api/address/{address} - unspent outputs of an address
pub async fn get_address(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Json<Vec<UnspentTxOut>> {
    let node = state.node.read().await;
    Json(node.chain().unspent_tx_outs_of_address(&address))
}

/// GET /api/transaction/{id} - confirmed transaction, falling back to the pool
pub async fn get_transaction(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, (StatusCode, Json<ApiError>)> {
    let node = state.node.read().await;
    node.chain()
        .get_transaction(&id)
        .or_else(|| node.mempool().get(&id))
        .map(|tx| Json(tx.clone()))
        .ok_or_else(|| not_found("Transaction not found"))
}

/// GET /api/transactionPool - pending transactions
pub async fn get_transaction_pool(State(state): State<ApiState>) -> Json<Vec<Transaction>> {
    let node = state.node.read().await;
    Json(node.mempool().snapshot())
}

/// POST /api/sendTransaction - submit a transaction to the pool
pub async fn send_transaction(
    State(state): State<ApiState>,
    Json(req): Json<SendTransactionRequest>,
) -> Result<Json<Transaction>, (StatusCode, Json<ApiError>)> {
    let mut node = state.node.write().await;

    match node.admit_transaction(req.transaction.clone()) {
        Ok(()) => Ok(Json(req.transaction)),
        Err(e) => {
            log::info!("transaction rejected: {}", e);
            let status = match e {
                MempoolError::Conflict { .. } | MempoolError::Duplicate(_) => StatusCode::CONFLICT,
                MempoolError::Invalid(_) => StatusCode::BAD_REQUEST,
            };
            Err((
                status,
                Json(ApiError {
                    message: e.to_string(),
                }),
            ))
        }
    }
}

/// POST /api/mine - mine and append the next block
pub async fn mine_block(
    State(state): State<ApiState>,
    Json(req): Json<MineRequest>,
) -> Result<Json<Block>, (StatusCode, Json<ApiError>)> {
    let cancel = CancellationToken::new();

    let result = match (req.transactions, req.address) {
        (Some(transactions), _) => {
            generate_next_block(&state.node, transactions, cancel).await
        }
        (None, Some(address)) => {
            generate_next_block_with_coinbase(&state.node, &address, cancel).await
        }
        (None, None) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ApiError {
                    message: "transactions or address required".to_string(),
                }),
            ));
        }
    };

    match result {
        Ok((block, _stats)) => Ok(Json(block)),
        Err(e @ MinerError::Rejected(_)) => {
            log::info!("mined block rejected: {}", e);
            Err((
                StatusCode::BAD_REQUEST,
                Json(ApiError {
                    message: e.to_string(),
                }),
            ))
        }
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError {
                message: e.to_string(),
            }),
        )),
    }
}
