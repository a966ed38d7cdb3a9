//! Mining orchestration
//!
//! The proof-of-work search is CPU-bound, so it never runs under the node
//! lock: the chain tip is snapshotted under a read lock, the search runs on
//! a blocking worker, and the mined block is appended under the write lock.
//! If another block landed in the meantime the append fails validation
//! against the updated tip and nothing is mutated.

use crate::core::block::{current_timestamp, find_block, Block};
use crate::core::blockchain::BlockchainError;
use crate::core::transaction::Transaction;
use crate::node::Node;
use log::info;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Mining failures
#[derive(Error, Debug)]
pub enum MinerError {
    #[error("mining cancelled")]
    Cancelled,
    #[error("mining worker failed")]
    WorkerFailed,
    #[error(transparent)]
    Rejected(#[from] BlockchainError),
}

/// Statistics for one completed search
#[derive(Debug, Clone)]
pub struct MiningStats {
    /// Number of nonces tried
    pub hash_attempts: u64,
    /// Wall time of the search in milliseconds
    pub time_ms: u128,
    /// Hashes per second
    pub hash_rate: f64,
}

/// Mines the next block carrying the given transactions and appends it
///
/// The first transaction must be a valid coinbase for the new height; the
/// whole list is re-validated on append. On cancellation the node is left
/// untouched.
pub async fn generate_next_block(
    node: &Arc<RwLock<Node>>,
    data: Vec<Transaction>,
    cancel: CancellationToken,
) -> Result<(Block, MiningStats), MinerError> {
    let (index, previous_hash, difficulty) = {
        let node = node.read().await;
        let chain = node.chain();
        (
            chain.height() + 1,
            chain.latest_block().hash.clone(),
            chain.next_difficulty(),
        )
    };

    mine_and_append(node, index, previous_hash, difficulty, data, cancel).await
}

/// Mines the next block with a node-built coinbase plus the pool snapshot
pub async fn generate_next_block_with_coinbase(
    node: &Arc<RwLock<Node>>,
    address: &str,
    cancel: CancellationToken,
) -> Result<(Block, MiningStats), MinerError> {
    let (index, previous_hash, difficulty, data) = {
        let node = node.read().await;
        let chain = node.chain();
        let index = chain.height() + 1;

        let mut data = vec![Transaction::coinbase(address, index)];
        data.extend(node.mempool().snapshot());

        (
            index,
            chain.latest_block().hash.clone(),
            chain.next_difficulty(),
            data,
        )
    };

    mine_and_append(node, index, previous_hash, difficulty, data, cancel).await
}

async fn mine_and_append(
    node: &Arc<RwLock<Node>>,
    index: u64,
    previous_hash: String,
    difficulty: u32,
    data: Vec<Transaction>,
    cancel: CancellationToken,
) -> Result<(Block, MiningStats), MinerError> {
    info!("mining block {} at difficulty {}", index, difficulty);
    let timestamp = current_timestamp();
    let start = Instant::now();

    let worker_cancel = cancel.clone();
    let mined = tokio::task::spawn_blocking(move || {
        find_block(
            index,
            previous_hash,
            timestamp,
            data,
            difficulty,
            &worker_cancel,
        )
    })
    .await
    .map_err(|_| MinerError::WorkerFailed)?;

    let block = mined.ok_or(MinerError::Cancelled)?;

    let time_ms = start.elapsed().as_millis();
    let hash_attempts = block.nonce + 1;
    let hash_rate = if time_ms > 0 {
        hash_attempts as f64 / (time_ms as f64 / 1000.0)
    } else {
        hash_attempts as f64
    };
    info!(
        "block {} mined in {}ms ({} attempts, {:.2} H/s)",
        index, time_ms, hash_attempts, hash_rate
    );

    node.write().await.append_block(block.clone())?;

    Ok((
        block,
        MiningStats {
            hash_attempts,
            time_ms,
            hash_rate,
        },
    ))
}
