//! Block entity, canonical hashing and proof of work
//!
//! A block hash is the SHA-256 digest of a textual preimage: the decimal
//! index, the previous hash, the decimal timestamp, a canonical rendering of
//! the transaction list, the decimal difficulty and the decimal nonce. Every
//! node must produce this rendering bit-for-bit.

use crate::core::transaction::Transaction;
use crate::crypto::{hash_matches_difficulty, hash_string_hex};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Target seconds between blocks
pub const BLOCK_GENERATION_INTERVAL: i64 = 10;

/// Blocks between difficulty adjustments
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u64 = 10;

/// A mined block must not predate its parent by more than this many seconds,
/// nor lead the local clock by more than this many seconds
const TIMESTAMP_TOLERANCE: i64 = 60;

/// Nonces tried between cancellation checks during the search
const NONCE_CHECK_INTERVAL: u64 = 1 << 16;

/// Block validation errors; all recoverable
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("index {actual} does not follow previous index {previous}")]
    IndexMismatch { previous: u64, actual: u64 },
    #[error("previous hash mismatch")]
    PreviousHashMismatch,
    #[error("hash does not match block contents")]
    HashMismatch,
    #[error("timestamp {0} outside the admissible window")]
    InvalidTimestamp(i64),
    #[error("hash does not satisfy difficulty {0}")]
    DifficultyNotMet(u32),
}

/// A block in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub hash: String,
    pub previous_hash: String,
    pub timestamp: i64,
    pub data: Vec<Transaction>,
    pub difficulty: u32,
    pub nonce: u64,
}

impl Block {
    pub fn new(
        index: u64,
        hash: String,
        previous_hash: String,
        timestamp: i64,
        data: Vec<Transaction>,
        difficulty: u32,
        nonce: u64,
    ) -> Self {
        Self {
            index,
            hash,
            previous_hash,
            timestamp,
            data,
            difficulty,
            nonce,
        }
    }

    /// Recomputes the hash from the block's contents
    pub fn recompute_hash(&self) -> String {
        calculate_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.data,
            self.difficulty,
            self.nonce,
        )
    }

    /// True when the stored hash matches the contents and meets the difficulty
    pub fn has_valid_hash(&self) -> bool {
        self.recompute_hash() == self.hash && hash_matches_difficulty(&self.hash, self.difficulty)
    }
}

/// Current Unix timestamp in seconds (UTC)
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Canonical rendering of the transaction list for the hash preimage
///
/// `[{Id:<id> TxIns:[{TxOutId:<id> TxOutIndex:<i> Signature:<s>} ..] TxOuts:[{Address:<a> Amount:<n>} ..]} ..]`
/// with a single space between fields and between list elements.
fn render_data(data: &[Transaction]) -> String {
    let mut out = String::from("[");
    for (i, tx) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{{Id:{} TxIns:[", tx.id);
        for (j, tx_in) in tx.tx_ins.iter().enumerate() {
            if j > 0 {
                out.push(' ');
            }
            let _ = write!(
                out,
                "{{TxOutId:{} TxOutIndex:{} Signature:{}}}",
                tx_in.tx_out_id, tx_in.tx_out_index, tx_in.signature
            );
        }
        out.push_str("] TxOuts:[");
        for (k, tx_out) in tx.tx_outs.iter().enumerate() {
            if k > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{{Address:{} Amount:{}}}", tx_out.address, tx_out.amount);
        }
        out.push_str("]}");
    }
    out.push(']');
    out
}

/// Canonical block hash over the textual preimage
pub fn calculate_hash(
    index: u64,
    previous_hash: &str,
    timestamp: i64,
    data: &[Transaction],
    difficulty: u32,
    nonce: u64,
) -> String {
    let preimage = format!(
        "{}{}{}{}{}{}",
        index,
        previous_hash,
        timestamp,
        render_data(data),
        difficulty,
        nonce
    );
    hash_string_hex(&preimage)
}

/// Proof-of-work search: increments the nonce from zero until the hash meets
/// the difficulty
///
/// The loop observes the cancellation token every 2^16 nonces; on
/// cancellation it returns `None` without producing a block. Intended to run
/// on a blocking worker, never under the chain lock.
pub fn find_block(
    index: u64,
    previous_hash: String,
    timestamp: i64,
    data: Vec<Transaction>,
    difficulty: u32,
    cancel: &CancellationToken,
) -> Option<Block> {
    let mut nonce = 0u64;
    loop {
        let hash = calculate_hash(index, &previous_hash, timestamp, &data, difficulty, nonce);
        if hash_matches_difficulty(&hash, difficulty) {
            log::info!("block {} found at nonce {}", index, nonce);
            return Some(Block::new(
                index,
                hash,
                previous_hash,
                timestamp,
                data,
                difficulty,
                nonce,
            ));
        }
        nonce = nonce.wrapping_add(1);
        if nonce % NONCE_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            log::info!("search for block {} cancelled after {} nonces", index, nonce);
            return None;
        }
    }
}

/// Timestamp admissibility relative to the parent block and a local clock
fn timestamp_admissible(new_block: &Block, previous_block: &Block, now: i64) -> bool {
    previous_block.timestamp - TIMESTAMP_TOLERANCE < new_block.timestamp
        && new_block.timestamp - TIMESTAMP_TOLERANCE < now
}

/// Validates a block against its parent
pub fn validate_block(new_block: &Block, previous_block: &Block) -> Result<(), BlockError> {
    if new_block.index != previous_block.index + 1 {
        return Err(BlockError::IndexMismatch {
            previous: previous_block.index,
            actual: new_block.index,
        });
    }
    if new_block.previous_hash != previous_block.hash {
        return Err(BlockError::PreviousHashMismatch);
    }
    if new_block.recompute_hash() != new_block.hash {
        return Err(BlockError::HashMismatch);
    }
    if !timestamp_admissible(new_block, previous_block, current_timestamp()) {
        return Err(BlockError::InvalidTimestamp(new_block.timestamp));
    }
    if !hash_matches_difficulty(&new_block.hash, new_block.difficulty) {
        return Err(BlockError::DifficultyNotMet(new_block.difficulty));
    }
    Ok(())
}
