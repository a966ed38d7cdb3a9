//! Chain management and the unspent-output ledger
//!
//! The chain starts from a fixed genesis block and only grows through
//! [`Blockchain::add_block`], which enforces the pairwise block invariants
//! and the transaction rules before any state changes. The unspent-output
//! set is cached and updated per append; rebuilding it from scratch yields
//! the same result.

use crate::core::block::{
    validate_block, Block, BlockError, BLOCK_GENERATION_INTERVAL, DIFFICULTY_ADJUSTMENT_INTERVAL,
};
use crate::core::transaction::{
    validate_block_transactions, Transaction, TransactionError, TxIn, TxOut, UnspentTxOut,
};
use thiserror::Error;

/// Pinned hash of the genesis block
pub const GENESIS_BLOCK_HASH: &str =
    "46454b6c6f285e0d00437258b5a6543a0fcfadf278eb7e2b5cce151a383374a0";

/// Address holding the genesis premine
pub const GENESIS_ADDRESS: &str =
    "02fbe9019062728e8fab7ac59b33d25c24ce9d393b49134f7a25da45a50f43faf9";

const GENESIS_TRANSACTION_ID: &str =
    "66ff05e7c66386297634cae4bd324e93be1b2ede6d4599e1de82361b42dc1807";

/// Chain append errors; the chain is left untouched on any failure
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("invalid block: {0}")]
    Block(#[from] BlockError),
    #[error("invalid block transactions: {0}")]
    Transaction(#[from] TransactionError),
}

/// The genesis block, pinned bit-for-bit
///
/// Position 0 is outside pairwise validation, so its hash and transaction id
/// are fixed constants rather than recomputed values.
pub fn genesis_block() -> Block {
    Block::new(
        0,
        GENESIS_BLOCK_HASH.to_string(),
        String::new(),
        1,
        vec![Transaction {
            id: GENESIS_TRANSACTION_ID.to_string(),
            tx_ins: vec![TxIn {
                tx_out_id: String::new(),
                tx_out_index: 0,
                signature: String::new(),
            }],
            tx_outs: vec![TxOut {
                address: GENESIS_ADDRESS.to_string(),
                amount: 100,
            }],
        }],
        0,
        0,
    )
}

/// The block chain and its derived unspent-output set
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// Blocks in height order, genesis first
    pub blocks: Vec<Block>,
    utxo_set: Vec<UnspentTxOut>,
}

impl Blockchain {
    /// Creates a chain holding only the genesis block
    pub fn new() -> Self {
        let mut chain = Self {
            blocks: vec![genesis_block()],
            utxo_set: Vec::new(),
        };
        chain.rebuild_utxo_set();
        chain
    }

    /// The tip of the chain
    pub fn latest_block(&self) -> &Block {
        self.blocks
            .last()
            .expect("chain always holds the genesis block")
    }

    /// Height of the tip (genesis is height 0)
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64 - 1
    }

    pub fn get_block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.hash == hash)
    }

    /// Finds a confirmed transaction by id
    pub fn get_transaction(&self, id: &str) -> Option<&Transaction> {
        self.blocks
            .iter()
            .flat_map(|b| &b.data)
            .find(|tx| tx.id == id)
    }

    /// Difficulty the next block must satisfy
    ///
    /// Retargets when the tip sits on an adjustment boundary; otherwise the
    /// tip's difficulty carries forward.
    pub fn next_difficulty(&self) -> u32 {
        let latest = self.latest_block();
        if latest.index % DIFFICULTY_ADJUSTMENT_INTERVAL == 0 && latest.index != 0 {
            self.adjusted_difficulty()
        } else {
            latest.difficulty
        }
    }

    fn adjusted_difficulty(&self) -> u32 {
        let latest = self.latest_block();
        let previous_adjustment =
            &self.blocks[self.blocks.len() - DIFFICULTY_ADJUSTMENT_INTERVAL as usize];

        let time_expected = BLOCK_GENERATION_INTERVAL * DIFFICULTY_ADJUSTMENT_INTERVAL as i64;
        let time_taken = latest.timestamp - previous_adjustment.timestamp;

        let adjusted = if time_taken < time_expected / 2 {
            previous_adjustment.difficulty + 1
        } else if time_taken > time_expected * 2 {
            previous_adjustment.difficulty.saturating_sub(1)
        } else {
            previous_adjustment.difficulty
        };

        if adjusted != previous_adjustment.difficulty {
            log::info!(
                "difficulty retarget at height {}: {} -> {} ({}s taken, {}s expected)",
                latest.index,
                previous_adjustment.difficulty,
                adjusted,
                time_taken,
                time_expected
            );
        }

        adjusted
    }

    /// Validates and appends a block, updating the unspent-output set
    ///
    /// On any failure the chain and the ledger are left unchanged.
    pub fn add_block(&mut self, block: Block) -> Result<(), BlockchainError> {
        validate_block(&block, self.latest_block())?;
        validate_block_transactions(&block.data, &self.utxo_set, block.index)?;

        apply_block(&mut self.utxo_set, &block);
        log::info!(
            "block {} accepted with {} transactions ({})",
            block.index,
            block.data.len(),
            block.hash
        );
        self.blocks.push(block);
        Ok(())
    }

    /// Re-derives the unspent-output set by folding the whole chain
    pub fn rebuild_utxo_set(&mut self) {
        let mut unspent = Vec::new();
        for block in &self.blocks {
            apply_block(&mut unspent, block);
        }
        self.utxo_set = unspent;
    }

    /// Current unspent outputs in chain order
    pub fn unspent_tx_outs(&self) -> &[UnspentTxOut] {
        &self.utxo_set
    }

    /// Unspent outputs held by an address
    pub fn unspent_tx_outs_of_address(&self, address: &str) -> Vec<UnspentTxOut> {
        self.utxo_set
            .iter()
            .filter(|u| u.address == address)
            .cloned()
            .collect()
    }

    /// Spendable balance of an address
    pub fn balance_of(&self, address: &str) -> u64 {
        self.utxo_set
            .iter()
            .filter(|u| u.address == address)
            .map(|u| u.amount)
            .sum()
    }

    pub fn find_unspent_tx_out(&self, tx_out_id: &str, tx_out_index: u64) -> Option<&UnspentTxOut> {
        self.utxo_set
            .iter()
            .find(|u| u.tx_out_id == tx_out_id && u.tx_out_index == tx_out_index)
    }

    /// Total value held across all unspent outputs
    pub fn circulation(&self) -> u64 {
        self.utxo_set.iter().map(|u| u.amount).sum()
    }

    /// Re-validates every adjacent pair of blocks
    pub fn is_valid(&self) -> bool {
        self.blocks
            .windows(2)
            .all(|pair| validate_block(&pair[1], &pair[0]).is_ok())
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

/// Folds one block into the unspent-output set: every input's reference is
/// removed, every output is emitted under `(tx.id, output index)`
fn apply_block(unspent: &mut Vec<UnspentTxOut>, block: &Block) {
    for tx in &block.data {
        for tx_in in &tx.tx_ins {
            unspent.retain(|u| {
                !(u.tx_out_id == tx_in.tx_out_id && u.tx_out_index == tx_in.tx_out_index)
            });
        }
        for (index, tx_out) in tx.tx_outs.iter().enumerate() {
            unspent.push(UnspentTxOut {
                tx_out_id: tx.id.clone(),
                tx_out_index: index as u64,
                address: tx_out.address.clone(),
                amount: tx_out.amount,
            });
        }
    }
}
