//! The node: single ownership point for shared ledger state
//!
//! The chain, its unspent-output cache and the mempool are mutated only
//! through [`Node`], which the host wraps in one `RwLock`: appends and pool
//! admissions serialize under the write lock, queries run under the read
//! lock. Each accepted block prunes the pool and emits one broadcast
//! envelope, in chain order.

pub mod broadcast;

pub use broadcast::{ChainBroadcaster, Message, MessageType};

use crate::core::block::Block;
use crate::core::blockchain::{Blockchain, BlockchainError};
use crate::core::transaction::Transaction;
use crate::mining::mempool::{Mempool, MempoolError};
use std::sync::Arc;

/// Ledger engine state: chain, pool and the outbound event port
#[derive(Debug)]
pub struct Node {
    chain: Blockchain,
    mempool: Mempool,
    broadcaster: Arc<ChainBroadcaster>,
}

impl Node {
    /// Creates a node holding the genesis chain and an empty pool
    pub fn new(broadcaster: Arc<ChainBroadcaster>) -> Self {
        Self {
            chain: Blockchain::new(),
            mempool: Mempool::new(),
            broadcaster,
        }
    }

    pub fn chain(&self) -> &Blockchain {
        &self.chain
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    /// Appends a validated block, prunes the pool and announces the block
    ///
    /// On failure the chain, ledger and pool are unchanged and no envelope
    /// is emitted.
    pub fn append_block(&mut self, block: Block) -> Result<(), BlockchainError> {
        self.chain.add_block(block)?;
        self.mempool.prune(self.chain.unspent_tx_outs());

        let accepted = self
            .chain
            .blocks
            .last()
            .expect("chain always holds the genesis block");
        self.broadcaster.announce_block(accepted);
        Ok(())
    }

    /// Admits a transaction to the pool against the current ledger snapshot
    pub fn admit_transaction(&mut self, tx: Transaction) -> Result<(), MempoolError> {
        self.mempool.admit(tx, self.chain.unspent_tx_outs())
    }
}
