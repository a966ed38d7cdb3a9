//! Mining and transaction pooling

pub mod mempool;
pub mod miner;

pub use mempool::{Mempool, MempoolError};
pub use miner::{generate_next_block, generate_next_block_with_coinbase, MinerError, MiningStats};
