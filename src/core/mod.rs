//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (UTXO model, ECDSA-signed spends)
//! - Blocks (canonical hashing, proof of work)
//! - Blockchain (chain append, unspent-output ledger, retargeting)

pub mod block;
pub mod blockchain;
pub mod transaction;

pub use block::{
    calculate_hash, current_timestamp, find_block, validate_block, Block, BlockError,
    BLOCK_GENERATION_INTERVAL, DIFFICULTY_ADJUSTMENT_INTERVAL,
};
pub use blockchain::{
    genesis_block, Blockchain, BlockchainError, GENESIS_ADDRESS, GENESIS_BLOCK_HASH,
};
pub use transaction::{
    find_unspent_tx_out, validate_block_transactions, validate_coinbase, validate_transaction,
    Transaction, TransactionError, TxIn, TxOut, UnspentTxOut, COINBASE_AMOUNT,
};
