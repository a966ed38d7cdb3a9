//! chacoin: a minimal proof-of-work cryptocurrency node
//!
//! The ledger engine maintains an append-only chain of blocks whose
//! transactions transfer value between compressed P-256 public keys. It
//! enforces the consensus rules (block validity, mining difficulty,
//! transaction validity against the unspent-output set), coordinates a pool
//! of pending transactions and fans accepted blocks out over a broadcast
//! port.
//!
//! # Example
//!
//! ```rust
//! use chacoin::core::{Blockchain, GENESIS_ADDRESS};
//!
//! let chain = Blockchain::new();
//! assert_eq!(chain.height(), 0);
//! assert_eq!(chain.balance_of(GENESIS_ADDRESS), 100);
//! ```

pub mod api;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod node;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use core::{Block, Blockchain, Transaction, TxIn, TxOut, UnspentTxOut, COINBASE_AMOUNT};
pub use mining::{Mempool, MempoolError, MinerError, MiningStats};
pub use node::{ChainBroadcaster, Message, MessageType, Node};
