//! Transaction pool for pending transactions
//!
//! Admission validates against the current unspent-output snapshot and
//! rejects any transaction referencing an output a pooled transaction
//! already spends. After each accepted block the pool is pruned of
//! confirmed entries and entries whose inputs no longer resolve.

use crate::core::transaction::{validate_transaction, Transaction, TransactionError, UnspentTxOut};
use std::collections::HashSet;
use thiserror::Error;

/// Pool admission errors
#[derive(Error, Debug)]
pub enum MempoolError {
    #[error("transaction {0} already in the pool")]
    Duplicate(String),
    #[error("output {tx_out_id}:{tx_out_index} already spent by a pooled transaction")]
    Conflict { tx_out_id: String, tx_out_index: u64 },
    #[error(transparent)]
    Invalid(#[from] TransactionError),
}

/// In-memory pool of admitted but unconfirmed transactions
#[derive(Debug, Default)]
pub struct Mempool {
    entries: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a transaction after validating it against the given snapshot
    /// and checking it does not double-spend against the pool
    pub fn admit(
        &mut self,
        tx: Transaction,
        unspent_tx_outs: &[UnspentTxOut],
    ) -> Result<(), MempoolError> {
        if self.entries.iter().any(|e| e.id == tx.id) {
            return Err(MempoolError::Duplicate(tx.id));
        }

        validate_transaction(&tx, unspent_tx_outs)?;

        let mut seen = HashSet::new();
        for tx_in in &tx.tx_ins {
            let conflicting = !seen.insert((tx_in.tx_out_id.as_str(), tx_in.tx_out_index))
                || self
                    .entries
                    .iter()
                    .flat_map(|e| &e.tx_ins)
                    .any(|p| p.tx_out_id == tx_in.tx_out_id && p.tx_out_index == tx_in.tx_out_index);
            if conflicting {
                return Err(MempoolError::Conflict {
                    tx_out_id: tx_in.tx_out_id.clone(),
                    tx_out_index: tx_in.tx_out_index,
                });
            }
        }

        log::debug!("transaction {} admitted to the pool", tx.id);
        self.entries.push(tx);
        Ok(())
    }

    /// Looks up a pooled transaction by id
    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.entries.iter().find(|tx| tx.id == id)
    }

    /// Pending transactions in insertion order
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops entries confirmed by the chain (their id appears in the new
    /// unspent set) and entries whose inputs no longer resolve
    pub fn prune(&mut self, unspent_tx_outs: &[UnspentTxOut]) {
        self.entries.retain(|tx| {
            let confirmed = unspent_tx_outs.iter().any(|u| u.tx_out_id == tx.id);
            let resolvable = tx.tx_ins.iter().all(|tx_in| {
                unspent_tx_outs
                    .iter()
                    .any(|u| u.tx_out_id == tx_in.tx_out_id && u.tx_out_index == tx_in.tx_out_index)
            });
            if confirmed || !resolvable {
                log::debug!("pruning transaction {} from the pool", tx.id);
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::{current_timestamp, find_block};
    use crate::core::blockchain::Blockchain;
    use crate::core::transaction::{TxIn, TxOut};
    use crate::crypto::{compressed_address, generate_signing_key, sign_ecdsa};
    use p256::ecdsa::{SigningKey, VerifyingKey};
    use tokio_util::sync::CancellationToken;

    fn test_key() -> (SigningKey, String) {
        let signing_key = generate_signing_key();
        let address = compressed_address(&VerifyingKey::from(&signing_key));
        (signing_key, address)
    }

    /// Mines a coinbase block so the key has something to spend
    fn funded_chain(address: &str) -> Blockchain {
        let mut chain = Blockchain::new();
        let coinbase = Transaction::coinbase(address, 1);
        let block = find_block(
            1,
            chain.latest_block().hash.clone(),
            current_timestamp(),
            vec![coinbase],
            chain.next_difficulty(),
            &CancellationToken::new(),
        )
        .unwrap();
        chain.add_block(block).unwrap();
        chain
    }

    fn signed_spend(
        signing_key: &SigningKey,
        unspent: &UnspentTxOut,
        recipient: &str,
    ) -> Transaction {
        let mut tx = Transaction::new(
            vec![TxIn {
                tx_out_id: unspent.tx_out_id.clone(),
                tx_out_index: unspent.tx_out_index,
                signature: String::new(),
            }],
            vec![TxOut {
                address: recipient.to_string(),
                amount: unspent.amount,
            }],
        );
        tx.tx_ins[0].signature = sign_ecdsa(signing_key, &tx.id).unwrap();
        tx
    }

    #[test]
    fn test_admit_valid_transaction() {
        let (signing_key, owner) = test_key();
        let (_, recipient) = test_key();
        let chain = funded_chain(&owner);
        let mut pool = Mempool::new();

        let owned = chain.unspent_tx_outs_of_address(&owner);
        let tx = signed_spend(&signing_key, &owned[0], &recipient);
        let id = tx.id.clone();

        pool.admit(tx, chain.unspent_tx_outs()).unwrap();
        assert_eq!(pool.len(), 1);
        assert!(pool.get(&id).is_some());
    }

    #[test]
    fn test_double_spend_against_pool_rejected() {
        let (signing_key, owner) = test_key();
        let (_, alice) = test_key();
        let (_, bob) = test_key();
        let chain = funded_chain(&owner);
        let mut pool = Mempool::new();

        let owned = chain.unspent_tx_outs_of_address(&owner);
        let first = signed_spend(&signing_key, &owned[0], &alice);
        let second = signed_spend(&signing_key, &owned[0], &bob);

        pool.admit(first, chain.unspent_tx_outs()).unwrap();
        assert!(matches!(
            pool.admit(second, chain.unspent_tx_outs()),
            Err(MempoolError::Conflict { .. })
        ));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_self_conflicting_transaction_rejected() {
        let (signing_key, owner) = test_key();
        let (_, recipient) = test_key();
        let chain = funded_chain(&owner);
        let mut pool = Mempool::new();

        let owned = chain.unspent_tx_outs_of_address(&owner);
        let reference = TxIn {
            tx_out_id: owned[0].tx_out_id.clone(),
            tx_out_index: owned[0].tx_out_index,
            signature: String::new(),
        };
        let mut tx = Transaction::new(
            vec![reference.clone(), reference],
            vec![TxOut {
                address: recipient,
                amount: owned[0].amount * 2,
            }],
        );
        let signature = sign_ecdsa(&signing_key, &tx.id).unwrap();
        for tx_in in &mut tx.tx_ins {
            tx_in.signature = signature.clone();
        }

        assert!(matches!(
            pool.admit(tx, chain.unspent_tx_outs()),
            Err(MempoolError::Conflict { .. })
        ));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_invalid_signature_rejected() {
        let (_, owner) = test_key();
        let (wrong_key, _) = test_key();
        let (_, recipient) = test_key();
        let chain = funded_chain(&owner);
        let mut pool = Mempool::new();

        let owned = chain.unspent_tx_outs_of_address(&owner);
        let tx = signed_spend(&wrong_key, &owned[0], &recipient);

        assert!(matches!(
            pool.admit(tx, chain.unspent_tx_outs()),
            Err(MempoolError::Invalid(TransactionError::SignatureRejected { .. }))
        ));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_duplicate_admission_rejected() {
        let (signing_key, owner) = test_key();
        let (_, recipient) = test_key();
        let chain = funded_chain(&owner);
        let mut pool = Mempool::new();

        let owned = chain.unspent_tx_outs_of_address(&owner);
        let tx = signed_spend(&signing_key, &owned[0], &recipient);

        pool.admit(tx.clone(), chain.unspent_tx_outs()).unwrap();
        assert!(matches!(
            pool.admit(tx, chain.unspent_tx_outs()),
            Err(MempoolError::Duplicate(_))
        ));
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let (key_a, owner_a) = test_key();
        let (key_b, owner_b) = test_key();
        let (_, recipient) = test_key();

        // Fund two independent owners in consecutive blocks
        let mut chain = funded_chain(&owner_a);
        let coinbase = Transaction::coinbase(&owner_b, 2);
        let block = find_block(
            2,
            chain.latest_block().hash.clone(),
            current_timestamp(),
            vec![coinbase],
            chain.next_difficulty(),
            &CancellationToken::new(),
        )
        .unwrap();
        chain.add_block(block).unwrap();

        let mut pool = Mempool::new();
        let first = signed_spend(&key_a, &chain.unspent_tx_outs_of_address(&owner_a)[0], &recipient);
        let second = signed_spend(&key_b, &chain.unspent_tx_outs_of_address(&owner_b)[0], &recipient);
        let ids = vec![first.id.clone(), second.id.clone()];

        pool.admit(first, chain.unspent_tx_outs()).unwrap();
        pool.admit(second, chain.unspent_tx_outs()).unwrap();

        let snapshot_ids: Vec<String> = pool.snapshot().into_iter().map(|tx| tx.id).collect();
        assert_eq!(snapshot_ids, ids);
    }

    #[test]
    fn test_prune_drops_confirmed_and_unresolvable() {
        let (signing_key, owner) = test_key();
        let (_, recipient) = test_key();
        let (_, miner) = test_key();
        let mut chain = funded_chain(&owner);
        let mut pool = Mempool::new();

        let owned = chain.unspent_tx_outs_of_address(&owner);
        let spend = signed_spend(&signing_key, &owned[0], &recipient);
        pool.admit(spend.clone(), chain.unspent_tx_outs()).unwrap();

        // Confirm the pooled transaction in the next block
        let data = vec![Transaction::coinbase(&miner, 2), spend];
        let block = find_block(
            2,
            chain.latest_block().hash.clone(),
            current_timestamp(),
            data,
            chain.next_difficulty(),
            &CancellationToken::new(),
        )
        .unwrap();
        chain.add_block(block).unwrap();

        pool.prune(chain.unspent_tx_outs());
        assert!(pool.is_empty());
    }
}
