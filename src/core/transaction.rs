//! UTXO transaction model
//!
//! Transactions move value between compressed P-256 addresses. A transaction
//! id is the SHA-256 digest of its inputs' references and outputs' payloads;
//! signatures are excluded from the preimage, so each input signs the owning
//! transaction's id.

use crate::crypto::{hash_string_hex, verify_ecdsa, verifying_key_from_address, CryptoError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Amount minted by every coinbase transaction
pub const COINBASE_AMOUNT: u64 = 100;

/// Transaction validation errors; all recoverable
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("transaction id mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: String, actual: String },
    #[error("referenced output {tx_out_id}:{tx_out_index} not found")]
    ReferencedOutputNotFound { tx_out_id: String, tx_out_index: u64 },
    #[error("signature rejected for input {tx_out_id}:{tx_out_index}")]
    SignatureRejected { tx_out_id: String, tx_out_index: u64 },
    #[error("input total {input_total} does not match output total {output_total}")]
    AmountMismatch { input_total: u64, output_total: u64 },
    #[error("block has no transactions")]
    EmptyBlock,
    #[error("coinbase must have exactly one input")]
    CoinbaseInputCount,
    #[error("coinbase input index {actual} must equal block height {expected}")]
    CoinbaseHeightMismatch { expected: u64, actual: u64 },
    #[error("coinbase must mint exactly one output of the coinbase amount")]
    CoinbaseAmount,
    #[error("duplicate input reference {tx_out_id}:{tx_out_index}")]
    DuplicateInput { tx_out_id: String, tx_out_index: u64 },
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Transaction input referencing a prior output
///
/// A coinbase input carries an empty `tx_out_id`, an empty signature and the
/// block height in `tx_out_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxIn {
    pub tx_out_id: String,
    pub tx_out_index: u64,
    pub signature: String,
}

/// Transaction output assigning an amount to an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub address: String,
    pub amount: u64,
}

/// An unspent output derived from the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnspentTxOut {
    pub tx_out_id: String,
    pub tx_out_index: u64,
    pub address: String,
    pub amount: u64,
}

/// A value-transfer transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub tx_ins: Vec<TxIn>,
    pub tx_outs: Vec<TxOut>,
}

impl Transaction {
    /// Creates a transaction with its id derived from the given inputs and outputs
    pub fn new(tx_ins: Vec<TxIn>, tx_outs: Vec<TxOut>) -> Self {
        let mut tx = Self {
            id: String::new(),
            tx_ins,
            tx_outs,
        };
        tx.id = tx.derive_id();
        tx
    }

    /// Creates the coinbase transaction for a block at the given height
    pub fn coinbase(address: &str, block_height: u64) -> Self {
        Self::new(
            vec![TxIn {
                tx_out_id: String::new(),
                tx_out_index: block_height,
                signature: String::new(),
            }],
            vec![TxOut {
                address: address.to_string(),
                amount: COINBASE_AMOUNT,
            }],
        )
    }

    /// Canonical id: SHA-256 over every input's reference then every output's payload
    pub fn derive_id(&self) -> String {
        let mut preimage = String::new();
        for tx_in in &self.tx_ins {
            preimage.push_str(&tx_in.tx_out_id);
            preimage.push_str(&tx_in.tx_out_index.to_string());
        }
        for tx_out in &self.tx_outs {
            preimage.push_str(&tx_out.address);
            preimage.push_str(&tx_out.amount.to_string());
        }
        hash_string_hex(&preimage)
    }

    /// Sum of output amounts
    pub fn total_output(&self) -> u64 {
        self.tx_outs.iter().map(|o| o.amount).sum()
    }
}

/// Looks up an unspent output by its `(tx_out_id, tx_out_index)` reference
pub fn find_unspent_tx_out<'a>(
    tx_out_id: &str,
    tx_out_index: u64,
    unspent_tx_outs: &'a [UnspentTxOut],
) -> Option<&'a UnspentTxOut> {
    unspent_tx_outs
        .iter()
        .find(|u| u.tx_out_id == tx_out_id && u.tx_out_index == tx_out_index)
}

/// Validates a non-coinbase transaction against an unspent-output snapshot
///
/// Checks the id recomputes, every input resolves, every signature verifies
/// against the referenced address over the transaction id, and value is
/// conserved. Pure; never mutates.
pub fn validate_transaction(
    tx: &Transaction,
    unspent_tx_outs: &[UnspentTxOut],
) -> Result<(), TransactionError> {
    let derived = tx.derive_id();
    if derived != tx.id {
        return Err(TransactionError::IdMismatch {
            expected: derived,
            actual: tx.id.clone(),
        });
    }

    let mut input_total = 0u64;
    for tx_in in &tx.tx_ins {
        let referenced = find_unspent_tx_out(&tx_in.tx_out_id, tx_in.tx_out_index, unspent_tx_outs)
            .ok_or_else(|| TransactionError::ReferencedOutputNotFound {
                tx_out_id: tx_in.tx_out_id.clone(),
                tx_out_index: tx_in.tx_out_index,
            })?;

        let public_key = verifying_key_from_address(&referenced.address)?;
        if !verify_ecdsa(&public_key, &tx.id, &tx_in.signature)? {
            return Err(TransactionError::SignatureRejected {
                tx_out_id: tx_in.tx_out_id.clone(),
                tx_out_index: tx_in.tx_out_index,
            });
        }

        input_total += referenced.amount;
    }

    let output_total = tx.total_output();
    if input_total != output_total {
        return Err(TransactionError::AmountMismatch {
            input_total,
            output_total,
        });
    }

    Ok(())
}

/// Validates a coinbase transaction for a block at the given height
pub fn validate_coinbase(tx: &Transaction, block_height: u64) -> Result<(), TransactionError> {
    let derived = tx.derive_id();
    if derived != tx.id {
        return Err(TransactionError::IdMismatch {
            expected: derived,
            actual: tx.id.clone(),
        });
    }
    if tx.tx_ins.len() != 1 {
        return Err(TransactionError::CoinbaseInputCount);
    }
    if tx.tx_ins[0].tx_out_index != block_height {
        return Err(TransactionError::CoinbaseHeightMismatch {
            expected: block_height,
            actual: tx.tx_ins[0].tx_out_index,
        });
    }
    if tx.tx_outs.len() != 1 || tx.tx_outs[0].amount != COINBASE_AMOUNT {
        return Err(TransactionError::CoinbaseAmount);
    }
    Ok(())
}

/// Validates a block's full transaction set
///
/// The first transaction must be a valid coinbase for the block height, all
/// inputs across the block (coinbase included) must be collectively unique,
/// and every remaining transaction must validate against the snapshot.
pub fn validate_block_transactions(
    transactions: &[Transaction],
    unspent_tx_outs: &[UnspentTxOut],
    block_height: u64,
) -> Result<(), TransactionError> {
    let coinbase = transactions.first().ok_or(TransactionError::EmptyBlock)?;
    validate_coinbase(coinbase, block_height)?;

    let mut seen = HashSet::new();
    for tx_in in transactions.iter().flat_map(|tx| &tx.tx_ins) {
        if !seen.insert((tx_in.tx_out_id.as_str(), tx_in.tx_out_index)) {
            return Err(TransactionError::DuplicateInput {
                tx_out_id: tx_in.tx_out_id.clone(),
                tx_out_index: tx_in.tx_out_index,
            });
        }
    }

    for tx in &transactions[1..] {
        validate_transaction(tx, unspent_tx_outs)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{compressed_address, generate_signing_key, sign_ecdsa};
    use p256::ecdsa::{SigningKey, VerifyingKey};

    const PREMINE_ADDRESS: &str =
        "02fbe9019062728e8fab7ac59b33d25c24ce9d393b49134f7a25da45a50f43faf9";

    fn test_key() -> (SigningKey, String) {
        let signing_key = generate_signing_key();
        let address = compressed_address(&VerifyingKey::from(&signing_key));
        (signing_key, address)
    }

    /// Builds a signed transaction spending `unspent` in full to `recipient`
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

    fn premine_style_unspent(address: &str) -> UnspentTxOut {
        UnspentTxOut {
            tx_out_id: hash_string_hex("funding"),
            tx_out_index: 0,
            address: address.to_string(),
            amount: 100,
        }
    }

    #[test]
    fn test_derive_id_known_vector() {
        let tx = Transaction::new(
            vec![TxIn {
                tx_out_id: String::new(),
                tx_out_index: 0,
                signature: String::new(),
            }],
            vec![TxOut {
                address: PREMINE_ADDRESS.to_string(),
                amount: 100,
            }],
        );
        assert_eq!(
            tx.id,
            "22c1807ba6bc058f0dd46ebeb9282c95703c053a64eae48518fd581c2a794577"
        );
    }

    #[test]
    fn test_derive_id_deterministic_and_ignores_signatures() {
        let (signing_key, address) = test_key();
        let unspent = premine_style_unspent(&address);
        let tx = signed_spend(&signing_key, &unspent, PREMINE_ADDRESS);

        assert_eq!(tx.derive_id(), tx.derive_id());
        // The signature is excluded from the preimage
        assert_eq!(tx.derive_id(), tx.id);
    }

    #[test]
    fn test_coinbase_shape() {
        let tx = Transaction::coinbase("miner", 7);
        assert_eq!(tx.tx_ins.len(), 1);
        assert_eq!(tx.tx_ins[0].tx_out_index, 7);
        assert!(tx.tx_ins[0].tx_out_id.is_empty());
        assert!(tx.tx_ins[0].signature.is_empty());
        assert_eq!(tx.total_output(), COINBASE_AMOUNT);
        assert!(validate_coinbase(&tx, 7).is_ok());
    }

    #[test]
    fn test_coinbase_rejects_wrong_height() {
        let tx = Transaction::coinbase("miner", 7);
        assert!(matches!(
            validate_coinbase(&tx, 8),
            Err(TransactionError::CoinbaseHeightMismatch { expected: 8, actual: 7 })
        ));
    }

    #[test]
    fn test_coinbase_rejects_wrong_amount() {
        let mut tx = Transaction::coinbase("miner", 1);
        tx.tx_outs[0].amount = 50;
        tx.id = tx.derive_id();
        assert!(matches!(
            validate_coinbase(&tx, 1),
            Err(TransactionError::CoinbaseAmount)
        ));
    }

    #[test]
    fn test_coinbase_rejects_tampered_id() {
        let mut tx = Transaction::coinbase("miner", 1);
        tx.id = "0".repeat(64);
        assert!(matches!(
            validate_coinbase(&tx, 1),
            Err(TransactionError::IdMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_signed_spend() {
        let (signing_key, address) = test_key();
        let unspent = premine_style_unspent(&address);
        let tx = signed_spend(&signing_key, &unspent, PREMINE_ADDRESS);

        assert!(validate_transaction(&tx, &[unspent]).is_ok());
    }

    #[test]
    fn test_validate_rejects_foreign_signature() {
        let (_, address) = test_key();
        let (other_key, _) = test_key();
        let unspent = premine_style_unspent(&address);
        let tx = signed_spend(&other_key, &unspent, PREMINE_ADDRESS);

        assert!(matches!(
            validate_transaction(&tx, &[unspent]),
            Err(TransactionError::SignatureRejected { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_reference() {
        let (signing_key, address) = test_key();
        let unspent = premine_style_unspent(&address);
        let tx = signed_spend(&signing_key, &unspent, PREMINE_ADDRESS);

        assert!(matches!(
            validate_transaction(&tx, &[]),
            Err(TransactionError::ReferencedOutputNotFound { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unbalanced_amounts() {
        let (signing_key, address) = test_key();
        let unspent = premine_style_unspent(&address);

        let mut tx = Transaction::new(
            vec![TxIn {
                tx_out_id: unspent.tx_out_id.clone(),
                tx_out_index: 0,
                signature: String::new(),
            }],
            vec![TxOut {
                address: PREMINE_ADDRESS.to_string(),
                amount: 60,
            }],
        );
        tx.tx_ins[0].signature = sign_ecdsa(&signing_key, &tx.id).unwrap();

        assert!(matches!(
            validate_transaction(&tx, &[unspent]),
            Err(TransactionError::AmountMismatch {
                input_total: 100,
                output_total: 60
            })
        ));
    }

    #[test]
    fn test_block_transactions_reject_duplicate_inputs() {
        let (signing_key, address) = test_key();
        let unspent = premine_style_unspent(&address);
        let coinbase = Transaction::coinbase("miner", 3);

        let spend = signed_spend(&signing_key, &unspent, PREMINE_ADDRESS);
        let double = signed_spend(&signing_key, &unspent, &address);

        let result = validate_block_transactions(
            &[coinbase, spend, double],
            std::slice::from_ref(&unspent),
            3,
        );
        assert!(matches!(
            result,
            Err(TransactionError::DuplicateInput { .. })
        ));
    }

    #[test]
    fn test_block_transactions_require_coinbase_first() {
        let (signing_key, address) = test_key();
        let unspent = premine_style_unspent(&address);
        let spend = signed_spend(&signing_key, &unspent, PREMINE_ADDRESS);

        assert!(matches!(
            validate_block_transactions(&[spend], std::slice::from_ref(&unspent), 3),
            Err(TransactionError::CoinbaseInputCount)
                | Err(TransactionError::CoinbaseHeightMismatch { .. })
                | Err(TransactionError::CoinbaseAmount)
        ));
        assert!(matches!(
            validate_block_transactions(&[], &[], 3),
            Err(TransactionError::EmptyBlock)
        ));
    }
}
