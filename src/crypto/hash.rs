//! SHA-256 hashing utilities
//!
//! Provides the digest functions used for block hashes and transaction ids,
//! plus the leading-zero-bits check that backs proof of work.

use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a lowercase hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Hashes a UTF-8 string preimage into a lowercase hex digest
///
/// Block hashes and transaction ids are both digests of textual preimages.
pub fn hash_string_hex(preimage: &str) -> String {
    sha256_hex(preimage.as_bytes())
}

/// Checks if a raw digest has at least `difficulty` leading zero bits
///
/// Bits are counted MSB-first per byte, matching the binary expansion of the
/// hex digest. Difficulty 0 always passes.
pub fn meets_difficulty(hash: &[u8], difficulty: u32) -> bool {
    let required_zeros = difficulty as usize / 8;
    let remaining_bits = difficulty as usize % 8;

    // Check full zero bytes
    for byte in hash.iter().take(required_zeros) {
        if *byte != 0 {
            return false;
        }
    }

    // Check remaining bits
    if remaining_bits > 0 {
        if required_zeros >= hash.len() {
            return false;
        }
        let mask = 0xFF << (8 - remaining_bits);
        if hash[required_zeros] & mask != 0 {
            return false;
        }
    }

    true
}

/// Checks a hex-encoded digest against a difficulty target
pub fn hash_matches_difficulty(hash_hex: &str, difficulty: u32) -> bool {
    match hex::decode(hash_hex) {
        Ok(bytes) => meets_difficulty(&bytes, difficulty),
        Err(_) => false,
    }
}
