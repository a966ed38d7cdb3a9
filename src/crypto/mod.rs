//! Cryptographic primitives
//!
//! This module provides:
//! - SHA-256 hashing and the difficulty prefix check
//! - Compressed P-256 address decompression
//! - ECDSA signing and verification (DER signatures over pre-hashed messages)

pub mod hash;
pub mod keys;
pub mod point;

pub use hash::{hash_matches_difficulty, hash_string_hex, meets_difficulty, sha256, sha256_hex};
pub use keys::{
    compressed_address, generate_signing_key, sign_ecdsa, signing_key_from_pem, verify_ecdsa,
    verifying_key_from_address, verifying_key_from_pem,
};
pub use point::{decompress, CryptoError};
