//! Compressed P-256 point decompression
//!
//! Addresses are 33-byte compressed public keys: one sign byte (`0x02` even
//! Y, `0x03` odd Y) followed by the big-endian X coordinate. Decompression
//! recovers Y by solving `y^2 = x^3 - 3x + b (mod p)` and taking the modular
//! square root via `y = (y^2)^((p+1)/4) mod p`, valid because `p = 3 mod 4`.

use num_bigint::BigUint;
use thiserror::Error;

/// P-256 prime modulus, big-endian
const CURVE_P: [u8; 32] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];

/// P-256 curve constant b, big-endian
const CURVE_B: [u8; 32] = [
    0x5a, 0xc6, 0x35, 0xd8, 0xaa, 0x3a, 0x93, 0xe7, 0xb3, 0xeb, 0xbd, 0x55, 0x76, 0x98, 0x86, 0xbc,
    0x65, 0x1d, 0x06, 0xb0, 0xcc, 0x53, 0xb0, 0xf6, 0x3b, 0xce, 0x3c, 0x3e, 0x27, 0xd2, 0x60, 0x4b,
];

/// Errors from address decoding, point math and signature handling
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("invalid hex encoding: {0}")]
    Decode(#[from] hex::FromHexError),
    #[error("invalid address length: {0} bytes")]
    InvalidAddressLength(usize),
    #[error("invalid sign byte: {0:#04x}")]
    InvalidSignByte(u8),
    #[error("x coordinate is not on the curve")]
    OffCurve,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid signature encoding")]
    InvalidSignature,
    #[error("signing failed")]
    SigningFailed,
    #[error("malformed PEM key")]
    MalformedPem,
}

/// Decompresses a hex-encoded compressed address into its (x, y) coordinates
///
/// Rejects inputs that are not 33 bytes, carry a sign byte other than `0x02`
/// or `0x03`, or whose X coordinate has no square root on the curve.
pub fn decompress(address: &str) -> Result<(BigUint, BigUint), CryptoError> {
    let compressed = hex::decode(address)?;
    if compressed.len() != 33 {
        return Err(CryptoError::InvalidAddressLength(compressed.len()));
    }

    let sign_byte = compressed[0];
    if sign_byte != 0x02 && sign_byte != 0x03 {
        return Err(CryptoError::InvalidSignByte(sign_byte));
    }

    let p = BigUint::from_bytes_be(&CURVE_P);
    let b = BigUint::from_bytes_be(&CURVE_B);
    let x = BigUint::from_bytes_be(&compressed[1..]);

    // y^2 = x^3 - 3x + b (mod p)
    let x_cubed = x.modpow(&BigUint::from(3u32), &p);
    let three_x = (&x * 3u32) % &p;
    let y_squared = ((x_cubed + &p - three_x) + b) % &p;

    // p = 3 mod 4, so the square root (when one exists) is a single modpow
    let exponent = (&p + 1u32) >> 2u32;
    let y = y_squared.modpow(&exponent, &p);

    // The exponentiation always yields a value; only a true root means the
    // point is on the curve.
    if (&y * &y) % &p != y_squared {
        return Err(CryptoError::OffCurve);
    }

    let y = if y.bit(0) != (sign_byte & 1 == 1) {
        (&p - &y) % &p
    } else {
        y
    };

    Ok((x, y))
}

/// Left-pads a coordinate to its fixed 32-byte big-endian encoding
pub fn coordinate_bytes(value: &BigUint) -> [u8; 32] {
    let raw = value.to_bytes_be();
    let mut padded = [0u8; 32];
    padded[32 - raw.len()..].copy_from_slice(&raw);
    padded
}
