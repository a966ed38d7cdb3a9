//! ECDSA key handling over P-256
//!
//! Transaction ids are already SHA-256 hex digests, so signatures are made
//! and checked over the raw bytes of the decoded hex string with no second
//! hashing pass. Signatures travel hex-encoded in ASN.1 DER form.

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::DecodePublicKey;
use p256::SecretKey;
use rand::rngs::OsRng;

use super::point::{coordinate_bytes, decompress, CryptoError};

/// Builds a verifying key from a hex-encoded compressed address
pub fn verifying_key_from_address(address: &str) -> Result<VerifyingKey, CryptoError> {
    let (x, y) = decompress(address)?;

    let mut sec1 = [0u8; 65];
    sec1[0] = 0x04;
    sec1[1..33].copy_from_slice(&coordinate_bytes(&x));
    sec1[33..].copy_from_slice(&coordinate_bytes(&y));

    VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| CryptoError::InvalidPublicKey)
}

/// Verifies a DER signature over an already-hashed hex message
///
/// Returns `Ok(false)` on a well-formed signature that does not verify;
/// malformed hex or DER is an error.
pub fn verify_ecdsa(
    public_key: &VerifyingKey,
    message_hex: &str,
    signature_hex: &str,
) -> Result<bool, CryptoError> {
    let message = hex::decode(message_hex)?;
    let der = hex::decode(signature_hex)?;
    let signature = Signature::from_der(&der).map_err(|_| CryptoError::InvalidSignature)?;

    Ok(public_key.verify_prehash(&message, &signature).is_ok())
}

/// Signs an already-hashed hex message, returning the hex-encoded DER signature
pub fn sign_ecdsa(signing_key: &SigningKey, message_hex: &str) -> Result<String, CryptoError> {
    let message = hex::decode(message_hex)?;
    let signature: Signature = signing_key
        .sign_prehash(&message)
        .map_err(|_| CryptoError::SigningFailed)?;
    let der = signature.to_der();
    Ok(hex::encode(der.as_bytes()))
}

/// Hex-encoded 33-byte compressed form of a public key
pub fn compressed_address(public_key: &VerifyingKey) -> String {
    hex::encode(public_key.to_encoded_point(true).as_bytes())
}

/// Generates a fresh signing key
pub fn generate_signing_key() -> SigningKey {
    SigningKey::random(&mut OsRng)
}

/// Parses an SPKI PEM public key
pub fn verifying_key_from_pem(pem: &str) -> Result<VerifyingKey, CryptoError> {
    VerifyingKey::from_public_key_pem(pem).map_err(|_| CryptoError::MalformedPem)
}

/// Parses a SEC1 PEM private key
pub fn signing_key_from_pem(pem: &str) -> Result<SigningKey, CryptoError> {
    let secret = SecretKey::from_sec1_pem(pem).map_err(|_| CryptoError::MalformedPem)?;
    Ok(SigningKey::from(secret))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::hash_string_hex;

    #[test]
    fn test_compressed_address_round_trip() {
        let signing_key = generate_signing_key();
        let public_key = VerifyingKey::from(&signing_key);

        let address = compressed_address(&public_key);
        assert_eq!(address.len(), 66);

        let recovered = verifying_key_from_address(&address).unwrap();
        assert_eq!(recovered, public_key);
    }

    #[test]
    fn test_sign_and_verify() {
        let signing_key = generate_signing_key();
        let public_key = VerifyingKey::from(&signing_key);
        let message = hash_string_hex("pay alice 40");

        let signature = sign_ecdsa(&signing_key, &message).unwrap();
        assert!(verify_ecdsa(&public_key, &message, &signature).unwrap());
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let signing_key = generate_signing_key();
        let other_key = VerifyingKey::from(&generate_signing_key());
        let message = hash_string_hex("pay alice 40");

        let signature = sign_ecdsa(&signing_key, &message).unwrap();
        assert!(!verify_ecdsa(&other_key, &message, &signature).unwrap());
    }

    #[test]
    fn test_verify_rejects_tampered_message() {
        let signing_key = generate_signing_key();
        let public_key = VerifyingKey::from(&signing_key);

        let signature = sign_ecdsa(&signing_key, &hash_string_hex("pay alice 40")).unwrap();
        let tampered = hash_string_hex("pay mallory 40");
        assert!(!verify_ecdsa(&public_key, &tampered, &signature).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_signature() {
        let public_key = VerifyingKey::from(&generate_signing_key());
        let message = hash_string_hex("pay alice 40");

        assert!(matches!(
            verify_ecdsa(&public_key, &message, "deadbeef"),
            Err(CryptoError::InvalidSignature)
        ));
        assert!(matches!(
            verify_ecdsa(&public_key, &message, "zz"),
            Err(CryptoError::Decode(_))
        ));
    }

    #[test]
    fn test_public_key_pem_round_trip() {
        use p256::pkcs8::EncodePublicKey;

        let signing_key = generate_signing_key();
        let public_key = VerifyingKey::from(&signing_key);
        let pem = public_key
            .to_public_key_pem(Default::default())
            .unwrap();

        let parsed = verifying_key_from_pem(&pem).unwrap();
        assert_eq!(parsed, public_key);
    }

    #[test]
    fn test_pem_rejects_garbage() {
        assert!(matches!(
            verifying_key_from_pem("not a pem"),
            Err(CryptoError::MalformedPem)
        ));
        assert!(matches!(
            signing_key_from_pem("not a pem"),
            Err(CryptoError::MalformedPem)
        ));
    }
}
