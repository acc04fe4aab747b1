use data_encoding::HEXLOWER;
use ring::digest::{Context, SHA256};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, ECDSA_P256_SHA256_FIXED, ECDSA_P256_SHA256_FIXED_SIGNING};

use crate::error::{ChainError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ChainError::Crypto(format!("System time error: {e}")))?
        .as_millis();

    // Ensure the timestamp fits in i64
    if duration > i64::MAX as u128 {
        return Err(ChainError::Crypto("Timestamp overflow".to_string()));
    }

    Ok(duration as i64)
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

/// SHA-256 digest as a lowercase hex string, the fixed-width form used for
/// block hashes and transaction ids throughout the chain.
pub fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(sha256_digest(data).as_slice())
}

pub fn new_key_pair() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
        .map_err(|e| ChainError::Crypto(format!("Failed to generate ECDSA key pair: {e}")))?
        .as_ref()
        .to_vec();
    Ok(pkcs8)
}

pub fn ecdsa_p256_sha256_sign_digest(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let rng = ring::rand::SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| ChainError::Crypto(format!("Failed to create key pair from PKCS8: {e}")))?;
    let signature = key_pair
        .sign(&rng, message)
        .map_err(|e| ChainError::Crypto(format!("Failed to sign message: {e}")))?
        .as_ref()
        .to_vec();
    Ok(signature)
}

/// Verification is a pure predicate: corrupt key material or a mangled
/// signature yields `false`, never an error that unwinds validation.
pub fn ecdsa_p256_sha256_sign_verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let peer_public_key =
        ring::signature::UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, public_key);
    let result = peer_public_key.verify(message, signature.as_ref());
    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_is_deterministic() {
        let a = sha256_hex(b"meshcoin");
        let b = sha256_hex(b"meshcoin");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, sha256_hex(b"meshcoim"));
    }

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let pkcs8 = new_key_pair().unwrap();
        let rng = SystemRandom::new();
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &pkcs8, &rng).unwrap();
        let public_key = ring::signature::KeyPair::public_key(&key_pair)
            .as_ref()
            .to_vec();

        let message = b"spend output 0 of tx abc";
        let signature = ecdsa_p256_sha256_sign_digest(&pkcs8, message).unwrap();

        assert!(ecdsa_p256_sha256_sign_verify(
            &public_key,
            &signature,
            message
        ));
        assert!(!ecdsa_p256_sha256_sign_verify(
            &public_key,
            &signature,
            b"a different message"
        ));
    }

    #[test]
    fn test_verify_rejects_corrupt_material_without_panicking() {
        let pkcs8 = new_key_pair().unwrap();
        let signature = ecdsa_p256_sha256_sign_digest(&pkcs8, b"msg").unwrap();

        // Garbage public key and truncated signature must both come back false.
        assert!(!ecdsa_p256_sha256_sign_verify(b"not a key", &signature, b"msg"));
        assert!(!ecdsa_p256_sha256_sign_verify(b"", &signature[..4], b"msg"));
    }
}
