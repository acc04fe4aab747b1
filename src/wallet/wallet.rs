use crate::error::{ChainError, Result};
use crate::storage::UtxoSet;
use crate::utils::{ecdsa_p256_sha256_sign_digest, new_key_pair};
use data_encoding::HEXLOWER;
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};

/// An ECDSA P-256 key pair. The address handed to the rest of the engine is
/// the hex-encoded public key; the private key never leaves this type, the
/// core only gets `sign`.
pub struct Wallet {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let pkcs8 = new_key_pair()?;
        Wallet::from_pkcs8(pkcs8)
    }

    pub fn from_pkcs8(pkcs8: Vec<u8>) -> Result<Wallet> {
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &pkcs8, &rng)
            .map_err(|e| ChainError::Crypto(format!("Invalid PKCS8 key material: {e}")))?;
        let public_key = key_pair.public_key().as_ref().to_vec();
        Ok(Wallet { pkcs8, public_key })
    }

    /// The hex-encoded public key, used as the receive address.
    pub fn address(&self) -> String {
        HEXLOWER.encode(&self.public_key)
    }

    pub fn public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        ecdsa_p256_sha256_sign_digest(&self.pkcs8, message)
    }

    pub fn balance(&self, utxo_set: &UtxoSet) -> u64 {
        utxo_set.balance_of(&self.address())
    }
}
