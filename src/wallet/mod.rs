//! Wallet management and cryptographic operations
//!
//! A wallet owns one ECDSA P-256 key pair; its hex-encoded public key is the
//! address the rest of the engine deals in.

#[allow(clippy::module_inception)]
pub mod wallet;

pub use wallet::Wallet;
