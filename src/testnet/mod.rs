//! Testnet Framework for Blockchain Testing
//!
//! Shared helpers for building wallets, funded UTXO sets and mined blocks in
//! unit tests, all at test-friendly difficulties.

pub mod test_utils;

pub use test_utils::*;
