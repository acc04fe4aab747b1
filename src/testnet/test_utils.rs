//! Test utilities for blockchain testing

use crate::core::{Block, Blockchain, ProofOfWork, Transaction, UnspentTxOut};
use crate::storage::UtxoSet;
use crate::utils::current_timestamp;
use crate::wallet::Wallet;
use std::sync::atomic::AtomicBool;

/// A fresh wallet. Key generation cannot fail outside of broken system
/// entropy, so tests unwrap here once instead of everywhere.
pub fn test_wallet() -> Wallet {
    Wallet::new().expect("Failed to generate test wallet key pair")
}

/// A UTXO set holding exactly one spendable output of `amount` owned by
/// `address`, as if funded by an earlier transaction.
pub fn funded_utxo_set(address: &str, amount: u64) -> UtxoSet {
    UtxoSet::from_entries(vec![UnspentTxOut::new(
        "f".repeat(64),
        0,
        String::from(address),
        amount,
    )])
}

/// Mine a coinbase-only successor of `prev` at the given difficulty.
pub fn mine_successor(prev: &Block, reward_address: &str, difficulty: u32) -> Block {
    let coinbase = Transaction::new_coinbase(reward_address, prev.get_index() + 1);
    let candidate = Block::new(
        prev.get_index() + 1,
        current_timestamp().expect("Failed to read wall clock"),
        prev.get_hash().to_string(),
        vec![coinbase],
        difficulty,
    );
    ProofOfWork::new(candidate)
        .run(&AtomicBool::new(false))
        .expect("Uncancelled nonce search cannot return None")
}

/// Mine a block over `chain`'s tip and current pool, without accepting it.
/// The caller decides what to do with the sealed block.
pub fn mine_block_on(chain: &Blockchain, reward_address: &str) -> Block {
    let candidate = chain
        .candidate_block(reward_address)
        .expect("Failed to build candidate block");
    ProofOfWork::new(candidate)
        .run(&AtomicBool::new(false))
        .expect("Uncancelled nonce search cannot return None")
}
