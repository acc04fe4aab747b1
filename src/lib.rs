//! # Meshcoin - A Minimal Proof-of-Work Blockchain Engine
//!
//! A replicated, append-only ledger of transactions, synchronized across
//! peers by a longest-accumulated-difficulty rule, funding transfers through
//! a UTXO model secured by ECDSA P-256 signatures.
//!
//! ## How the code is organized
//! - `core/`: blocks, transactions, difficulty retarget, proof-of-work and
//!   the consensus engine itself
//! - `wallet/`: key management and signing
//! - `network/`: peer messages, the registry transport, the per-node actor
//! - `storage/`: the UTXO set and the transaction pool
//! - `config/`: runtime settings
//! - `utils/`: hashing, signatures, wire serialization
//! - `cli/`: command-line interface
//!
//! ## The moving parts, in one paragraph
//! Each node owns a private chain/UTXO-set/mempool triple and a single event
//! queue; peers reach it only through serialized messages delivered to that
//! queue, and a background nonce search hands its sealed block back through
//! the same queue. All state mutation therefore happens on one thread per
//! node, with cancellation of in-flight mining as the only cross-thread
//! signal.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{Config, GLOBAL_CONFIG};
pub use core::{
    accumulated_difficulty, Block, Blockchain, DifficultyAdjustment, ProofOfWork, Transaction,
    TxIn, TxOut, UnspentTxOut, COINBASE_AMOUNT,
};
pub use error::{ChainError, Result};
pub use network::{Message, MessagePayload, Node, NodeEvent, NodeId, PeerRegistry};
pub use storage::{TransactionPool, UtxoSet};
pub use utils::{
    current_timestamp, ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, new_key_pair,
    sha256_digest, sha256_hex,
};
pub use wallet::Wallet;
