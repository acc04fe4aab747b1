//! Core consensus types: transactions, blocks, difficulty retarget,
//! proof-of-work and the chain itself.

pub mod block;
pub mod blockchain;
pub mod difficulty;
pub mod proof_of_work;
pub mod transaction;

pub use block::{Block, TIMESTAMP_TOLERANCE_MS};
pub use blockchain::{accumulated_difficulty, Blockchain};
pub use difficulty::{
    DifficultyAdjustment, BLOCK_GENERATION_INTERVAL, DIFFICULTY_ADJUSTMENT_INTERVAL,
};
pub use proof_of_work::{hash_matches_difficulty, ProofOfWork};
pub use transaction::{Transaction, TxIn, TxOut, UnspentTxOut, COINBASE_AMOUNT};
