//! In-memory chain state
//!
//! This module holds the two pieces of mutable chain state next to the block
//! list itself: the UTXO set and the memory pool of pending transactions.
//! Both live entirely in memory and are owned by the consensus engine.

pub mod memory_pool;
pub mod utxo_set;

pub use memory_pool::TransactionPool;
pub use utxo_set::UtxoSet;
