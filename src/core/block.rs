use crate::core::proof_of_work::hash_matches_difficulty;
use crate::core::Transaction;
use crate::error::Result;
use crate::storage::UtxoSet;
use crate::utils::{current_timestamp, sha256_hex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How far a block timestamp may drift: at most this far behind its
/// predecessor, at most this far ahead of the local wall clock.
pub const TIMESTAMP_TOLERANCE_MS: i64 = 60_000;

/// A block of transactions. `transactions[0]` is always the coinbase.
///
/// A block under construction is mutable only in `nonce`/`hash`; once sealed
/// by the nonce search it is immutable - any field change invalidates the
/// hash.
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    index: usize,
    timestamp: i64,
    previous_hash: String,
    hash: String,
    transactions: Vec<Transaction>,
    difficulty: u32,
    nonce: i64,
}

impl Block {
    /// An unsealed candidate block: nonce 0, hash empty. The proof-of-work
    /// search seals it.
    pub fn new(
        index: usize,
        timestamp: i64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        difficulty: u32,
    ) -> Block {
        Block {
            index,
            timestamp,
            previous_hash,
            hash: String::new(),
            transactions,
            difficulty,
            nonce: 0,
        }
    }

    /// The genesis block for a fresh node: index 0, empty previous hash, a
    /// single coinbase to the node's own address. Hash-sealed directly,
    /// without a nonce search.
    pub fn genesis(address: &str, difficulty: u32) -> Result<Block> {
        let coinbase = Transaction::new_coinbase(address, 0);
        let mut block = Block::new(
            0,
            current_timestamp()?,
            String::new(),
            vec![coinbase],
            difficulty,
        );
        block.hash = block.compute_hash();
        Ok(block)
    }

    /// Hash over every field except `hash` itself: index, previous hash,
    /// timestamp, the ordered transaction list (ids, inputs with signatures,
    /// outputs), difficulty and nonce.
    pub fn compute_hash(&self) -> String {
        let mut data_bytes = vec![];
        data_bytes.extend(self.index.to_be_bytes());
        data_bytes.extend(self.previous_hash.as_bytes());
        data_bytes.extend(self.timestamp.to_be_bytes());
        for tx in &self.transactions {
            data_bytes.extend(tx.hash_payload());
        }
        data_bytes.extend(self.difficulty.to_be_bytes());
        data_bytes.extend(self.nonce.to_be_bytes());
        sha256_hex(data_bytes.as_slice())
    }

    /// Fix the nonce/hash pair found by the proof-of-work search.
    pub fn seal(&mut self, nonce: i64, hash: String) {
        self.nonce = nonce;
        self.hash = hash;
    }

    pub fn has_valid_hash(&self) -> bool {
        if self.hash.is_empty() {
            return false;
        }
        self.hash == self.compute_hash()
    }

    /// Genesis validity: index 0, no previous hash, own hash recomputes.
    /// Difficulty is deliberately not enforced here - every node seals its
    /// own genesis without mining and the network converges on one later.
    pub fn is_valid_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash.is_empty() && self.has_valid_hash()
    }

    /// Whether this block is a valid direct successor of `prev`: index and
    /// hash linkage, timestamp inside the tolerance window, recomputed hash
    /// matching, and the proof-of-work predicate satisfied.
    pub fn is_valid_successor(&self, prev: &Block) -> bool {
        if prev.index + 1 != self.index {
            log::warn!("Invalid index on block #{}", self.index);
            return false;
        }
        if self.previous_hash != prev.hash {
            log::warn!("Invalid previous hash on block #{}", self.index);
            return false;
        }
        if !self.is_timestamp_valid(prev) {
            log::warn!("Invalid timestamp on block #{}", self.index);
            return false;
        }
        if !self.has_valid_hash() {
            log::warn!("Invalid hash on block #{}", self.index);
            return false;
        }
        if !hash_matches_difficulty(&self.hash, self.difficulty) {
            log::warn!(
                "Block #{} does not satisfy difficulty {}",
                self.index,
                self.difficulty
            );
            return false;
        }
        true
    }

    fn is_timestamp_valid(&self, prev: &Block) -> bool {
        let now = match current_timestamp() {
            Ok(now) => now,
            Err(e) => {
                log::error!("Cannot read wall clock for timestamp validation: {e}");
                return false;
            }
        };
        prev.timestamp < self.timestamp + TIMESTAMP_TOLERANCE_MS
            && self.timestamp < now + TIMESTAMP_TOLERANCE_MS
    }

    /// Validate this block's transactions against a UTXO set: the coinbase
    /// must match this block's height, no UTXO may be referenced by two
    /// inputs anywhere in the block, and every non-coinbase transaction must
    /// validate on its own.
    pub fn has_valid_transactions(&self, utxo_set: &UtxoSet) -> bool {
        let coinbase = match self.transactions.first() {
            Some(tx) => tx,
            None => {
                log::error!("Block #{} has no transactions", self.index);
                return false;
            }
        };
        if !coinbase.is_valid_coinbase(self.index) {
            log::error!("Invalid coinbase in block #{}", self.index);
            return false;
        }

        // Duplicate-spend-in-block check. Quadratic over all inputs, which is
        // fine at the block sizes this engine produces.
        let all_tx_ins: Vec<_> = self
            .transactions
            .iter()
            .flat_map(|tx| tx.get_tx_ins())
            .collect();
        for (i, tx_in) in all_tx_ins.iter().enumerate() {
            let duplicated = all_tx_ins.iter().skip(i + 1).any(|other| {
                other.get_tx_out_id() == tx_in.get_tx_out_id()
                    && other.get_tx_out_index() == tx_in.get_tx_out_index()
            });
            if duplicated {
                log::error!("Block #{} contains duplicate inputs", self.index);
                return false;
            }
        }

        self.transactions
            .iter()
            .skip(1)
            .all(|tx| tx.is_valid(utxo_set))
    }

    /// Validate the transactions and fold them into a copy of `utxo_set`.
    /// `None` means the block's transactions are invalid; the input set is
    /// never touched.
    pub fn process_transactions(&self, utxo_set: &UtxoSet) -> Option<UtxoSet> {
        if !self.has_valid_transactions(utxo_set) {
            log::error!("Invalid transactions in block #{}", self.index);
            return None;
        }
        Some(utxo_set.apply_transactions(&self.transactions))
    }

    pub fn get_index(&self) -> usize {
        self.index
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_previous_hash(&self) -> &str {
        self.previous_hash.as_str()
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_nonce(&self) -> i64 {
        self.nonce
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        crate::utils::serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        crate::utils::deserialize(bytes)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block #{} [previous hash: {}, timestamp: {}, txs: {}, hash: {}, difficulty: {}]",
            self.index,
            self.previous_hash,
            self.timestamp,
            self.transactions.len(),
            self.hash,
            self.difficulty
        )
    }
}
