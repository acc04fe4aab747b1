// This file implements the transaction system - how value moves between addresses
// I'm following the UTXO (Unspent Transaction Output) model: every transaction
// consumes previous outputs and creates new ones, and the chain-wide UTXO set
// is the only record of who owns what.

use crate::error::{ChainError, Result};
use crate::storage::{TransactionPool, UtxoSet};
use crate::utils::{ecdsa_p256_sha256_sign_verify, sha256_hex};
use crate::wallet::Wallet;
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};

/// Fixed reward granted by the coinbase transaction of every block
pub const COINBASE_AMOUNT: u64 = 50;

/// A spendable output, as tracked in the chain-wide UTXO set.
/// Created when a transaction output enters the chain, removed when a later
/// transaction input references it. Immutable for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentTxOut {
    tx_out_id: String,
    tx_out_index: usize,
    address: String,
    amount: u64,
}

impl UnspentTxOut {
    pub fn new(tx_out_id: String, tx_out_index: usize, address: String, amount: u64) -> Self {
        UnspentTxOut {
            tx_out_id,
            tx_out_index,
            address,
            amount,
        }
    }

    pub fn get_tx_out_id(&self) -> &str {
        self.tx_out_id.as_str()
    }

    pub fn get_tx_out_index(&self) -> usize {
        self.tx_out_index
    }

    pub fn get_address(&self) -> &str {
        self.address.as_str()
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }
}

// A transaction input - it references exactly one UTXO by (transaction id,
// output index). The signature starts empty and is filled once by the owning
// wallet before the transaction is admitted anywhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TxIn {
    tx_out_id: String,
    tx_out_index: usize,
    signature: Vec<u8>,
}

impl TxIn {
    pub fn new(tx_out_id: String, tx_out_index: usize) -> TxIn {
        TxIn {
            tx_out_id,
            tx_out_index,
            signature: vec![], // filled by the wallet during signing
        }
    }

    pub fn get_tx_out_id(&self) -> &str {
        self.tx_out_id.as_str()
    }

    pub fn get_tx_out_index(&self) -> usize {
        self.tx_out_index
    }

    pub fn get_signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    pub fn set_signature(&mut self, signature: Vec<u8>) {
        self.signature = signature;
    }

    /// Resolve the UTXO this input spends, if it is still unspent.
    pub fn referenced_output<'a>(&self, utxo_set: &'a UtxoSet) -> Option<&'a UnspentTxOut> {
        utxo_set.find(self.tx_out_id.as_str(), self.tx_out_index)
    }

    /// Check that the referenced UTXO exists and that the signature over the
    /// transaction id verifies against the key owning it. The owner's address
    /// IS its hex-encoded public key, so decoding it gives the verifying key.
    pub fn is_valid(&self, tx_id: &str, utxo_set: &UtxoSet) -> bool {
        let referenced = match self.referenced_output(utxo_set) {
            Some(utxo) => utxo,
            None => {
                log::error!(
                    "Referenced output not found: {}:{}",
                    self.tx_out_id,
                    self.tx_out_index
                );
                return false;
            }
        };

        let public_key = match HEXLOWER.decode(referenced.get_address().as_bytes()) {
            Ok(key) => key,
            Err(_) => {
                log::error!("Owner address is not valid hex: {}", referenced.get_address());
                return false;
            }
        };

        ecdsa_p256_sha256_sign_verify(&public_key, &self.signature, tx_id.as_bytes())
    }
}

/// A transaction output - an amount payable to whoever holds the private key
/// for `address`. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TxOut {
    address: String,
    amount: u64,
}

impl TxOut {
    pub fn new(address: String, amount: u64) -> TxOut {
        TxOut { address, amount }
    }

    pub fn get_address(&self) -> &str {
        self.address.as_str()
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }
}

// The main transaction structure. The id commits to every input reference and
// every output; it is recomputed and compared on each validation, never
// trusted as given.
#[derive(Debug, Clone, Default, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Transaction {
    id: String,
    tx_ins: Vec<TxIn>,
    tx_outs: Vec<TxOut>,
}

impl Transaction {
    /// Create the reward transaction for a block at `block_height`. The single
    /// input carries no real reference - its index is the block height, which
    /// keeps coinbase ids unique per height without any randomness.
    pub fn new_coinbase(address: &str, block_height: usize) -> Transaction {
        let mut tx = Transaction {
            id: String::new(),
            tx_ins: vec![TxIn::new(String::new(), block_height)],
            tx_outs: vec![TxOut::new(address.to_string(), COINBASE_AMOUNT)],
        };
        tx.id = tx.compute_id();
        tx
    }

    /// Create a signed transfer of `amount` from the wallet's address to
    /// `recipient`, funded by the sender's UTXOs.
    ///
    /// UTXOs already referenced by a pooled transaction are skipped so two
    /// locally created transfers never race for the same output. Selection is
    /// greedy in UTXO set iteration order - I accumulate until the amount is
    /// covered, not until the fit is optimal. Change goes back to the sender
    /// as a second output.
    pub fn new_transaction(
        wallet: &Wallet,
        recipient: &str,
        amount: u64,
        utxo_set: &UtxoSet,
        pool: &TransactionPool,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(ChainError::Transaction(
                "Amount must be positive".to_string(),
            ));
        }

        let sender = wallet.address();

        let mut selected: Vec<&UnspentTxOut> = vec![];
        let mut accumulated = 0u64;
        for utxo in utxo_set.iter() {
            if utxo.get_address() != sender {
                continue;
            }
            if pool.references_output(utxo.get_tx_out_id(), utxo.get_tx_out_index()) {
                continue; // already promised to a pooled transaction
            }
            selected.push(utxo);
            accumulated += utxo.get_amount();
            if accumulated >= amount {
                break;
            }
        }

        if accumulated < amount {
            return Err(ChainError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let leftover = accumulated - amount;

        let tx_ins = selected
            .iter()
            .map(|utxo| TxIn::new(utxo.get_tx_out_id().to_string(), utxo.get_tx_out_index()))
            .collect();

        let mut tx_outs = vec![TxOut::new(recipient.to_string(), amount)];
        if leftover > 0 {
            tx_outs.push(TxOut::new(sender.clone(), leftover));
        }

        let mut tx = Transaction {
            id: String::new(),
            tx_ins,
            tx_outs,
        };
        tx.id = tx.compute_id();
        tx.sign_inputs(wallet, utxo_set)?;

        Ok(tx)
    }

    /// Hash of all input references plus all outputs. Signatures are excluded
    /// so the id can be signed.
    pub fn compute_id(&self) -> String {
        let mut data_bytes = vec![];
        for tx_in in &self.tx_ins {
            data_bytes.extend(tx_in.get_tx_out_id().as_bytes());
            data_bytes.extend(tx_in.get_tx_out_index().to_be_bytes());
        }
        for tx_out in &self.tx_outs {
            data_bytes.extend(tx_out.get_address().as_bytes());
            data_bytes.extend(tx_out.get_amount().to_be_bytes());
        }
        sha256_hex(data_bytes.as_slice())
    }

    /// The byte form a block hash commits to: id, inputs including their
    /// signatures, and outputs.
    pub fn hash_payload(&self) -> Vec<u8> {
        let mut data_bytes = vec![];
        data_bytes.extend(self.id.as_bytes());
        for tx_in in &self.tx_ins {
            data_bytes.extend(tx_in.get_tx_out_id().as_bytes());
            data_bytes.extend(tx_in.get_tx_out_index().to_be_bytes());
            data_bytes.extend(tx_in.get_signature());
        }
        for tx_out in &self.tx_outs {
            data_bytes.extend(tx_out.get_address().as_bytes());
            data_bytes.extend(tx_out.get_amount().to_be_bytes());
        }
        data_bytes
    }

    fn sign_inputs(&mut self, wallet: &Wallet, utxo_set: &UtxoSet) -> Result<()> {
        let id = self.id.clone();
        for tx_in in &mut self.tx_ins {
            let referenced = tx_in.referenced_output(utxo_set).ok_or_else(|| {
                ChainError::Transaction("Referenced output not found while signing".to_string())
            })?;

            if referenced.get_address() != wallet.address() {
                return Err(ChainError::Transaction(
                    "Signing key does not match the owner of the referenced output".to_string(),
                ));
            }

            let signature = wallet.sign(id.as_bytes())?;
            tx_in.set_signature(signature);
        }
        Ok(())
    }

    /// Validate this transaction against a UTXO set: id recomputation, every
    /// input signature, and value conservation (inputs == outputs).
    ///
    /// Double spends ACROSS transactions are not checked here - the caller
    /// validating a whole block or the pool owns that check.
    pub fn is_valid(&self, utxo_set: &UtxoSet) -> bool {
        if self.compute_id() != self.id {
            log::error!("Invalid tx id: {}", self.id);
            return false;
        }

        if self.tx_ins.iter().any(|tx_in| !tx_in.is_valid(&self.id, utxo_set)) {
            log::error!("Some of the inputs are invalid in tx: {}", self.id);
            return false;
        }

        let mut input_total = 0u64;
        for tx_in in &self.tx_ins {
            let amount = match tx_in.referenced_output(utxo_set) {
                Some(utxo) => utxo.get_amount(),
                None => return false,
            };
            input_total = match input_total.checked_add(amount) {
                Some(sum) => sum,
                None => {
                    log::error!("Input value overflow in tx: {}", self.id);
                    return false;
                }
            };
        }

        let output_total = match self.checked_output_value() {
            Some(total) => total,
            None => {
                log::error!("Output value overflow in tx: {}", self.id);
                return false;
            }
        };

        if input_total != output_total {
            log::error!(
                "Input value {} != output value {} in tx: {}",
                input_total,
                output_total,
                self.id
            );
            return false;
        }

        true
    }

    /// Validate a coinbase transaction for a block at `block_height`:
    /// recomputed id, exactly one input keyed by the height, exactly one
    /// output of the fixed reward. No signature is required.
    pub fn is_valid_coinbase(&self, block_height: usize) -> bool {
        if self.compute_id() != self.id {
            log::error!("Invalid coinbase tx id: {}", self.id);
            return false;
        }

        if self.tx_ins.len() != 1 {
            log::error!("Coinbase transaction must have exactly one input");
            return false;
        }

        if self.tx_outs.len() != 1 {
            log::error!("Coinbase transaction must have exactly one output");
            return false;
        }

        if self.tx_ins[0].get_tx_out_index() != block_height {
            log::error!("Coinbase input index must equal the block height");
            return false;
        }

        if self.tx_outs[0].get_amount() != COINBASE_AMOUNT {
            log::error!("Invalid reward amount in coinbase transaction");
            return false;
        }

        true
    }

    pub fn is_coinbase(&self) -> bool {
        self.tx_ins.len() == 1 && self.tx_ins[0].get_tx_out_id().is_empty()
    }

    pub fn get_id(&self) -> &str {
        self.id.as_str()
    }

    pub fn get_tx_ins(&self) -> &[TxIn] {
        self.tx_ins.as_slice()
    }

    pub fn get_tx_outs(&self) -> &[TxOut] {
        self.tx_outs.as_slice()
    }

    fn checked_output_value(&self) -> Option<u64> {
        let mut total = 0u64;
        for tx_out in &self.tx_outs {
            total = total.checked_add(tx_out.get_amount())?;
        }
        Some(total)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        crate::utils::serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        crate::utils::deserialize(bytes)
    }
}
