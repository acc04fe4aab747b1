use crate::core::{Transaction, UnspentTxOut};

/// The chain-wide set of unspent transaction outputs.
///
/// Always exactly the fold of every block's transactions in order, starting
/// from empty. Backed by a Vec so iteration order is deterministic - the
/// greedy UTXO selection in transaction creation depends on it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UtxoSet {
    entries: Vec<UnspentTxOut>,
}

impl UtxoSet {
    pub fn new() -> UtxoSet {
        UtxoSet { entries: vec![] }
    }

    pub fn from_entries(entries: Vec<UnspentTxOut>) -> UtxoSet {
        UtxoSet { entries }
    }

    pub fn find(&self, tx_out_id: &str, tx_out_index: usize) -> Option<&UnspentTxOut> {
        self.entries
            .iter()
            .find(|u| u.get_tx_out_id() == tx_out_id && u.get_tx_out_index() == tx_out_index)
    }

    pub fn contains(&self, tx_out_id: &str, tx_out_index: usize) -> bool {
        self.find(tx_out_id, tx_out_index).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnspentTxOut> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn balance_of(&self, address: &str) -> u64 {
        self.entries
            .iter()
            .filter(|u| u.get_address() == address)
            .map(|u| u.get_amount())
            .sum()
    }

    /// Total value held across all entries. Over a valid chain this equals
    /// the sum of coinbase rewards - transfers move value, never mint it.
    pub fn total_value(&self) -> u64 {
        self.entries.iter().map(|u| u.get_amount()).sum()
    }

    /// Fold a list of already-validated transactions into a new set: every
    /// UTXO referenced by an input is removed, every output becomes a new
    /// UTXO keyed by (transaction id, output position). The receiver is left
    /// untouched - callers swap in the returned set only after the whole
    /// block is accepted.
    pub fn apply_transactions(&self, transactions: &[Transaction]) -> UtxoSet {
        let new_entries: Vec<UnspentTxOut> = transactions
            .iter()
            .flat_map(|tx| {
                tx.get_tx_outs().iter().enumerate().map(|(index, tx_out)| {
                    UnspentTxOut::new(
                        tx.get_id().to_string(),
                        index,
                        tx_out.get_address().to_string(),
                        tx_out.get_amount(),
                    )
                })
            })
            .collect();

        let consumed: Vec<(&str, usize)> = transactions
            .iter()
            .flat_map(|tx| tx.get_tx_ins())
            .map(|tx_in| (tx_in.get_tx_out_id(), tx_in.get_tx_out_index()))
            .collect();

        let mut entries: Vec<UnspentTxOut> = self
            .entries
            .iter()
            .filter(|u| {
                !consumed
                    .iter()
                    .any(|(id, index)| *id == u.get_tx_out_id() && *index == u.get_tx_out_index())
            })
            .cloned()
            .collect();
        entries.extend(new_entries);

        UtxoSet { entries }
    }
}
