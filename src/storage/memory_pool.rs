use crate::core::Transaction;
use crate::storage::UtxoSet;
use std::collections::HashMap;

/// The mempool: valid transactions waiting to be mined. ( K -> tx id, V -> Transaction )
///
/// Owned exclusively by the node's blockchain - all mutation funnels through
/// the consensus entry points, so no interior locking is needed here.
/// Entries never survive a restart.
#[derive(Debug, Clone, Default)]
pub struct TransactionPool {
    inner: HashMap<String, Transaction>,
}

impl TransactionPool {
    pub fn new() -> TransactionPool {
        TransactionPool {
            inner: HashMap::new(),
        }
    }

    /// Admit a transaction. Rejects a duplicate id, a transaction that fails
    /// validation against the given UTXO set, and any transaction whose input
    /// is already referenced by a pooled one - two pooled transactions must
    /// never race to spend the same UTXO.
    pub fn add(&mut self, tx: Transaction, utxo_set: &UtxoSet) -> bool {
        if self.inner.contains_key(tx.get_id()) {
            log::info!("Transaction already exists in pool: {}", tx.get_id());
            return false;
        }

        if !tx.is_valid(utxo_set) {
            log::error!("Trying to add invalid tx to pool: {}", tx.get_id());
            return false;
        }

        let conflicting = tx.get_tx_ins().iter().any(|tx_in| {
            self.references_output(tx_in.get_tx_out_id(), tx_in.get_tx_out_index())
        });
        if conflicting {
            log::error!(
                "Input already referenced by a pooled transaction: {}",
                tx.get_id()
            );
            return false;
        }

        log::info!("Adding to tx pool: {}", tx.get_id());
        self.inner.insert(tx.get_id().to_string(), tx);
        true
    }

    /// Drop every pooled transaction referencing a UTXO no longer present in
    /// `utxo_set`. Called exactly once after every chain mutation (a new
    /// block, or a wholesale chain replacement).
    pub fn update(&mut self, utxo_set: &UtxoSet) {
        self.inner.retain(|_, tx| {
            tx.get_tx_ins()
                .iter()
                .all(|tx_in| utxo_set.contains(tx_in.get_tx_out_id(), tx_in.get_tx_out_index()))
        });
    }

    /// Independent copies of the pooled transactions, sorted by id so
    /// candidate blocks and broadcasts are reproducible.
    pub fn snapshot(&self) -> Vec<Transaction> {
        let mut transactions: Vec<Transaction> = self.inner.values().cloned().collect();
        transactions.sort_by(|a, b| a.get_id().cmp(b.get_id()));
        transactions
    }

    /// Whether any pooled transaction already spends the given output.
    pub fn references_output(&self, tx_out_id: &str, tx_out_index: usize) -> bool {
        self.inner.values().any(|tx| {
            tx.get_tx_ins().iter().any(|tx_in| {
                tx_in.get_tx_out_id() == tx_out_id && tx_in.get_tx_out_index() == tx_out_index
            })
        })
    }

    pub fn contains(&self, tx_id: &str) -> bool {
        self.inner.contains_key(tx_id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::test_utils::{funded_utxo_set, test_wallet};

    #[test]
    fn test_add_and_duplicate_rejection() {
        let wallet = test_wallet();
        let utxo_set = funded_utxo_set(&wallet.address(), 50);
        let mut pool = TransactionPool::new();

        let tx = Transaction::new_transaction(&wallet, "B1", 10, &utxo_set, &pool).unwrap();
        assert!(pool.add(tx.clone(), &utxo_set));
        assert!(pool.contains(tx.get_id()));
        assert!(!pool.add(tx, &utxo_set)); // same id again
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_conflicting_spend_is_rejected() {
        let wallet = test_wallet();
        let utxo_set = funded_utxo_set(&wallet.address(), 50);
        let mut pool = TransactionPool::new();

        // Both transactions are built against an empty pool, so both spend
        // the same 50-coin UTXO. Only the first may enter.
        let empty = TransactionPool::new();
        let first = Transaction::new_transaction(&wallet, "B1", 10, &utxo_set, &empty).unwrap();
        let second = Transaction::new_transaction(&wallet, "B2", 20, &utxo_set, &empty).unwrap();

        assert!(pool.add(first, &utxo_set));
        assert!(!pool.add(second, &utxo_set));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_update_drops_consumed_transactions() {
        let wallet = test_wallet();
        let utxo_set = funded_utxo_set(&wallet.address(), 50);
        let mut pool = TransactionPool::new();

        let tx = Transaction::new_transaction(&wallet, "B1", 10, &utxo_set, &pool).unwrap();
        assert!(pool.add(tx.clone(), &utxo_set));

        // Once the spend lands in a block the referenced UTXO disappears and
        // the pooled copy must be evicted.
        let next_set = utxo_set.apply_transactions(&[tx]);
        pool.update(&next_set);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_snapshot_is_independent_and_sorted() {
        let wallet = test_wallet();
        let utxo_set = funded_utxo_set(&wallet.address(), 50);
        let mut pool = TransactionPool::new();

        let tx = Transaction::new_transaction(&wallet, "B1", 10, &utxo_set, &pool).unwrap();
        pool.add(tx, &utxo_set);

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.len(), 1);

        let ids: Vec<&str> = snapshot.iter().map(|t| t.get_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }
}
