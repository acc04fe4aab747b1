use crate::core::{Block, DifficultyAdjustment, Transaction};
use crate::error::{ChainError, Result};
use crate::storage::{TransactionPool, UtxoSet};
use crate::utils::current_timestamp;
use crate::wallet::Wallet;
use num_bigint::BigUint;
use std::fmt;

/// One node's replicated ledger: the block sequence, the UTXO set derived
/// from it, and the mempool of not-yet-mined transactions. The blockchain
/// exclusively owns all three; every mutation goes through `accept_block`,
/// `replace_chain` or the pool entry points.
pub struct Blockchain {
    blocks: Vec<Block>,
    utxo_set: UtxoSet,
    pool: TransactionPool,
}

impl Blockchain {
    /// A fresh chain seeded with this node's own genesis block. Peers each
    /// mint their own genesis; the network converges on one through
    /// `replace_chain`.
    pub fn new(genesis_address: &str, difficulty: u32) -> Result<Blockchain> {
        let genesis = Block::genesis(genesis_address, difficulty)?;
        let utxo_set = match genesis.process_transactions(&UtxoSet::new()) {
            Some(set) => set,
            None => return Err(ChainError::InvalidBlock(String::from(
                "genesis transactions failed to apply",
            ))),
        };
        Ok(Blockchain {
            blocks: vec![genesis],
            utxo_set,
            pool: TransactionPool::new(),
        })
    }

    pub fn latest_block(&self) -> &Block {
        // The constructor guarantees at least the genesis block.
        self.blocks.last().unwrap()
    }

    pub fn blocks(&self) -> &[Block] {
        self.blocks.as_slice()
    }

    /// An owned copy of the chain, for broadcast payloads.
    pub fn clone_chain(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    pub fn height(&self) -> usize {
        self.blocks.len()
    }

    pub fn utxo_set(&self) -> &UtxoSet {
        &self.utxo_set
    }

    pub fn get_balance(&self, address: &str) -> u64 {
        self.utxo_set.balance_of(address)
    }

    pub fn pooled_transactions(&self) -> Vec<Transaction> {
        self.pool.snapshot()
    }

    pub fn add_to_pool(&mut self, tx: Transaction) -> bool {
        self.pool.add(tx, &self.utxo_set)
    }

    /// Build, sign and pool a transfer from this wallet. Errors if the funds
    /// are not there or the pool rejects the transaction (a pooled conflict
    /// on the same inputs).
    pub fn send_transaction(
        &mut self,
        wallet: &Wallet,
        recipient: &str,
        amount: u64,
    ) -> Result<Transaction> {
        let tx = Transaction::new_transaction(wallet, recipient, amount, &self.utxo_set, &self.pool)?;
        if !self.pool.add(tx.clone(), &self.utxo_set) {
            return Err(ChainError::Transaction(format!(
                "pool rejected transaction {}",
                tx.get_id()
            )));
        }
        Ok(tx)
    }

    pub fn next_difficulty(&self) -> u32 {
        DifficultyAdjustment::next_difficulty(&self.blocks)
    }

    /// An unsealed candidate extending the current tip: a fresh coinbase to
    /// `reward_address` followed by the pool snapshot. The caller runs the
    /// nonce search and feeds the sealed block back through `accept_block`.
    pub fn candidate_block(&self, reward_address: &str) -> Result<Block> {
        let latest = self.latest_block();
        let coinbase = Transaction::new_coinbase(reward_address, latest.get_index() + 1);
        let mut transactions = vec![coinbase];
        transactions.extend(self.pool.snapshot());
        self.candidate_block_raw(transactions)
    }

    /// An unsealed candidate carrying an explicit transaction list, coinbase
    /// included. Used directly only by callers that assemble their own block
    /// data.
    pub fn candidate_block_raw(&self, transactions: Vec<Transaction>) -> Result<Block> {
        let latest = self.latest_block();
        Ok(Block::new(
            latest.get_index() + 1,
            current_timestamp()?,
            latest.get_hash().to_string(),
            transactions,
            self.next_difficulty(),
        ))
    }

    /// Append a sealed block if it is a valid successor of the current tip
    /// and its transactions apply cleanly. On false no state has changed.
    pub fn accept_block(&mut self, block: Block) -> bool {
        if !block.is_valid_successor(self.latest_block()) {
            log::warn!("Rejected block #{}: not a valid successor", block.get_index());
            return false;
        }
        let new_utxo_set = match block.process_transactions(&self.utxo_set) {
            Some(set) => set,
            None => {
                log::warn!("Rejected block #{}: invalid transactions", block.get_index());
                return false;
            }
        };
        log::info!("Accepted block #{} ({})", block.get_index(), block.get_hash());
        self.blocks.push(block);
        self.utxo_set = new_utxo_set;
        self.pool.update(&self.utxo_set);
        true
    }

    /// Chain self-check: block 0 is a valid genesis, each block is a valid
    /// successor of its predecessor, and all transactions fold cleanly from
    /// an empty UTXO set. Returns the final set on success.
    pub fn validate_chain(chain: &[Block]) -> Option<UtxoSet> {
        let genesis = chain.first()?;
        if !genesis.is_valid_genesis() {
            log::warn!("Candidate chain has an invalid genesis block");
            return None;
        }
        let mut utxo_set = genesis.process_transactions(&UtxoSet::new())?;
        for window in chain.windows(2) {
            let (prev, block) = (&window[0], &window[1]);
            if !block.is_valid_successor(prev) {
                log::warn!("Candidate chain breaks at block #{}", block.get_index());
                return None;
            }
            utxo_set = block.process_transactions(&utxo_set)?;
        }
        Some(utxo_set)
    }

    pub fn is_valid_chain(chain: &[Block]) -> bool {
        Self::validate_chain(chain).is_some()
    }

    pub fn accumulated_difficulty(&self) -> BigUint {
        accumulated_difficulty(&self.blocks)
    }

    /// Fork choice: adopt the candidate chain wholesale if it validates and
    /// carries strictly more accumulated difficulty than the local chain.
    /// The one exception is genesis convergence: a single foreign genesis
    /// block may replace a local chain that is still only its own genesis,
    /// despite the difficulty tie.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> bool {
        let new_utxo_set = match Self::validate_chain(&candidate) {
            Some(set) => set,
            None => {
                log::warn!("Rejected candidate chain: validation failed");
                return false;
            }
        };

        let genesis_convergence = candidate.len() == 1
            && candidate[0].get_index() == 0
            && self.blocks.len() == 1;
        if !genesis_convergence
            && accumulated_difficulty(&candidate) <= self.accumulated_difficulty()
        {
            log::info!("Rejected candidate chain: no more accumulated difficulty than ours");
            return false;
        }

        log::info!(
            "Replacing chain of height {} with candidate of height {}",
            self.blocks.len(),
            candidate.len()
        );
        self.blocks = candidate;
        self.utxo_set = new_utxo_set;
        self.pool.update(&self.utxo_set);
        true
    }
}

/// The fork-choice metric: sum of 2^difficulty over the chain's blocks.
/// Difficulty is an exponent, so each extra leading zero doubles the assumed
/// work.
pub fn accumulated_difficulty(chain: &[Block]) -> BigUint {
    chain
        .iter()
        .map(|block| BigUint::from(1_u8) << block.get_difficulty())
        .sum()
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            writeln!(f, "{block}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::COINBASE_AMOUNT;
    use crate::testnet::test_utils::{mine_block_on, test_wallet};

    #[test]
    fn test_mined_block_is_accepted_once() {
        let wallet = test_wallet();
        let mut chain = Blockchain::new(&wallet.address(), 1).unwrap();
        let block = mine_block_on(&chain, &wallet.address());

        assert!(chain.accept_block(block.clone()));
        assert_eq!(chain.height(), 2);
        // Re-accepting the same block is a harmless rejection.
        assert!(!chain.accept_block(block));
        assert_eq!(chain.height(), 2);
    }

    #[test]
    fn test_accepted_coinbase_lands_in_utxo_set() {
        // A fresh node accepting a mined block ends up with exactly one new
        // UTXO holding the coinbase reward.
        let wallet = test_wallet();
        let mut chain = Blockchain::new(&wallet.address(), 2).unwrap();
        let block = mine_block_on(&chain, &wallet.address());

        assert!(chain.accept_block(block));
        assert_eq!(chain.get_balance(&wallet.address()), 2 * COINBASE_AMOUNT);
        assert_eq!(chain.utxo_set().len(), 2);
    }

    #[test]
    fn test_send_transaction_pools_and_mines() {
        let wallet = test_wallet();
        let mut chain = Blockchain::new(&wallet.address(), 1).unwrap();

        let tx = chain.send_transaction(&wallet, "B1", 30).unwrap();
        assert_eq!(chain.pooled_transactions().len(), 1);
        let amounts: Vec<u64> = tx.get_tx_outs().iter().map(|o| o.get_amount()).collect();
        assert_eq!(amounts, vec![30, 20]);

        let block = mine_block_on(&chain, &wallet.address());
        assert!(chain.accept_block(block));

        // The spend left the pool, the original 50 entry is gone and the
        // split lives in the set.
        assert!(chain.pooled_transactions().is_empty());
        assert_eq!(chain.get_balance("B1"), 30);
        assert_eq!(
            chain.get_balance(&wallet.address()),
            20 + COINBASE_AMOUNT
        );
    }

    #[test]
    fn test_double_spend_cannot_be_pooled_twice() {
        let wallet = test_wallet();
        let mut chain = Blockchain::new(&wallet.address(), 1).unwrap();

        chain.send_transaction(&wallet, "B1", 30).unwrap();
        // The genesis coinbase is the only UTXO and is already committed.
        assert!(chain.send_transaction(&wallet, "B2", 30).is_err());
    }

    #[test]
    fn test_foreign_genesis_replaces_unextended_chain() {
        let ours = test_wallet();
        let theirs = test_wallet();
        let mut chain = Blockchain::new(&ours.address(), 2).unwrap();
        let foreign = Blockchain::new(&theirs.address(), 2).unwrap();

        let foreign_genesis = foreign.latest_block().clone();
        assert!(chain.replace_chain(vec![foreign_genesis.clone()]));
        assert_eq!(chain.latest_block().get_hash(), foreign_genesis.get_hash());
        assert_eq!(chain.get_balance(&theirs.address()), COINBASE_AMOUNT);
        assert_eq!(chain.get_balance(&ours.address()), 0);
    }

    #[test]
    fn test_foreign_genesis_cannot_displace_extended_chain() {
        let ours = test_wallet();
        let theirs = test_wallet();
        let mut chain = Blockchain::new(&ours.address(), 1).unwrap();
        let block = mine_block_on(&chain, &ours.address());
        assert!(chain.accept_block(block));

        let foreign = Blockchain::new(&theirs.address(), 1).unwrap();
        assert!(!chain.replace_chain(vec![foreign.latest_block().clone()]));
        assert_eq!(chain.height(), 2);
    }

    #[test]
    fn test_fork_choice_prefers_more_accumulated_difficulty() {
        let wallet = test_wallet();
        let mut ours = Blockchain::new(&wallet.address(), 1).unwrap();

        // A fork of our own chain that grows two blocks while we grow one.
        let mut fork = Blockchain {
            blocks: ours.clone_chain(),
            utxo_set: ours.utxo_set().clone(),
            pool: TransactionPool::new(),
        };
        let block = mine_block_on(&fork, &wallet.address());
        assert!(fork.accept_block(block));
        let block = mine_block_on(&fork, &wallet.address());
        assert!(fork.accept_block(block));

        let block = mine_block_on(&ours, &wallet.address());
        assert!(ours.accept_block(block));

        // A candidate with equal accumulated difficulty is a tie and must
        // not replace.
        assert!(!ours.replace_chain(ours.clone_chain()));
        // The shorter chain is rejected outright.
        assert!(!fork.replace_chain(ours.clone_chain()));

        assert!(ours.replace_chain(fork.clone_chain()));
        assert_eq!(ours.height(), 3);
    }

    #[test]
    fn test_chain_conserves_value() {
        let wallet = test_wallet();
        let mut chain = Blockchain::new(&wallet.address(), 1).unwrap();
        chain.send_transaction(&wallet, "B1", 12).unwrap();
        let block = mine_block_on(&chain, &wallet.address());
        assert!(chain.accept_block(block));

        let final_set = Blockchain::validate_chain(chain.blocks()).unwrap();
        // Total value equals the sum of coinbase rewards, one per block.
        assert_eq!(
            final_set.total_value(),
            chain.height() as u64 * COINBASE_AMOUNT
        );
    }

    #[test]
    fn test_tampered_chain_fails_validation() {
        let wallet = test_wallet();
        let mut chain = Blockchain::new(&wallet.address(), 1).unwrap();
        let block = mine_block_on(&chain, &wallet.address());
        assert!(chain.accept_block(block));

        let mut forged = chain.clone_chain();
        let coinbase = Transaction::new_coinbase("thief", 1);
        let replacement = Block::new(
            1,
            forged[1].get_timestamp(),
            forged[0].get_hash().to_string(),
            vec![coinbase],
            1,
        );
        forged[1] = replacement;

        assert!(!Blockchain::is_valid_chain(&forged));
    }
}
