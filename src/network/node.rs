use crate::core::{Block, Blockchain, ProofOfWork, Transaction};
use crate::error::Result;
use crate::network::{Message, MessagePayload, NodeEvent, NodeId, PeerRegistry};
use crate::wallet::Wallet;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// An in-flight nonce search on a worker thread.
struct MiningTask {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// One network participant: a wallet, a privately owned blockchain, and an
/// inbound event queue. All chain/UTXO/pool mutation happens on the thread
/// that drains the queue, so no locks guard the blockchain itself; the
/// mining worker only ever hands a sealed block back through the same queue.
pub struct Node {
    id: NodeId,
    wallet: Wallet,
    blockchain: Blockchain,
    peers: Vec<NodeId>,
    registry: Arc<PeerRegistry>,
    events_tx: Sender<NodeEvent>,
    events_rx: Receiver<NodeEvent>,
    miner: Option<MiningTask>,
}

impl Node {
    /// A node with a fresh wallet and its own genesis block, registered with
    /// the peer registry. It starts with no peers; they are added explicitly
    /// or learned from inbound messages.
    pub fn new(registry: Arc<PeerRegistry>, difficulty: u32) -> Result<Node> {
        let wallet = Wallet::new()?;
        let blockchain = Blockchain::new(&wallet.address(), difficulty)?;
        let (events_tx, events_rx) = mpsc::channel();
        let id = registry.register(events_tx.clone());
        info!("{id} online with genesis {}", blockchain.latest_block().get_hash());
        Ok(Node {
            id,
            wallet,
            blockchain,
            peers: vec![],
            registry,
            events_tx,
            events_rx,
            miner: None,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn address(&self) -> String {
        self.wallet.address()
    }

    pub fn balance(&self) -> u64 {
        self.blockchain.get_balance(&self.wallet.address())
    }

    pub fn blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn add_peer(&mut self, peer: NodeId) {
        if peer != self.id && !self.peers.contains(&peer) {
            self.peers.push(peer);
        }
    }

    pub fn peers(&self) -> &[NodeId] {
        self.peers.as_slice()
    }

    /// Startup synchronization: ask every known peer for its newest block
    /// and its mempool.
    pub fn start_sync(&self) {
        for peer in &self.peers {
            self.send_to(*peer, MessagePayload::QueryLatest);
            self.send_to(*peer, MessagePayload::QueryTransactionPool);
        }
    }

    fn send_to(&self, peer: NodeId, payload: MessagePayload) {
        let message = Message::new(self.id, payload);
        if let Err(e) = self.registry.send(peer, &message) {
            warn!("{}: failed to reach {peer}: {e}", self.id);
        }
    }

    fn broadcast(&self, payload: MessagePayload) {
        for peer in &self.peers {
            self.send_to(*peer, payload.clone());
        }
    }

    /// Build, pool and announce a transfer from this node's wallet.
    pub fn send_coins(&mut self, recipient: &str, amount: u64) -> Result<Transaction> {
        let tx = self
            .blockchain
            .send_transaction(&self.wallet, recipient, amount)?;
        self.broadcast(MessagePayload::ResponseTransactionPool(
            self.blockchain.pooled_transactions(),
        ));
        Ok(tx)
    }

    /// Kick off a background nonce search over the current pool snapshot.
    /// The sealed block comes back through this node's own event queue. A
    /// second call while a search is in flight is a no-op.
    pub fn start_mining(&mut self) -> Result<()> {
        if self.miner.is_some() {
            return Ok(());
        }
        let candidate = self.blockchain.candidate_block(&self.wallet.address())?;
        info!("{}: mining block #{}", self.id, candidate.get_index());

        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        let events_tx = self.events_tx.clone();
        let handle = thread::spawn(move || {
            if let Some(block) = ProofOfWork::new(candidate).run(&worker_cancel) {
                // The receiver only disappears when the node is torn down.
                let _ = events_tx.send(NodeEvent::Mined(block));
            }
        });
        self.miner = Some(MiningTask { cancel, handle });
        Ok(())
    }

    /// Stop the in-flight nonce search, if any. The worker may still deliver
    /// a block it found before seeing the flag; that block simply fails
    /// successor validation if the chain has moved on.
    pub fn cancel_mining(&mut self) {
        if let Some(task) = self.miner.take() {
            task.cancel.store(true, Ordering::Relaxed);
            let _ = task.handle.join();
        }
    }

    pub fn is_mining(&self) -> bool {
        self.miner.is_some()
    }

    /// Mine one block synchronously: candidate, nonce search, accept,
    /// announce. Used by the simulation driver and tests.
    pub fn mine_block(&mut self) -> Result<Block> {
        let candidate = self.blockchain.candidate_block(&self.wallet.address())?;
        let sealed = ProofOfWork::new(candidate)
            .run(&AtomicBool::new(false))
            .ok_or_else(|| crate::error::ChainError::Mining(String::from(
                "nonce search cancelled",
            )))?;
        self.handle_mined(sealed.clone());
        Ok(sealed)
    }

    /// Drain every queued event. Returns how many were processed.
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            processed += 1;
        }
        processed
    }

    /// Block for the next event, up to `timeout`. Returns whether one was
    /// processed.
    pub fn process_one_blocking(&mut self, timeout: Duration) -> bool {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.handle_event(event);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn handle_event(&mut self, event: NodeEvent) {
        match event {
            NodeEvent::Peer(bytes) => match Message::deserialize(&bytes) {
                Ok(message) => self.handle_message(message),
                Err(e) => warn!("{}: dropping undecodable message: {e}", self.id),
            },
            NodeEvent::Mined(block) => self.handle_mined(block),
        }
    }

    fn handle_mined(&mut self, block: Block) {
        self.miner = None;
        if self.blockchain.accept_block(block.clone()) {
            info!("{}: mined block #{}", self.id, block.get_index());
            self.broadcast(MessagePayload::ResponseBlockchain(vec![block]));
        } else {
            // The chain moved under the worker; the candidate is stale.
            info!("{}: discarding stale mined block #{}", self.id, block.get_index());
        }
    }

    fn handle_message(&mut self, message: Message) {
        self.add_peer(message.sender);
        match message.payload {
            MessagePayload::QueryLatest => {
                let latest = self.blockchain.latest_block().clone();
                self.send_to(
                    message.sender,
                    MessagePayload::ResponseBlockchain(vec![latest]),
                );
            }
            MessagePayload::QueryAll => {
                self.send_to(
                    message.sender,
                    MessagePayload::ResponseBlockchain(self.blockchain.clone_chain()),
                );
            }
            MessagePayload::QueryTransactionPool => {
                self.send_to(
                    message.sender,
                    MessagePayload::ResponseTransactionPool(
                        self.blockchain.pooled_transactions(),
                    ),
                );
            }
            MessagePayload::ResponseBlockchain(blocks) => {
                self.handle_blockchain_response(message.sender, blocks);
            }
            MessagePayload::ResponseTransactionPool(transactions) => {
                for tx in transactions {
                    // Duplicates and conflicts are rejected by the pool; a
                    // peer re-sending its mempool is harmless.
                    self.blockchain.add_to_pool(tx);
                }
            }
        }
    }

    /// Reconciliation for received blocks. Single-block and multi-block
    /// responses follow deliberately different paths: a single non-genesis
    /// block that does not extend our tip triggers a full-history query,
    /// while a rejected multi-block chain gets no follow-up at all.
    fn handle_blockchain_response(&mut self, sender: NodeId, blocks: Vec<Block>) {
        let Some(received) = blocks.last() else {
            info!("{}: empty blockchain response from {sender}", self.id);
            return;
        };

        if blocks.len() > 1 {
            if self.blockchain.replace_chain(blocks) {
                self.cancel_mining();
            }
            return;
        }

        let latest = self.blockchain.latest_block();
        if received.get_previous_hash() == latest.get_hash()
            && received.get_index() == latest.get_index() + 1
        {
            // A direct extension of our tip beats whatever we are mining.
            self.cancel_mining();
            self.blockchain.accept_block(received.clone());
        } else if received.get_index() != 0 {
            // Out of step with the sender; pull its whole history.
            self.send_to(sender, MessagePayload::QueryAll);
        } else if self.blockchain.replace_chain(blocks) {
            // A foreign genesis: adopt it if ours is still unextended, so
            // the network converges on one canonical genesis.
            self.cancel_mining();
        }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.cancel_mining();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn paired_nodes(difficulty: u32) -> (Node, Node) {
        let registry = Arc::new(PeerRegistry::new());
        let mut a = Node::new(Arc::clone(&registry), difficulty).unwrap();
        let mut b = Node::new(Arc::clone(&registry), difficulty).unwrap();
        a.add_peer(b.id());
        b.add_peer(a.id());
        (a, b)
    }

    #[test]
    fn test_query_latest_converges_fresh_genesis() {
        let (mut a, mut b) = paired_nodes(1);

        // B asks A for its latest; A replies with its genesis; B, still
        // unextended, adopts it.
        b.start_sync();
        a.process_pending();
        b.process_pending();

        assert_eq!(
            a.blockchain().latest_block().get_hash(),
            b.blockchain().latest_block().get_hash()
        );
    }

    #[test]
    fn test_mined_block_propagates_to_peer() {
        let (mut a, mut b) = paired_nodes(1);
        b.start_sync();
        a.process_pending();
        b.process_pending();

        a.mine_block().unwrap();
        b.process_pending();

        assert_eq!(b.blockchain().height(), 2);
        assert_eq!(
            a.blockchain().latest_block().get_hash(),
            b.blockchain().latest_block().get_hash()
        );
    }

    #[test]
    fn test_lagging_peer_pulls_full_history() {
        let registry = Arc::new(PeerRegistry::new());
        let mut a = Node::new(Arc::clone(&registry), 1).unwrap();
        let mut b = Node::new(Arc::clone(&registry), 1).unwrap();

        // A mines two blocks before B ever hears from it.
        a.mine_block().unwrap();
        a.mine_block().unwrap();
        assert_eq!(a.blockchain().height(), 3);

        // B asks for A's latest. That block does not extend B's genesis, so
        // B pulls the full history and adopts it by accumulated difficulty.
        b.add_peer(a.id());
        b.start_sync();
        a.process_pending(); // answers QueryLatest, learns of B
        b.process_pending(); // tip mismatch, sends QueryAll
        a.process_pending(); // answers with the full chain
        b.process_pending(); // replaces its chain

        assert_eq!(b.blockchain().height(), 3);
        assert_eq!(
            a.blockchain().latest_block().get_hash(),
            b.blockchain().latest_block().get_hash()
        );
    }

    #[test]
    fn test_transaction_propagates_and_mines() {
        let (mut a, mut b) = paired_nodes(1);
        b.start_sync();
        a.process_pending();
        b.process_pending();

        let recipient = b.address();
        a.send_coins(&recipient, 30).unwrap();
        b.process_pending();
        assert_eq!(b.blockchain().pooled_transactions().len(), 1);

        // B mines the pooled transfer; A hears the block.
        b.mine_block().unwrap();
        a.process_pending();

        assert_eq!(a.blockchain().get_balance(&recipient), 30 + 50);
        assert!(a.blockchain().pooled_transactions().is_empty());
    }

    #[test]
    fn test_background_mining_delivers_through_queue() {
        let registry = Arc::new(PeerRegistry::new());
        let mut node = Node::new(registry, 1).unwrap();

        node.start_mining().unwrap();
        assert!(node.is_mining());
        assert!(node.process_one_blocking(Duration::from_secs(30)));

        assert_eq!(node.blockchain().height(), 2);
        assert!(!node.is_mining());
    }

    #[test]
    fn test_cancel_discards_candidate_without_corruption() {
        let registry = Arc::new(PeerRegistry::new());
        let mut node = Node::new(registry, 60).unwrap();

        // Difficulty 60 will not be solved; cancellation must stop the
        // worker and leave the chain untouched.
        node.start_mining().unwrap();
        node.cancel_mining();

        assert!(!node.is_mining());
        assert_eq!(node.blockchain().height(), 1);
    }
}
