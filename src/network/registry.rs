use crate::core::Block;
use crate::error::{ChainError, Result};
use crate::network::{Message, NodeId};
use std::sync::mpsc::Sender;
use std::sync::RwLock;

/// What lands in a node's inbound event queue. Peer messages arrive as raw
/// bytes so each node reconstructs its own copies; a mined block comes back
/// from the node's own worker thread and never crosses node boundaries.
#[derive(Debug)]
pub enum NodeEvent {
    Peer(Vec<u8>),
    Mined(Block),
}

/// The transport between nodes: a table of inbound event queues, indexed by
/// `NodeId`. Delivery is serialize-then-send, so no block, transaction or
/// chain is ever shared between two nodes' states.
#[derive(Default)]
pub struct PeerRegistry {
    inboxes: RwLock<Vec<Sender<NodeEvent>>>,
}

impl PeerRegistry {
    pub fn new() -> PeerRegistry {
        PeerRegistry::default()
    }

    /// Register a node's inbound queue and hand back its identity.
    pub fn register(&self, inbox: Sender<NodeEvent>) -> NodeId {
        let mut inboxes = self
            .inboxes
            .write()
            .expect("Failed to acquire write lock on inboxes - this should never happen");
        inboxes.push(inbox);
        NodeId(inboxes.len() - 1)
    }

    /// Deliver a message to one peer. A peer whose queue is gone (receiver
    /// dropped) is a send error; the caller decides whether that matters.
    pub fn send(&self, to: NodeId, message: &Message) -> Result<()> {
        let bytes = message.serialize()?;
        let inboxes = self
            .inboxes
            .read()
            .expect("Failed to acquire read lock on inboxes - this should never happen");
        let inbox = inboxes
            .get(to.0)
            .ok_or_else(|| ChainError::Network(format!("Unknown peer {to}")))?;
        inbox
            .send(NodeEvent::Peer(bytes))
            .map_err(|_| ChainError::Network(format!("Peer {to} is gone")))
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        let inboxes = self
            .inboxes
            .read()
            .expect("Failed to acquire read lock on inboxes - this should never happen");
        (0..inboxes.len()).map(NodeId).collect()
    }

    pub fn len(&self) -> usize {
        self.inboxes
            .read()
            .expect("Failed to acquire read lock on inboxes - this should never happen")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.inboxes
            .read()
            .expect("Failed to acquire read lock on inboxes - this should never happen")
            .is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MessagePayload;
    use std::sync::mpsc;

    #[test]
    fn test_register_assigns_sequential_ids() {
        let registry = PeerRegistry::new();
        let (tx_a, _rx_a) = mpsc::channel();
        let (tx_b, _rx_b) = mpsc::channel();

        assert_eq!(registry.register(tx_a), NodeId(0));
        assert_eq!(registry.register(tx_b), NodeId(1));
        assert_eq!(registry.node_ids(), vec![NodeId(0), NodeId(1)]);
    }

    #[test]
    fn test_send_delivers_bytes() {
        let registry = PeerRegistry::new();
        let (tx, rx) = mpsc::channel();
        let id = registry.register(tx);

        let message = Message::new(NodeId(9), MessagePayload::QueryLatest);
        registry.send(id, &message).unwrap();

        let NodeEvent::Peer(bytes) = rx.recv().unwrap() else {
            panic!("expected a peer event");
        };
        let decoded = Message::deserialize(&bytes).unwrap();
        assert_eq!(decoded.sender, NodeId(9));
    }

    #[test]
    fn test_send_to_unknown_peer_errors() {
        let registry = PeerRegistry::new();
        let message = Message::new(NodeId(0), MessagePayload::QueryAll);
        assert!(registry.send(NodeId(3), &message).is_err());
    }
}
