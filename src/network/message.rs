use crate::core::{Block, Transaction};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a node inside the peer registry. Assigned at registration,
/// never reused within a registry's lifetime.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// One peer-to-peer message: the sender's identity plus a payload. Queries
/// carry no data; responses carry blocks or transactions by value, so the
/// receiver never aliases the sender's state.
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Message {
    pub sender: NodeId,
    pub payload: MessagePayload,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum MessagePayload {
    /// Ask a peer for its newest block.
    QueryLatest,
    /// Ask a peer for its full chain.
    QueryAll,
    /// One or more blocks: a single freshly mined tip, or a whole chain.
    ResponseBlockchain(Vec<Block>),
    /// Ask a peer for its mempool.
    QueryTransactionPool,
    /// A mempool snapshot.
    ResponseTransactionPool(Vec<Transaction>),
}

impl Message {
    pub fn new(sender: NodeId, payload: MessagePayload) -> Message {
        Message { sender, payload }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        crate::utils::serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Message> {
        crate::utils::deserialize(bytes)
    }
}
