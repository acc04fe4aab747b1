//! Peer synchronization: message types, the peer registry transport, and
//! the per-node event loop.

pub mod message;
pub mod node;
pub mod registry;

pub use message::{Message, MessagePayload, NodeId};
pub use node::Node;
pub use registry::{NodeEvent, PeerRegistry};
