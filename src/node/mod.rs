//! Storage node
//!
//! Everything a ring member owns: its view of the ring, the items it
//! replicates and the coordinator for client operations it accepted.

pub mod coordinator;
pub mod item;
pub mod membership;
pub mod messages;
pub mod ring;
pub mod server;
pub mod storage;

pub use coordinator::{Decision, OperationKind, QuorumCoordinator};
pub use item::{Item, Key, NodeId, Peer, Version};
pub use messages::{ClientReply, Envelope, Message, NodeStatus, Operation};
pub use ring::Ring;
pub use server::{Flow, Node};
pub use storage::Storage;
