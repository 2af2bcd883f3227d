//! Wire protocol between nodes and clients
//!
//! Every message a node can receive is a variant of [`Message`]; the
//! dispatch loop matches on it exhaustively.

use crate::node::item::{Item, Key, NodeId, Peer, Version};
use crate::transport::Locator;
use serde::{Deserialize, Serialize};

/// A message together with the locator replies should go to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: Locator,
    pub message: Message,
}

impl Envelope {
    pub fn new(from: impl Into<Locator>, message: Message) -> Self {
        Self {
            from: from.into(),
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Self-directed: join the ring through `contact`.
    StartJoin { contact: Locator },

    /// Membership discovery request (`is_request`) and its answer.
    PeersList { is_request: bool, peers: Vec<Peer> },

    /// A new member announces itself.
    HelloMates { id: NodeId, locator: Locator },

    /// A member leaves, forwarding its whole storage.
    ByeMates { id: NodeId, items: Vec<Item> },

    /// Handoff request from a joining node to its successor, and the answer.
    RequestInitItems {
        is_request: bool,
        requester_id: NodeId,
        requester_locator: Locator,
        items: Vec<Item>,
    },

    /// Client and replica traffic for reads and writes.
    Operation(Operation),

    /// Self-directed: the quorum timer of `request_id` fired.
    Timeout { request_id: u64 },

    /// Ask a node to leave the ring gracefully.
    Leave,

    /// Diagnostic snapshot request (`is_request`) and its answer.
    Status {
        is_request: bool,
        snapshot: Option<NodeStatus>,
    },
}

impl Message {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::StartJoin { .. } => "StartJoin",
            Message::PeersList { .. } => "PeersList",
            Message::HelloMates { .. } => "HelloMates",
            Message::ByeMates { .. } => "ByeMates",
            Message::RequestInitItems { .. } => "RequestInitItems",
            Message::Operation(op) => op.kind(),
            Message::Timeout { .. } => "Timeout",
            Message::Leave => "Leave",
            Message::Status { .. } => "Status",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Client asks the receiving node to coordinate a read.
    ClientRead { key: Key },
    /// Client asks the receiving node to coordinate a write.
    ClientWrite { key: Key, value: String },
    /// Coordinator's answer to the client.
    ClientReply(ClientReply),
    /// Coordinator asks a replica for its copy of `key`.
    ReplicaRead { request_id: u64, key: Key },
    /// Replica's copy of `key`; `None` when it does not hold the key.
    ReplicaReadReply {
        request_id: u64,
        key: Key,
        item: Option<Item>,
    },
    /// Coordinator tells a replica to overwrite `key`.
    ReplicaUpdate {
        key: Key,
        value: String,
        version: Version,
    },
}

impl Operation {
    pub fn is_client(&self) -> bool {
        matches!(
            self,
            Operation::ClientRead { .. } | Operation::ClientWrite { .. } | Operation::ClientReply(_)
        )
    }

    pub fn is_request(&self) -> bool {
        !matches!(
            self,
            Operation::ClientReply(_) | Operation::ReplicaReadReply { .. }
        )
    }

    pub fn is_read(&self) -> bool {
        !matches!(
            self,
            Operation::ClientWrite { .. } | Operation::ReplicaUpdate { .. }
        )
    }

    fn kind(&self) -> &'static str {
        match self {
            Operation::ClientRead { .. } => "ClientRead",
            Operation::ClientWrite { .. } => "ClientWrite",
            Operation::ClientReply(_) => "ClientReply",
            Operation::ReplicaRead { .. } => "ReplicaRead",
            Operation::ReplicaReadReply { .. } => "ReplicaReadReply",
            Operation::ReplicaUpdate { .. } => "ReplicaUpdate",
        }
    }
}

/// Outcome of a client operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientReply {
    /// Write accepted by a quorum.
    Success,
    /// No quorum within the timeout.
    Failure,
    /// The node is already coordinating another operation.
    Busy,
    /// Latest value seen by the read quorum.
    Value(Item),
    /// No replica in the read quorum holds the key.
    NotFound { key: Key },
}

impl From<ClientReply> for Message {
    fn from(reply: ClientReply) -> Self {
        Message::Operation(Operation::ClientReply(reply))
    }
}

impl From<Operation> for Message {
    fn from(op: Operation) -> Self {
        Message::Operation(op)
    }
}

/// Diagnostic view of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub id: NodeId,
    pub locator: Locator,
    pub ring: Vec<NodeId>,
    pub items: Vec<Item>,
    pub busy: bool,
}
