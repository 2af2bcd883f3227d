//! # dynakv
//!
//! A Dynamo-style replicated key-value store:
//! - Consistent hashing over integer keys, N clockwise replicas per key
//! - Tunable quorums (R for reads, max(R, W) for writes) with versioned items
//! - Join with handoff from the successor, graceful leave with item forwarding
//! - Message passing only: every node is a single task draining a mailbox
//!
//! ## Architecture

#![allow(clippy::result_large_err)]
//!
//! ```text
//!            client
//!              │ ClientRead / ClientWrite
//!              ▼
//!   ┌──────────────────────┐   ReplicaRead / ReplicaUpdate
//!   │ Node 10 (coordinator)│──────────────┬───────────────┐
//!   └──────────────────────┘              │               │
//!              ▲                          ▼               ▼
//!              │ ReplicaReadReply  ┌────────────┐   ┌────────────┐
//!              └───────────────────│  Node 20   │   │  Node 0    │
//!                                  └────────────┘   └────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a ring
//! ```bash
//! dynakv-node start --id 0
//! dynakv-node join --id 10 --contact 127.0.0.1:10000
//! dynakv-node join --id 20 --contact 127.0.0.1:10000
//! ```
//!
//! ### Use the CLI
//! ```bash
//! dynakv --node 127.0.0.1:10010 put 5 hello
//! dynakv --node 127.0.0.1:10020 get 5
//! dynakv --node 127.0.0.1:10020 status --json
//! dynakv --node 127.0.0.1:10020 leave
//! ```

pub mod client;
pub mod common;
pub mod node;
pub mod transport;

// Re-export commonly used types
pub use client::Client;
pub use common::{Config, Error, NodeSettings, ReplicationConfig, Result};
pub use node::{ClientReply, Item, Message, Node, NodeStatus, Peer};
pub use transport::{Locator, Mailbox, MemoryNetwork, TcpTransport, Transport};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
