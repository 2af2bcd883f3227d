//! Plain records shared by storage, ring and the wire protocol.

use crate::transport::Locator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in the integer keyspace.
pub type Key = u64;

/// Ring position of a node; shares the keyspace with [`Key`].
pub type NodeId = u64;

/// Per-key version counter, starting at 1 for the first write.
pub type Version = u64;

/// A stored data item. Replaced, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    pub key: Key,
    pub value: String,
    pub version: Version,
}

impl Item {
    pub fn new(key: Key, value: impl Into<String>, version: Version) -> Self {
        Self {
            key,
            value: value.into(),
            version,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}@v{}", self.key, self.value, self.version)
    }
}

/// A ring member: its position and where to reach it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Peer {
    pub id: NodeId,
    pub locator: Locator,
}

impl Peer {
    pub fn new(id: NodeId, locator: impl Into<Locator>) -> Self {
        Self {
            id,
            locator: locator.into(),
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.locator)
    }
}
