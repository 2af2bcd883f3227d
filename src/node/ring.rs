//! Ring membership and partitioning
//!
//! A key belongs to the peer with the smallest id greater than or equal to
//! it, wrapping around to the smallest id overall. The key is replicated on
//! that owner and the next N-1 peers clockwise. Every node holding the same
//! membership view computes the same preference list.

use crate::node::item::{Key, NodeId, Peer};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound::{Excluded, Unbounded};

#[derive(Debug, Default, Clone)]
pub struct Ring {
    peers: BTreeMap<NodeId, Peer>,
}

impl Ring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `peer.id`.
    pub fn add_peer(&mut self, peer: Peer) {
        self.peers.insert(peer.id, peer);
    }

    pub fn add_peers(&mut self, peers: impl IntoIterator<Item = Peer>) {
        for peer in peers {
            self.add_peer(peer);
        }
    }

    /// Returns whether an entry existed.
    pub fn remove_peer(&mut self, id: NodeId) -> bool {
        self.peers.remove(&id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.peers.contains_key(&id)
    }

    /// Walk the ring clockwise starting at `key` (inclusive).
    fn clockwise_from(&self, key: Key) -> impl Iterator<Item = &Peer> {
        self.peers
            .range(key..)
            .chain(self.peers.range(..key))
            .map(|(_, peer)| peer)
    }

    /// Walk the ring clockwise starting right after `id`.
    fn clockwise_after(&self, id: NodeId) -> impl Iterator<Item = &Peer> {
        self.peers
            .range((Excluded(id), Unbounded))
            .chain(self.peers.range(..id))
            .map(|(_, peer)| peer)
    }

    /// The preference list for `key`: its owner followed by the next peers
    /// clockwise, at most `n` of them.
    pub fn replicas_for_key(&self, n: usize, key: Key) -> Vec<Peer> {
        self.clockwise_from(key).take(n).cloned().collect()
    }

    /// Whether `id` is in the preference list of `key`.
    pub fn is_replica_for(&self, n: usize, key: Key, id: NodeId) -> bool {
        self.clockwise_from(key).take(n).any(|peer| peer.id == id)
    }

    /// Immediate clockwise successor of `id`. A single-member ring is its own
    /// successor.
    pub fn next_peer(&self, id: NodeId) -> Option<&Peer> {
        self.clockwise_after(id)
            .next()
            .or_else(|| self.peers.get(&id))
    }

    /// Whether `self_id` is one of the `n` clockwise successors of
    /// `departing_id`. The departing id itself is never counted.
    pub fn self_is_among_next_n_clockwise(
        &self,
        departing_id: NodeId,
        n: usize,
        self_id: NodeId,
    ) -> bool {
        self.clockwise_after(departing_id)
            .take(n)
            .any(|peer| peer.id == self_id)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.peers.keys().copied().collect()
    }

    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }
}

impl fmt::Display for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ring ({} peers):", self.peers.len())?;
        for peer in self.peers.values() {
            writeln!(f, "  {}", peer)?;
        }
        Ok(())
    }
}
