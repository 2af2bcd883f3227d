//! Ring membership: join, handoff and graceful leave
//!
//! Membership changes are announced by broadcast and applied locally by
//! each receiver. A node only ever keeps the items it replicates under its
//! current view of the ring; whenever that view grows, items that moved to
//! someone else are released.

use crate::common::{Error, Result};
use crate::node::item::{Item, NodeId, Peer};
use crate::node::messages::{ClientReply, Message};
use crate::node::server::Node;
use crate::transport::{Locator, Transport};
use tokio::time::{timeout_at, Instant};

impl<T: Transport> Node<T> {
    /// Send `message` to `to` and wait for the first reply `accept` matches.
    /// Everything else arriving meanwhile is kept for the dispatch loop.
    async fn ask<F>(&mut self, to: &Locator, message: Message, accept: F) -> Result<Message>
    where
        F: Fn(&Message) -> bool,
    {
        let deadline = Instant::now() + self.settings.bootstrap_timeout;
        let kind = message.kind();
        self.send(to, message);

        loop {
            match timeout_at(deadline, self.mailbox.recv()).await {
                Ok(Some(envelope)) if accept(&envelope.message) => return Ok(envelope.message),
                Ok(Some(envelope)) => {
                    tracing::debug!(
                        "Node {} deferring {} while waiting on {}",
                        self.id,
                        envelope.message.kind(),
                        to
                    );
                    self.backlog.push_back(envelope);
                }
                Ok(None) => return Err(Error::MailboxClosed),
                Err(_) => {
                    return Err(Error::Timeout(format!(
                        "no answer to {} from {}",
                        kind, to
                    )))
                }
            }
        }
    }

    /// Enter the ring through `contact`.
    pub(crate) async fn join(&mut self, contact: Locator) -> Result<()> {
        tracing::info!("Node {} joining through {}", self.id, contact);

        let request = Message::PeersList {
            is_request: true,
            peers: Vec::new(),
        };
        let reply = self
            .ask(&contact, request, |m| {
                matches!(m, Message::PeersList { is_request: false, .. })
            })
            .await?;
        match reply {
            Message::PeersList { peers, .. } => self.ring.add_peers(peers),
            other => return Err(Error::UnexpectedReply(other.kind().to_string())),
        }
        // Our own entry wins over whatever the contact knew about this id
        self.ring.add_peer(Peer::new(self.id, self.locator.clone()));

        self.request_handoff().await;

        let hello = Message::HelloMates {
            id: self.id,
            locator: self.locator.clone(),
        };
        for peer in self.other_peers() {
            self.send(&peer.locator, hello.clone());
        }

        tracing::info!(
            "Node {} joined a ring of {} peers holding {} items",
            self.id,
            self.ring.peer_count(),
            self.storage.len()
        );
        Ok(())
    }

    /// Ask the clockwise successor for the items this node now replicates.
    async fn request_handoff(&mut self) {
        let successor = match self.ring.next_peer(self.id) {
            Some(peer) if peer.id != self.id => peer.clone(),
            _ => return,
        };

        let request = Message::RequestInitItems {
            is_request: true,
            requester_id: self.id,
            requester_locator: self.locator.clone(),
            items: self.storage.items(),
        };
        let reply = self
            .ask(&successor.locator, request, |m| {
                matches!(m, Message::RequestInitItems { is_request: false, .. })
            })
            .await;

        match reply {
            Ok(Message::RequestInitItems { items, .. }) => {
                tracing::info!(
                    "Node {} received {} items from node {}",
                    self.id,
                    items.len(),
                    successor.id
                );
                self.storage.acquire_responsibility_of(items);
            }
            Ok(other) => {
                tracing::warn!("Node {} got {} instead of a handoff", self.id, other.kind());
            }
            Err(e) => {
                tracing::warn!(
                    "Node {} continuing without handoff from node {}: {}",
                    self.id,
                    successor.id,
                    e
                );
            }
        }
    }

    pub(crate) fn on_handoff_request(
        &mut self,
        requester_id: NodeId,
        requester_locator: Locator,
        known: Vec<Item>,
    ) {
        self.ring
            .add_peer(Peer::new(requester_id, requester_locator.clone()));

        let n = self.settings.replication.n;
        let items: Vec<Item> = self
            .storage
            .retrieve_all(&known)
            .into_iter()
            .filter(|item| self.ring.is_replica_for(n, item.key, requester_id))
            .collect();

        tracing::info!(
            "Node {} handing {} items to node {}",
            self.id,
            items.len(),
            requester_id
        );
        self.send(
            &requester_locator,
            Message::RequestInitItems {
                is_request: false,
                requester_id,
                requester_locator: requester_locator.clone(),
                items,
            },
        );

        self.release_foreign_items();
    }

    pub(crate) fn on_hello_mates(&mut self, id: NodeId, locator: Locator) {
        if id == self.id {
            return;
        }
        tracing::info!("Node {} welcomes node {} ({})", self.id, id, locator);
        self.ring.add_peer(Peer::new(id, locator));
        self.release_foreign_items();
    }

    /// Drop every item this node is no longer a replica for.
    fn release_foreign_items(&mut self) {
        let n = self.settings.replication.n;
        let foreign: Vec<Item> = self
            .storage
            .items()
            .into_iter()
            .filter(|item| !self.ring.is_replica_for(n, item.key, self.id))
            .collect();

        if !foreign.is_empty() {
            tracing::debug!("Node {} releasing {} items", self.id, foreign.len());
            self.storage.lose_responsibility_of(&foreign);
        }
    }

    /// Leave the ring, forwarding every item to the remaining members.
    pub(crate) fn leave(&mut self, requester: Locator) {
        if let Some(client) = self.coordinator.abort() {
            self.send(&client, ClientReply::Failure.into());
        }

        let bye = Message::ByeMates {
            id: self.id,
            items: self.storage.items(),
        };
        for peer in self.other_peers() {
            self.send(&peer.locator, bye.clone());
        }

        if requester != self.locator {
            self.send(&requester, ClientReply::Success.into());
        }
        tracing::info!("Node {} left the ring", self.id);
    }

    pub(crate) fn on_bye_mates(&mut self, id: NodeId, items: Vec<Item>) {
        if id == self.id || !self.ring.remove_peer(id) {
            tracing::warn!("Node {} ignoring goodbye: {}", self.id, Error::UnknownPeer(id));
            return;
        }
        tracing::info!("Node {} saw node {} leave", self.id, id);

        let n = self.settings.replication.n;
        if !self.ring.self_is_among_next_n_clockwise(id, n, self.id) {
            return;
        }

        let self_id = self.id;
        let ring = &self.ring;
        let changed = self.storage.merge(
            items
                .into_iter()
                .filter(|item| ring.is_replica_for(n, item.key, self_id)),
        );
        tracing::debug!("Node {} took over {} items from node {}", self.id, changed, id);
    }
}
