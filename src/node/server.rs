//! Node dispatch loop
//!
//! A node is a single task draining its mailbox. Ring, storage and the
//! quorum coordinator are plain fields; every handler runs to completion
//! before the next envelope is taken.

use crate::common::{Error, NodeSettings, Result};
use crate::node::coordinator::{Decision, OperationKind, QuorumCoordinator};
use crate::node::item::{Key, NodeId, Peer};
use crate::node::messages::{ClientReply, Envelope, Message, NodeStatus, Operation};
use crate::node::ring::Ring;
use crate::node::storage::Storage;
use crate::transport::{Locator, Mailbox, Transport};
use std::collections::VecDeque;
use tokio::task::AbortHandle;

/// What the dispatch loop does after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

pub struct Node<T: Transport> {
    pub(crate) id: NodeId,
    pub(crate) locator: Locator,
    pub(crate) settings: NodeSettings,
    pub(crate) ring: Ring,
    pub(crate) storage: Storage,
    pub(crate) coordinator: QuorumCoordinator,
    pub(crate) transport: T,
    pub(crate) mailbox: Mailbox,
    /// Envelopes set aside while waiting for a bootstrap reply.
    pub(crate) backlog: VecDeque<Envelope>,
}

impl<T: Transport> Node<T> {
    /// Create a node whose ring initially holds only itself.
    pub fn new(
        id: NodeId,
        locator: impl Into<Locator>,
        settings: NodeSettings,
        transport: T,
        mailbox: Mailbox,
    ) -> Self {
        let locator = locator.into();
        let mut ring = Ring::new();
        ring.add_peer(Peer::new(id, locator.clone()));

        Self {
            id,
            locator,
            settings,
            ring,
            storage: Storage::new(),
            coordinator: QuorumCoordinator::new(),
            transport,
            mailbox,
            backlog: VecDeque::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Seed the ring with already known members.
    pub fn with_peers(mut self, peers: impl IntoIterator<Item = Peer>) -> Self {
        self.ring.add_peers(peers);
        self
    }

    /// Queue a join through `contact`; it runs first once the loop starts.
    pub fn start_join(&mut self, contact: impl Into<Locator>) {
        let message = Message::StartJoin {
            contact: contact.into(),
        };
        self.send(&self.locator.clone(), message);
    }

    /// Drain the mailbox until the node leaves the ring.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!("Starting node {} at {}", self.id, self.locator);
        tracing::info!(
            "  Replication: N={} R={} W={}",
            self.settings.replication.n,
            self.settings.replication.r,
            self.settings.replication.w
        );

        loop {
            let envelope = match self.backlog.pop_front() {
                Some(envelope) => envelope,
                None => self.mailbox.recv().await.ok_or(Error::MailboxClosed)?,
            };

            if self.handle(envelope).await? == Flow::Halt {
                break;
            }
        }

        // Goodbyes and the last replies must go out before the caller drops
        // the runtime
        if tokio::time::timeout(self.settings.bootstrap_timeout, self.transport.flush())
            .await
            .is_err()
        {
            tracing::warn!("Node {} stopped with messages still in flight", self.id);
        }

        tracing::info!("Node {} stopped", self.id);
        Ok(())
    }

    pub async fn handle(&mut self, envelope: Envelope) -> Result<Flow> {
        let Envelope { from, message } = envelope;
        tracing::debug!("Node {} got {} from {}", self.id, message.kind(), from);

        match message {
            Message::StartJoin { contact } => self.join(contact).await?,
            Message::PeersList {
                is_request: true, ..
            } => {
                let peers = self.ring.peers().cloned().collect();
                self.send(
                    &from,
                    Message::PeersList {
                        is_request: false,
                        peers,
                    },
                );
            }
            Message::PeersList {
                is_request: false, ..
            } => {
                tracing::warn!("Node {} ignoring unsolicited peer list from {}", self.id, from);
            }
            Message::HelloMates { id, locator } => self.on_hello_mates(id, locator),
            Message::ByeMates { id, items } => self.on_bye_mates(id, items),
            Message::RequestInitItems {
                is_request: true,
                requester_id,
                requester_locator,
                items,
            } => self.on_handoff_request(requester_id, requester_locator, items),
            Message::RequestInitItems {
                is_request: false,
                items,
                ..
            } => {
                tracing::warn!(
                    "Node {} got a late handoff of {} items from {}",
                    self.id,
                    items.len(),
                    from
                );
                self.storage.acquire_responsibility_of(items);
            }
            Message::Operation(op) => self.on_operation(from, op),
            Message::Timeout { request_id } => {
                if let Some(client) = self.coordinator.on_timeout(request_id) {
                    self.send(&client, ClientReply::Failure.into());
                }
            }
            Message::Leave => {
                self.leave(from);
                return Ok(Flow::Halt);
            }
            Message::Status {
                is_request: true, ..
            } => {
                let snapshot = self.status();
                self.send(
                    &from,
                    Message::Status {
                        is_request: false,
                        snapshot: Some(snapshot),
                    },
                );
            }
            Message::Status {
                is_request: false, ..
            } => {
                tracing::debug!("Node {} ignoring status reply from {}", self.id, from);
            }
        }

        Ok(Flow::Continue)
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            id: self.id,
            locator: self.locator.clone(),
            ring: self.ring.ids(),
            items: self.storage.items(),
            busy: !self.coordinator.is_idle(),
        }
    }

    fn on_operation(&mut self, from: Locator, op: Operation) {
        match op {
            Operation::ClientRead { key } => self.begin_operation(from, key, OperationKind::Read),
            Operation::ClientWrite { key, value } => {
                self.begin_operation(from, key, OperationKind::Write { value })
            }
            Operation::ClientReply(reply) => {
                tracing::warn!("Node {} got a client reply {:?} from {}", self.id, reply, from);
            }
            Operation::ReplicaRead { request_id, key } => {
                let item = self.storage.get(key).cloned();
                self.send(
                    &from,
                    Operation::ReplicaReadReply {
                        request_id,
                        key,
                        item,
                    }
                    .into(),
                );
            }
            Operation::ReplicaReadReply {
                request_id, item, ..
            } => {
                if let Some(decision) = self.coordinator.on_read_reply(request_id, item) {
                    self.apply(decision);
                }
            }
            Operation::ReplicaUpdate {
                key,
                value,
                version,
            } => {
                tracing::debug!("Node {} stores key {} at version {}", self.id, key, version);
                self.storage.update(key, value, version);
            }
        }
    }

    fn begin_operation(&mut self, client: Locator, key: Key, kind: OperationKind) {
        let replication = self.settings.replication;
        let request_id = match self.coordinator.begin(client.clone(), key, kind, &replication) {
            Some(request_id) => request_id,
            None => {
                tracing::info!("Node {} busy, turning away {}", self.id, client);
                self.send(&client, ClientReply::Busy.into());
                return;
            }
        };

        let timer = self.spawn_timer(request_id);
        self.coordinator.arm_timer(request_id, timer);

        for peer in self.ring.replicas_for_key(replication.n, key) {
            self.send(&peer.locator, Operation::ReplicaRead { request_id, key }.into());
        }
    }

    fn apply(&mut self, decision: Decision) {
        match decision {
            Decision::Reply { client, reply } => self.send(&client, reply.into()),
            Decision::Commit { client, item } => {
                tracing::debug!("Node {} commits {}", self.id, item);
                self.send(&client, ClientReply::Success.into());
                for peer in self.ring.replicas_for_key(self.settings.replication.n, item.key) {
                    self.send(
                        &peer.locator,
                        Operation::ReplicaUpdate {
                            key: item.key,
                            value: item.value.clone(),
                            version: item.version,
                        }
                        .into(),
                    );
                }
            }
        }
    }

    /// Deliver `Timeout { request_id }` to this node once the quorum
    /// timeout elapses.
    fn spawn_timer(&self, request_id: u64) -> AbortHandle {
        let inbox = self.mailbox.sender();
        let from = self.locator.clone();
        let delay = self.settings.quorum_timeout;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inbox.send(Envelope::new(from, Message::Timeout { request_id }));
        })
        .abort_handle()
    }

    /// Every ring member except this node.
    pub(crate) fn other_peers(&self) -> Vec<Peer> {
        self.ring
            .peers()
            .filter(|peer| peer.id != self.id)
            .cloned()
            .collect()
    }

    /// Fire-and-forget. Messages to self go straight into the mailbox.
    pub(crate) fn send(&self, to: &Locator, message: Message) {
        let kind = message.kind();
        let envelope = Envelope::new(self.locator.clone(), message);
        let result = if *to == self.locator {
            self.mailbox
                .sender()
                .send(envelope)
                .map_err(|_| Error::MailboxClosed)
        } else {
            self.transport.send(to, envelope)
        };

        if let Err(e) = result {
            tracing::warn!("Node {} failed to send {} to {}: {}", self.id, kind, to, e);
        }
    }
}
