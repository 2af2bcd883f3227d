//! Quorum coordinator
//!
//! Drives one client operation at a time: `Idle -> AwaitingQuorum -> Idle`.
//! The coordinator only keeps state and decides; the node sends the
//! messages its decisions call for.
//!
//! Reads and writes share the same first phase: every replica is asked for
//! its copy of the key. A read answers with the newest copy once R replies
//! are in. A write waits for max(R, W) replies, then commits the value with
//! the next version. A replica that does not know the key proves the key is
//! new, so a write commits version 1 right away.

use crate::common::ReplicationConfig;
use crate::node::item::{Item, Key};
use crate::node::messages::ClientReply;
use crate::transport::Locator;
use tokio::task::AbortHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Write { value: String },
}

/// The operation currently waiting for its quorum.
#[derive(Debug)]
pub struct PendingOperation {
    pub request_id: u64,
    pub key: Key,
    pub kind: OperationKind,
    pub threshold: usize,
    pub client: Locator,
    pub responses: Vec<Option<Item>>,
    timer: Option<AbortHandle>,
}

impl PendingOperation {
    pub fn quorum_count(&self) -> usize {
        self.responses.len()
    }
}

/// What the node must do once an operation completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Answer the client of a read.
    Reply { client: Locator, reply: ClientReply },
    /// Tell the client the write succeeded and push `item` to every replica.
    Commit { client: Locator, item: Item },
}

#[derive(Debug, Default)]
pub struct QuorumCoordinator {
    pending: Option<PendingOperation>,
    next_request_id: u64,
}

impl QuorumCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    pub fn pending(&self) -> Option<&PendingOperation> {
        self.pending.as_ref()
    }

    /// Start coordinating an operation for `client`. Returns the request id
    /// replicas must echo, or `None` if another operation is in flight.
    pub fn begin(
        &mut self,
        client: Locator,
        key: Key,
        kind: OperationKind,
        replication: &ReplicationConfig,
    ) -> Option<u64> {
        if self.pending.is_some() {
            return None;
        }

        self.next_request_id += 1;
        let request_id = self.next_request_id;
        let threshold = match kind {
            OperationKind::Read => replication.r,
            OperationKind::Write { .. } => replication.write_quorum(),
        };

        tracing::debug!(
            "Coordinating request {} ({:?}) on key {} for {}, quorum {}",
            request_id,
            kind,
            key,
            client,
            threshold
        );

        self.pending = Some(PendingOperation {
            request_id,
            key,
            kind,
            threshold,
            client,
            responses: Vec::new(),
            timer: None,
        });
        Some(request_id)
    }

    /// Attach the timeout timer of the in-flight operation.
    pub fn arm_timer(&mut self, request_id: u64, timer: AbortHandle) {
        match self.pending.as_mut() {
            Some(pending) if pending.request_id == request_id => {
                if let Some(previous) = pending.timer.replace(timer) {
                    previous.abort();
                }
            }
            _ => timer.abort(),
        }
    }

    /// Record a replica's answer.
    pub fn on_read_reply(&mut self, request_id: u64, item: Option<Item>) -> Option<Decision> {
        let pending = match self.pending.as_mut() {
            Some(pending) if pending.request_id == request_id => pending,
            Some(pending) => {
                tracing::debug!(
                    "Ignoring reply for request {} while coordinating {}",
                    request_id,
                    pending.request_id
                );
                return None;
            }
            None => {
                tracing::debug!("Ignoring late reply for request {}", request_id);
                return None;
            }
        };

        if item.is_none() && matches!(pending.kind, OperationKind::Write { .. }) {
            let op = self.finish()?;
            tracing::debug!("Key {} is new, committing version 1", op.key);
            if let OperationKind::Write { value } = op.kind {
                return Some(commit(op.client, op.key, value, 1));
            }
            return None;
        }

        pending.responses.push(item);
        if pending.quorum_count() < pending.threshold {
            return None;
        }

        let op = self.finish()?;
        let latest = latest_version(&op.responses).cloned();
        match op.kind {
            OperationKind::Read => {
                let reply = match latest {
                    Some(item) => ClientReply::Value(item),
                    None => ClientReply::NotFound { key: op.key },
                };
                Some(Decision::Reply {
                    client: op.client,
                    reply,
                })
            }
            OperationKind::Write { value } => {
                let version = latest.map_or(1, |item| item.version + 1);
                Some(commit(op.client, op.key, value, version))
            }
        }
    }

    /// Handle the timer of `request_id`. Returns the client to notify of the
    /// failure, if the operation was still waiting.
    pub fn on_timeout(&mut self, request_id: u64) -> Option<Locator> {
        match self.pending.as_ref() {
            Some(pending) if pending.request_id == request_id => {
                let op = self.finish()?;
                tracing::info!(
                    "Request {} on key {} timed out with {}/{} replies",
                    op.request_id,
                    op.key,
                    op.quorum_count(),
                    op.threshold
                );
                Some(op.client)
            }
            _ => {
                tracing::warn!("Timeout for request {} fired with no such operation in flight", request_id);
                None
            }
        }
    }

    /// Abandon the in-flight operation, returning its client.
    pub fn abort(&mut self) -> Option<Locator> {
        self.finish().map(|op| op.client)
    }

    fn finish(&mut self) -> Option<PendingOperation> {
        let mut op = self.pending.take()?;
        if let Some(timer) = op.timer.take() {
            timer.abort();
        }
        Some(op)
    }
}

fn commit(client: Locator, key: Key, value: String, version: u64) -> Decision {
    Decision::Commit {
        client,
        item: Item::new(key, value, version),
    }
}

/// First response carrying the highest version.
fn latest_version(responses: &[Option<Item>]) -> Option<&Item> {
    responses
        .iter()
        .flatten()
        .fold(None, |best: Option<&Item>, item| match best {
            Some(best) if best.version >= item.version => Some(best),
            _ => Some(item),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replication() -> ReplicationConfig {
        ReplicationConfig::new(3, 2, 2).unwrap()
    }

    fn client() -> Locator {
        Locator::from("mem://client")
    }

    fn write(value: &str) -> OperationKind {
        OperationKind::Write {
            value: value.to_string(),
        }
    }

    #[test]
    fn test_read_returns_latest_version() {
        let mut coordinator = QuorumCoordinator::new();
        let id = coordinator
            .begin(client(), 5, OperationKind::Read, &replication())
            .unwrap();

        assert_eq!(coordinator.on_read_reply(id, Some(Item::new(5, "old", 1))), None);
        assert_eq!(coordinator.pending().unwrap().quorum_count(), 1);

        let decision = coordinator.on_read_reply(id, Some(Item::new(5, "new", 2)));
        assert_eq!(
            decision,
            Some(Decision::Reply {
                client: client(),
                reply: ClientReply::Value(Item::new(5, "new", 2)),
            })
        );
        assert!(coordinator.is_idle());
    }

    #[test]
    fn test_read_tie_keeps_first_maximum() {
        let responses = vec![
            Some(Item::new(5, "first", 3)),
            None,
            Some(Item::new(5, "second", 3)),
        ];
        assert_eq!(latest_version(&responses).unwrap().value, "first");
        assert!(latest_version(&[None, None]).is_none());
    }

    #[test]
    fn test_read_of_missing_key() {
        let mut coordinator = QuorumCoordinator::new();
        let id = coordinator
            .begin(client(), 7, OperationKind::Read, &replication())
            .unwrap();

        assert_eq!(coordinator.on_read_reply(id, None), None);
        let decision = coordinator.on_read_reply(id, None).unwrap();
        assert_eq!(
            decision,
            Decision::Reply {
                client: client(),
                reply: ClientReply::NotFound { key: 7 },
            }
        );
    }

    #[test]
    fn test_write_bumps_version() {
        let mut coordinator = QuorumCoordinator::new();
        let id = coordinator
            .begin(client(), 5, write("b"), &replication())
            .unwrap();

        assert_eq!(coordinator.on_read_reply(id, Some(Item::new(5, "a", 1))), None);
        let decision = coordinator.on_read_reply(id, Some(Item::new(5, "a", 1)));
        assert_eq!(
            decision,
            Some(Decision::Commit {
                client: client(),
                item: Item::new(5, "b", 2),
            })
        );
        assert!(coordinator.is_idle());
    }

    #[test]
    fn test_write_uses_larger_quorum() {
        let replication = ReplicationConfig::new(3, 3, 1).unwrap();
        let mut coordinator = QuorumCoordinator::new();
        let id = coordinator
            .begin(client(), 5, write("b"), &replication)
            .unwrap();
        assert_eq!(coordinator.pending().unwrap().threshold, 3);

        assert!(coordinator.on_read_reply(id, Some(Item::new(5, "a", 4))).is_none());
        assert!(coordinator.on_read_reply(id, Some(Item::new(5, "a", 2))).is_none());
        let decision = coordinator.on_read_reply(id, Some(Item::new(5, "a", 4))).unwrap();
        assert_eq!(
            decision,
            Decision::Commit {
                client: client(),
                item: Item::new(5, "b", 5),
            }
        );
    }

    #[test]
    fn test_write_of_new_key_short_circuits() {
        let mut coordinator = QuorumCoordinator::new();
        let id = coordinator
            .begin(client(), 5, write("a"), &replication())
            .unwrap();

        let decision = coordinator.on_read_reply(id, None);
        assert_eq!(
            decision,
            Some(Decision::Commit {
                client: client(),
                item: Item::new(5, "a", 1),
            })
        );
        assert!(coordinator.is_idle());

        // Remaining replies arrive after the operation is over
        assert_eq!(coordinator.on_read_reply(id, None), None);
    }

    #[test]
    fn test_second_operation_is_rejected_while_busy() {
        let mut coordinator = QuorumCoordinator::new();
        let id = coordinator
            .begin(client(), 5, OperationKind::Read, &replication())
            .unwrap();

        assert!(coordinator
            .begin("mem://other".into(), 6, write("x"), &replication())
            .is_none());
        assert_eq!(coordinator.pending().unwrap().request_id, id);
        assert_eq!(coordinator.pending().unwrap().client, client());
    }

    #[test]
    fn test_timeout_resets_state() {
        let mut coordinator = QuorumCoordinator::new();
        let id = coordinator
            .begin(client(), 5, OperationKind::Read, &replication())
            .unwrap();
        coordinator.on_read_reply(id, Some(Item::new(5, "a", 1)));

        assert_eq!(coordinator.on_timeout(id), Some(client()));
        assert!(coordinator.is_idle());

        // A later timer for the same request is stale
        assert_eq!(coordinator.on_timeout(id), None);

        let next = coordinator
            .begin(client(), 5, OperationKind::Read, &replication())
            .unwrap();
        assert_ne!(next, id);
        assert_eq!(coordinator.pending().unwrap().quorum_count(), 0);
    }

    #[test]
    fn test_stale_replies_are_ignored() {
        let mut coordinator = QuorumCoordinator::new();
        let first = coordinator
            .begin(client(), 5, OperationKind::Read, &replication())
            .unwrap();
        coordinator.on_timeout(first);

        let second = coordinator
            .begin(client(), 5, OperationKind::Read, &replication())
            .unwrap();
        assert_eq!(coordinator.on_read_reply(first, Some(Item::new(5, "a", 1))), None);
        assert_eq!(coordinator.pending().unwrap().quorum_count(), 0);
        assert_eq!(coordinator.on_timeout(first), None);
        assert_eq!(coordinator.pending().unwrap().request_id, second);
    }

    #[tokio::test]
    async fn test_finishing_aborts_timer() {
        let mut coordinator = QuorumCoordinator::new();
        let id = coordinator
            .begin(client(), 5, OperationKind::Read, &replication())
            .unwrap();

        let timer = tokio::spawn(std::future::pending::<()>());
        coordinator.arm_timer(id, timer.abort_handle());
        assert_eq!(coordinator.abort(), Some(client()));

        let err = timer.await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
