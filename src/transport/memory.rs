//! In-process transport
//!
//! Every participant registers a locator and gets a [`Mailbox`]. A locator
//! can be isolated to simulate an unresponsive peer: envelopes to or from
//! it are silently dropped until it is healed.

use super::{Locator, Mailbox, MailboxSender, Transport};
use crate::common::{Error, Result};
use crate::node::messages::Envelope;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
struct Registry {
    mailboxes: HashMap<Locator, MailboxSender>,
    isolated: HashSet<Locator>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    registry: Arc<RwLock<Registry>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mailbox reachable at `locator`, replacing any previous one.
    pub fn register(&self, locator: impl Into<Locator>) -> Mailbox {
        let mailbox = Mailbox::new();
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .mailboxes
            .insert(locator.into(), mailbox.sender());
        mailbox
    }

    pub fn unregister(&self, locator: &Locator) {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .mailboxes
            .remove(locator);
    }

    /// Drop all traffic to and from `locator`.
    pub fn isolate(&self, locator: &Locator) {
        tracing::debug!("Isolating {}", locator);
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .isolated
            .insert(locator.clone());
    }

    pub fn heal(&self, locator: &Locator) {
        tracing::debug!("Healing {}", locator);
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .isolated
            .remove(locator);
    }
}

impl Transport for MemoryNetwork {
    fn send(&self, to: &Locator, envelope: Envelope) -> Result<()> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);

        if registry.isolated.contains(to) || registry.isolated.contains(&envelope.from) {
            tracing::debug!(
                "Dropping {} from {} to {} (isolated)",
                envelope.message.kind(),
                envelope.from,
                to
            );
            return Ok(());
        }

        let sender = registry
            .mailboxes
            .get(to)
            .ok_or_else(|| Error::Unreachable(to.clone()))?;
        sender
            .send(envelope)
            .map_err(|_| Error::Unreachable(to.clone()))
    }
}
