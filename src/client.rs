//! Client for a dynakv ring
//!
//! A client is just another mailbox on the network. It sends one request
//! to a node and waits for the matching reply.

use crate::common::{Error, Result};
use crate::node::item::Key;
use crate::node::messages::{ClientReply, Envelope, Message, NodeStatus, Operation};
use crate::transport::{Locator, Mailbox, Transport};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Default time a client waits for a node to answer. Longer than the
/// node's own quorum timeout so a `Failure` reply can still arrive.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Client<T: Transport> {
    locator: Locator,
    transport: T,
    mailbox: Mailbox,
    timeout: Duration,
}

impl<T: Transport> Client<T> {
    /// Create a client reachable at `locator` through `mailbox`.
    pub fn new(locator: impl Into<Locator>, transport: T, mailbox: Mailbox) -> Self {
        Self {
            locator: locator.into(),
            transport,
            mailbox,
            timeout: DEFAULT_CLIENT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub async fn get(&mut self, node: &Locator, key: Key) -> Result<ClientReply> {
        self.operation(node, Operation::ClientRead { key }).await
    }

    pub async fn put(
        &mut self,
        node: &Locator,
        key: Key,
        value: impl Into<String>,
    ) -> Result<ClientReply> {
        let op = Operation::ClientWrite {
            key,
            value: value.into(),
        };
        self.operation(node, op).await
    }

    /// Ask `node` to leave the ring.
    pub async fn leave(&mut self, node: &Locator) -> Result<ClientReply> {
        match self.request(node, Message::Leave, is_client_reply).await? {
            Message::Operation(Operation::ClientReply(reply)) => Ok(reply),
            other => Err(Error::UnexpectedReply(other.kind().to_string())),
        }
    }

    pub async fn status(&mut self, node: &Locator) -> Result<NodeStatus> {
        let request = Message::Status {
            is_request: true,
            snapshot: None,
        };
        let reply = self
            .request(node, request, |m| {
                matches!(m, Message::Status { is_request: false, .. })
            })
            .await?;

        match reply {
            Message::Status {
                snapshot: Some(snapshot),
                ..
            } => Ok(snapshot),
            other => Err(Error::UnexpectedReply(other.kind().to_string())),
        }
    }

    async fn operation(&mut self, node: &Locator, op: Operation) -> Result<ClientReply> {
        match self.request(node, op.into(), is_client_reply).await? {
            Message::Operation(Operation::ClientReply(reply)) => Ok(reply),
            other => Err(Error::UnexpectedReply(other.kind().to_string())),
        }
    }

    async fn request<F>(&mut self, node: &Locator, message: Message, accept: F) -> Result<Message>
    where
        F: Fn(&Message) -> bool,
    {
        let deadline = Instant::now() + self.timeout;
        let kind = message.kind();
        self.transport
            .send(node, Envelope::new(self.locator.clone(), message))?;

        loop {
            match timeout_at(deadline, self.mailbox.recv()).await {
                Ok(Some(envelope)) if accept(&envelope.message) => return Ok(envelope.message),
                Ok(Some(envelope)) => {
                    tracing::debug!(
                        "Client skipping {} from {}",
                        envelope.message.kind(),
                        envelope.from
                    );
                }
                Ok(None) => return Err(Error::MailboxClosed),
                Err(_) => {
                    return Err(Error::Timeout(format!("{} to {}", kind, node)));
                }
            }
        }
    }
}

fn is_client_reply(message: &Message) -> bool {
    matches!(message, Message::Operation(Operation::ClientReply(_)))
}
