//! Message transport between nodes and clients
//!
//! Nodes never touch each other's state; every cross-node effect is an
//! [`Envelope`] delivered into the recipient's [`Mailbox`]. Delivery is
//! fire-and-forget: a lost or slow message is only ever observed as a
//! missing reply.

pub mod memory;
pub mod tcp;

pub use memory::MemoryNetwork;
pub use tcp::{listen, TcpTransport};

use crate::common::{Error, Result};
use crate::node::messages::Envelope;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Opaque network address of a node or client.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret the locator as a TCP address.
    pub fn to_socket_addr(&self) -> Result<SocketAddr> {
        self.0
            .parse()
            .map_err(|_| Error::Unreachable(self.clone()))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Locator(s.to_string())
    }
}

impl From<String> for Locator {
    fn from(s: String) -> Self {
        Locator(s)
    }
}

impl From<SocketAddr> for Locator {
    fn from(addr: SocketAddr) -> Self {
        Locator(addr.to_string())
    }
}

/// Sending half of a mailbox.
pub type MailboxSender = mpsc::UnboundedSender<Envelope>;

/// Ordered inbox of a node or client.
#[derive(Debug)]
pub struct Mailbox {
    sender: MailboxSender,
    receiver: mpsc::UnboundedReceiver<Envelope>,
}

impl Mailbox {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self { sender, receiver }
    }

    pub fn sender(&self) -> MailboxSender {
        self.sender.clone()
    }

    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.receiver.try_recv().ok()
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-to-point delivery of envelopes to a locator.
pub trait Transport: Clone + Send + Sync + 'static {
    /// Hand `envelope` over for delivery without waiting for it to arrive.
    fn send(&self, to: &Locator, envelope: Envelope) -> Result<()>;

    /// Wait until every envelope handed to `send` so far has left the
    /// process. Transports that deliver synchronously have nothing to wait for.
    fn flush(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::messages::Message;

    #[test]
    fn test_locator_socket_addr() {
        let addr: SocketAddr = "127.0.0.1:10010".parse().unwrap();
        let locator = Locator::from(addr);
        assert_eq!(locator.as_str(), "127.0.0.1:10010");
        assert_eq!(locator.to_socket_addr().unwrap(), addr);

        let err = Locator::from("mem://node-1").to_socket_addr().unwrap_err();
        assert!(matches!(err, Error::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_mailbox_is_fifo() {
        let mut mailbox = Mailbox::new();
        let sender = mailbox.sender();
        sender.send(Envelope::new("a", Message::Leave)).unwrap();
        sender
            .send(Envelope::new("b", Message::StartJoin { contact: "c".into() }))
            .unwrap();

        assert_eq!(mailbox.recv().await.unwrap().from.as_str(), "a");
        assert_eq!(mailbox.recv().await.unwrap().from.as_str(), "b");
        assert!(mailbox.try_recv().is_none());
    }
}
