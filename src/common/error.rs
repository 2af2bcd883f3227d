//! Error types for dynakv

use crate::node::item::NodeId;
use crate::transport::Locator;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // === Network Errors ===
    #[error("Peer unreachable: {0}")]
    Unreachable(Locator),

    #[error("Mailbox closed")]
    MailboxClosed,

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    // === Membership Errors ===
    #[error("Unknown peer: {0}")]
    UnknownPeer(NodeId),

    // === Config Errors ===
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::Unreachable(_) | Error::Io(_)
        )
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
