//! Common utilities and types shared across dynakv

pub mod config;
pub mod error;
pub mod utils;

pub use config::{Config, NodeSettings, ReplicationConfig, TimeoutConfig};
pub use error::{Error, Result};
pub use utils::{default_bind_addr, parse_duration, BASE_PORT};
