//! Configuration for dynakv nodes
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `DYNAKV__*` environment variables (e.g. `DYNAKV__REPLICATION__N=5`).

use crate::common::utils::parse_duration;
use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Replication parameters
    #[serde(default)]
    pub replication: ReplicationConfig,

    /// Protocol timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Replication factor and quorum sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Number of replicas per key
    #[serde(default = "default_n")]
    pub n: usize,

    /// Read quorum
    #[serde(default = "default_r")]
    pub r: usize,

    /// Write quorum
    #[serde(default = "default_w")]
    pub w: usize,
}

fn default_n() -> usize {
    3
}
fn default_r() -> usize {
    2
}
fn default_w() -> usize {
    2
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            n: default_n(),
            r: default_r(),
            w: default_w(),
        }
    }
}

impl ReplicationConfig {
    pub fn new(n: usize, r: usize, w: usize) -> Result<Self> {
        let config = Self { n, r, w };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations where read and write quorums may not overlap.
    pub fn validate(&self) -> Result<()> {
        if self.n == 0 {
            return Err(Error::InvalidConfig("N must be at least 1".into()));
        }
        if self.r == 0 || self.w == 0 {
            return Err(Error::InvalidConfig("R and W must be at least 1".into()));
        }
        if self.r > self.n || self.w > self.n {
            return Err(Error::InvalidConfig(format!(
                "R ({}) and W ({}) must not exceed N ({})",
                self.r, self.w, self.n
            )));
        }
        if self.r + self.w <= self.n {
            return Err(Error::InvalidConfig(format!(
                "R + W must be greater than N (R={}, W={}, N={})",
                self.r, self.w, self.n
            )));
        }
        Ok(())
    }

    /// Number of replica responses a write waits for before committing.
    ///
    /// Writes read the current version first, so they need enough answers to
    /// satisfy both quorums.
    pub fn write_quorum(&self) -> usize {
        self.r.max(self.w)
    }
}

/// Protocol timeouts, as duration strings ("2s", "500ms").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// How long a coordinator waits for a quorum
    #[serde(default = "default_quorum_timeout")]
    pub quorum: String,

    /// How long a joining node waits for each bootstrap reply
    #[serde(default = "default_bootstrap_timeout")]
    pub bootstrap: String,
}

fn default_quorum_timeout() -> String {
    "2s".to_string()
}
fn default_bootstrap_timeout() -> String {
    "5s".to_string()
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            quorum: default_quorum_timeout(),
            bootstrap: default_bootstrap_timeout(),
        }
    }
}

impl TimeoutConfig {
    pub fn quorum(&self) -> Result<Duration> {
        parse_duration(&self.quorum)
    }

    pub fn bootstrap(&self) -> Result<Duration> {
        parse_duration(&self.bootstrap)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            replication: ReplicationConfig::default(),
            timeouts: TimeoutConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: Config = builder
            .add_source(
                config::Environment::with_prefix("DYNAKV")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.replication.validate()?;
        self.timeouts.quorum()?;
        self.timeouts.bootstrap()?;
        Ok(())
    }

    /// Resolve the settings a node process runs with.
    pub fn node_settings(&self) -> Result<NodeSettings> {
        self.validate()?;
        Ok(NodeSettings {
            replication: self.replication,
            quorum_timeout: self.timeouts.quorum()?,
            bootstrap_timeout: self.timeouts.bootstrap()?,
        })
    }
}

/// Validated, resolved parameters of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSettings {
    pub replication: ReplicationConfig,
    pub quorum_timeout: Duration,
    pub bootstrap_timeout: Duration,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            replication: ReplicationConfig::default(),
            quorum_timeout: Duration::from_secs(2),
            bootstrap_timeout: Duration::from_secs(5),
        }
    }
}
