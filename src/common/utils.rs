//! Utility functions for dynakv

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Base port for node listeners; a node with id `n` listens on `BASE_PORT + n` by default.
pub const BASE_PORT: u16 = 10_000;

/// Parse duration string (e.g., "500ms", "2s", "5m", "1h")
pub fn parse_duration(s: &str) -> crate::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(crate::Error::InvalidConfig("empty duration".into()));
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| crate::Error::InvalidConfig(format!("missing duration unit: {}", s)))?;
    let (num_str, unit) = s.split_at(split);

    let num: u64 = num_str
        .parse()
        .map_err(|_| crate::Error::InvalidConfig(format!("invalid duration: {}", s)))?;

    let duration = match unit {
        "ms" => Duration::from_millis(num),
        "s" => Duration::from_secs(num),
        "m" => Duration::from_secs(scale(num, 60, s)?),
        "h" => Duration::from_secs(scale(num, 3600, s)?),
        _ => {
            return Err(crate::Error::InvalidConfig(format!(
                "unknown duration unit: {}",
                unit
            )))
        }
    };

    Ok(duration)
}

fn scale(num: u64, factor: u64, s: &str) -> crate::Result<u64> {
    num.checked_mul(factor)
        .ok_or_else(|| crate::Error::InvalidConfig(format!("duration out of range: {}", s)))
}

/// Default listening address of the node with the given id.
pub fn default_bind_addr(id: u64) -> crate::Result<SocketAddr> {
    let port = u16::try_from(id)
        .ok()
        .and_then(|id| BASE_PORT.checked_add(id))
        .ok_or_else(|| {
            crate::Error::InvalidConfig(format!("node id {} has no default port, pass --bind", id))
        })?;
    Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
}
