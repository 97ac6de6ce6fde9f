//! Hub configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime limits for the membership hub.
///
/// Deserializable so hosts can embed it in their own configuration files;
/// missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Upper bound on authorizing and joining a new connection. Matches the
    /// transport handshake timeout; exceeding it fails the connection closed.
    pub handshake_timeout: Duration,
    /// Maximum gateway join/leave calls in flight for one assignment or
    /// refresh.
    pub max_concurrent_gateway_ops: usize,
    /// Capacity of the permission-change queue.
    pub change_queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
            max_concurrent_gateway_ops: 64,
            change_queue_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HubConfig::default();
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.max_concurrent_gateway_ops, 64);
        assert_eq!(config.change_queue_capacity, 1024);
    }
}
