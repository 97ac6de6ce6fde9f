//! Broadcast group gateway abstraction.
//!
//! The gateway is the transport-side primitive that owns group bookkeeping
//! and delivery. Beacon only decides membership; the gateway applies it.
//!
//! # Contract
//!
//! - `join` on a connection already in the group succeeds without effect
//! - `leave` on a connection not in the group succeeds without effect
//! - Errors are reserved for genuine transport failures
//! - Dropping a connection from every group on disconnect is the gateway's
//!   own job

mod chaotic;
mod memory;

use async_trait::async_trait;
use beacon_core::{Channel, ConnectionId};
pub use chaotic::ChaoticGateway;
pub use memory::{GatewayCall, MemoryGateway};

use crate::ServerEvent;

/// Errors from gateway operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Target connection is not open on the transport.
    ///
    /// Transient - the connection most likely disconnected a moment ago.
    #[error("connection {0} is not open")]
    ConnectionClosed(ConnectionId),

    /// Transport-level failure.
    ///
    /// May be transient (network-backed hub unreachable) or fatal. Retrying
    /// is the transport's responsibility.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Transport primitive for named broadcast groups.
#[async_trait]
pub trait BroadcastGroupGateway: Send + Sync {
    /// Add a connection to a channel's group. Idempotent.
    async fn join(&self, connection: &ConnectionId, channel: &Channel) -> Result<(), GatewayError>;

    /// Remove a connection from a channel's group. Idempotent.
    async fn leave(&self, connection: &ConnectionId, channel: &Channel)
    -> Result<(), GatewayError>;

    /// Push an event to every current member of a channel's group.
    async fn publish(&self, channel: &Channel, event: &ServerEvent) -> Result<(), GatewayError>;

    /// Push an event to one connection, bypassing groups.
    async fn send(&self, connection: &ConnectionId, event: &ServerEvent)
    -> Result<(), GatewayError>;
}
