//! In-memory gateway.
//!
//! Keeps real group bookkeeping and delivers events into per-connection
//! queues, so tests can observe both membership and delivery. Every call is
//! also appended to a call log.

#![allow(clippy::disallowed_types, reason = "Call log is appended under a short critical section")]

use std::{
    collections::{BTreeSet, HashSet},
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use beacon_core::{Channel, ConnectionId};
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::{BroadcastGroupGateway, GatewayError};
use crate::ServerEvent;

/// A call received by [`MemoryGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    /// `join(connection, channel)`
    Join {
        /// Connection joined
        connection: ConnectionId,
        /// Group joined
        channel: Channel,
    },
    /// `leave(connection, channel)`
    Leave {
        /// Connection removed
        connection: ConnectionId,
        /// Group left
        channel: Channel,
    },
    /// `publish(channel, event)`
    Publish {
        /// Target group
        channel: Channel,
        /// Published event
        event: ServerEvent,
    },
    /// `send(connection, event)`
    Send {
        /// Target connection
        connection: ConnectionId,
        /// Sent event
        event: ServerEvent,
    },
}

/// Gateway holding groups and outboxes in memory.
///
/// Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryGateway {
    inner: Arc<MemoryGatewayInner>,
}

#[derive(Default)]
struct MemoryGatewayInner {
    /// Channel → member connections
    groups: DashMap<Channel, HashSet<ConnectionId>>,
    /// Connection → outbound event queue
    outboxes: DashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
    /// Every call, in arrival order
    calls: Mutex<Vec<GatewayCall>>,
}

impl MemoryGateway {
    /// Create a gateway with no groups and no open connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a connection's outbox, as the transport does on accept.
    ///
    /// Returns the receiving end of the connection's event queue.
    pub fn open(&self, connection: ConnectionId) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner.outboxes.insert(connection, sender);
        receiver
    }

    /// Close a connection: drop its outbox and remove it from every group,
    /// as the transport does on disconnect.
    pub fn close(&self, connection: &ConnectionId) {
        self.inner.outboxes.remove(connection);
        self.inner.groups.retain(|_, members| {
            members.remove(connection);
            !members.is_empty()
        });
    }

    /// Current members of a channel's group.
    pub fn members(&self, channel: &str) -> HashSet<ConnectionId> {
        self.inner.groups.get(channel).map(|entry| entry.value().clone()).unwrap_or_default()
    }

    /// Whether a connection is currently in a channel's group.
    pub fn is_member(&self, connection: &ConnectionId, channel: &str) -> bool {
        self.inner.groups.get(channel).is_some_and(|entry| entry.contains(connection))
    }

    /// Every group a connection is currently in.
    pub fn groups_of(&self, connection: &ConnectionId) -> BTreeSet<Channel> {
        self.inner
            .groups
            .iter()
            .filter(|entry| entry.value().contains(connection))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.inner.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Drain the call log.
    pub fn take_calls(&self) -> Vec<GatewayCall> {
        std::mem::take(&mut *self.inner.calls.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn record(&self, call: GatewayCall) {
        self.inner.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }

    fn deliver(&self, connection: &ConnectionId, event: &ServerEvent) -> Result<(), GatewayError> {
        let outbox = self
            .inner
            .outboxes
            .get(connection)
            .ok_or_else(|| GatewayError::ConnectionClosed(connection.clone()))?;

        outbox.send(event.clone()).map_err(|_| GatewayError::ConnectionClosed(connection.clone()))
    }
}

#[async_trait]
impl BroadcastGroupGateway for MemoryGateway {
    async fn join(&self, connection: &ConnectionId, channel: &Channel) -> Result<(), GatewayError> {
        self.record(GatewayCall::Join { connection: connection.clone(), channel: channel.clone() });
        self.inner.groups.entry(channel.clone()).or_default().insert(connection.clone());
        Ok(())
    }

    async fn leave(
        &self,
        connection: &ConnectionId,
        channel: &Channel,
    ) -> Result<(), GatewayError> {
        let call = GatewayCall::Leave { connection: connection.clone(), channel: channel.clone() };
        self.record(call);
        self.inner.groups.remove_if_mut(channel, |_, members| {
            members.remove(connection);
            members.is_empty()
        });
        Ok(())
    }

    async fn publish(&self, channel: &Channel, event: &ServerEvent) -> Result<(), GatewayError> {
        self.record(GatewayCall::Publish { channel: channel.clone(), event: event.clone() });

        for member in self.members(channel.as_str()) {
            if let Err(err) = self.deliver(&member, event) {
                tracing::debug!(%channel, connection = %member, error = %err, "skipping member");
            }
        }
        Ok(())
    }

    async fn send(
        &self,
        connection: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), GatewayError> {
        self.record(GatewayCall::Send { connection: connection.clone(), event: event.clone() });
        self.deliver(connection, event)
    }
}

impl fmt::Debug for MemoryGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryGateway")
            .field("group_count", &self.inner.groups.len())
            .field("open_connections", &self.inner.outboxes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventKind;

    fn event(source: Channel) -> ServerEvent {
        ServerEvent::new(source, EventKind::Updated, 7)
    }

    #[tokio::test]
    async fn join_and_leave_are_idempotent() {
        let gateway = MemoryGateway::new();
        let conn = ConnectionId::new("c1");
        let channel = Channel::from_static("content");

        gateway.join(&conn, &channel).await.unwrap();
        gateway.join(&conn, &channel).await.unwrap();
        assert_eq!(gateway.members("content").len(), 1);

        gateway.leave(&conn, &channel).await.unwrap();
        gateway.leave(&conn, &channel).await.unwrap();
        assert!(!gateway.is_member(&conn, "content"));
        assert_eq!(gateway.calls().len(), 4);
    }

    #[tokio::test]
    async fn publish_reaches_members_only() {
        let gateway = MemoryGateway::new();
        let member = ConnectionId::new("member");
        let outsider = ConnectionId::new("outsider");
        let mut member_rx = gateway.open(member.clone());
        let mut outsider_rx = gateway.open(outsider.clone());
        let channel = Channel::from_static("content");

        gateway.join(&member, &channel).await.unwrap();
        gateway.publish(&channel, &event(channel.clone())).await.unwrap();

        assert_eq!(member_rx.try_recv().unwrap(), event(channel));
        assert!(outsider_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_removes_connection_from_every_group() {
        let gateway = MemoryGateway::new();
        let conn = ConnectionId::new("c1");
        let _rx = gateway.open(conn.clone());

        gateway.join(&conn, &Channel::from_static("a")).await.unwrap();
        gateway.join(&conn, &Channel::from_static("b")).await.unwrap();
        assert_eq!(gateway.groups_of(&conn).len(), 2);

        gateway.close(&conn);
        assert!(gateway.groups_of(&conn).is_empty());

        let result = gateway.send(&conn, &event(Channel::from_static("a"))).await;
        assert_eq!(result, Err(GatewayError::ConnectionClosed(conn)));
    }
}
