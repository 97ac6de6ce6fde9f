//! Event routing.
//!
//! Channel events go to the channel's gateway group, so only connections the
//! coordinator joined receive them. User-targeted events go straight to each
//! of the user's live connections.

use std::sync::Arc;

use beacon_core::{AuthorizerIndex, ConnectionId, UserKey};
use futures::future::join_all;

use crate::{
    ServerEvent,
    error::RouterError,
    gateway::{BroadcastGroupGateway, GatewayError},
    registry::ConnectionRegistry,
};

/// Outcome of a per-connection delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Connections the event was handed to
    pub delivered: Vec<ConnectionId>,
    /// Connections the gateway could not reach
    pub failures: Vec<(ConnectionId, GatewayError)>,
}

/// Routes server events to the gateway.
pub struct EventRouter {
    index: Arc<AuthorizerIndex>,
    registry: Arc<ConnectionRegistry>,
    gateway: Arc<dyn BroadcastGroupGateway>,
}

impl EventRouter {
    /// Create a router.
    pub fn new(
        index: Arc<AuthorizerIndex>,
        registry: Arc<ConnectionRegistry>,
        gateway: Arc<dyn BroadcastGroupGateway>,
    ) -> Self {
        Self { index, registry, gateway }
    }

    /// Publish an event to its source channel's group.
    ///
    /// # Errors
    ///
    /// - `RouterError::UnknownChannel` if no authorizer governs the channel
    /// - `RouterError::Gateway` if the gateway fails to publish
    pub async fn route(&self, event: &ServerEvent) -> Result<(), RouterError> {
        if !self.index.contains(event.source.as_str()) {
            tracing::warn!(channel = %event.source, "rejecting event for unindexed channel");
            return Err(RouterError::UnknownChannel(event.source.clone()));
        }

        self.gateway.publish(&event.source, event).await?;

        tracing::trace!(
            channel = %event.source,
            kind = ?event.kind,
            key = event.key,
            "event routed"
        );
        Ok(())
    }

    /// Send an event to every live connection of one user.
    ///
    /// Unreachable connections are reported, not treated as errors.
    pub async fn notify_user(&self, event: &ServerEvent, user: UserKey) -> DeliveryReport {
        let connections = self.registry.connections(user);
        let gateway = &self.gateway;

        let sends = connections.into_iter().map(|connection| async move {
            let outcome = gateway.send(&connection, event).await;
            (connection, outcome)
        });

        let mut report = DeliveryReport::default();
        for (connection, outcome) in join_all(sends).await {
            match outcome {
                Ok(()) => report.delivered.push(connection),
                Err(err) => {
                    tracing::debug!(%user, %connection, error = %err, "user notification failed");
                    report.failures.push((connection, err));
                },
            }
        }
        report
    }
}

impl std::fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRouter")
            .field("index", &self.index)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
