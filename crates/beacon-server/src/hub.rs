//! Connection lifecycle glue.
//!
//! The hub is what the transport and the domain layer talk to. It registers
//! connections, assigns their initial memberships under the handshake
//! deadline, and turns permission-change notifications into refreshes.
//!
//! # Failure policy
//!
//! Every failure path leaves memberships narrower, never wider: a connect
//! that times out or cannot be authorized leaves every indexed channel, and a
//! user whose principal cannot be rebuilt loses every membership.

use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use beacon_core::{AuthorizationEngine, AuthorizerIndex, ConnectionId, Principal, UserKey};
use futures::future::join_all;

use crate::{
    HubConfig,
    coordinator::MembershipCoordinator,
    error::{HubError, ResolveError},
    gateway::BroadcastGroupGateway,
    registry::ConnectionRegistry,
    report::{MembershipReport, RefreshOutcome},
    router::EventRouter,
};

/// Rebuilds the current principal for a user key.
///
/// Backed by the host's user store. Called once per affected user for every
/// permission change.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// Current principal for `user`, or `None` if the user no longer exists
    /// or is disabled.
    async fn resolve(&self, user: UserKey) -> Result<Option<Principal>, ResolveError>;
}

/// Notification that permissions changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionChange {
    /// These users' records changed.
    Users(Vec<UserKey>),
    /// A definition shared by many users changed. Every connected user is
    /// refreshed.
    AllConnected,
}

/// Why a connection was failed closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailClosedReason {
    /// Initial assignment did not finish within the handshake timeout.
    HandshakeTimeout,
}

/// Result of [`Hub::on_connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Initial memberships were assigned.
    Assigned(MembershipReport),
    /// The connection stays registered but is authorized for nothing.
    FailedClosed {
        /// What went wrong
        reason: FailClosedReason,
        /// Leaves issued while failing closed
        report: MembershipReport,
    },
}

/// Refresh result for one user of a [`PermissionChange`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRefresh {
    /// User refreshed
    pub user: UserKey,
    /// What happened
    pub outcome: Result<RefreshOutcome, HubError>,
}

/// Connection lifecycle entry point.
pub struct Hub {
    coordinator: MembershipCoordinator,
    router: EventRouter,
    registry: Arc<ConnectionRegistry>,
    resolver: Arc<dyn PrincipalResolver>,
    config: HubConfig,
}

impl Hub {
    /// Wire a hub around an authorizer index and gateway.
    pub fn new(
        index: Arc<AuthorizerIndex>,
        gateway: Arc<dyn BroadcastGroupGateway>,
        resolver: Arc<dyn PrincipalResolver>,
        config: HubConfig,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let coordinator = MembershipCoordinator::new(
            AuthorizationEngine::new(Arc::clone(&index)),
            Arc::clone(&registry),
            Arc::clone(&gateway),
        )
        .with_max_concurrent_ops(config.max_concurrent_gateway_ops);
        let router = EventRouter::new(index, Arc::clone(&registry), gateway);

        Self { coordinator, router, registry, resolver, config }
    }

    /// Membership coordinator.
    pub fn coordinator(&self) -> &MembershipCoordinator {
        &self.coordinator
    }

    /// Event router.
    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Hub configuration.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a new connection and join it to its authorized channels.
    ///
    /// # Errors
    ///
    /// - `HubError::Unauthenticated` if the principal has no user key. The
    ///   connection is not registered.
    /// - `HubError::Coordinator` if authorization fails. The connection stays
    ///   registered and every indexed channel was left.
    pub async fn on_connect(
        &self,
        principal: &Principal,
        connection: ConnectionId,
    ) -> Result<ConnectOutcome, HubError> {
        let Some(user) = principal.user_key() else {
            tracing::warn!(%connection, "rejecting connection without authenticated user");
            return Err(HubError::Unauthenticated(connection));
        };

        self.registry.add_connection(user, connection.clone());
        tracing::info!(%user, %connection, "connection accepted");

        let assignment = tokio::time::timeout(
            self.config.handshake_timeout,
            self.coordinator.assign_initial(principal, &connection),
        )
        .await;

        match assignment {
            Ok(Ok(report)) => Ok(ConnectOutcome::Assigned(report)),
            Ok(Err(err)) => {
                tracing::error!(%user, %connection, error = %err, "initial assignment failed");
                self.coordinator.revoke_connection(user, &connection).await;
                Err(err.into())
            },
            Err(_elapsed) => {
                tracing::warn!(
                    %user,
                    %connection,
                    timeout = ?self.config.handshake_timeout,
                    "initial assignment timed out"
                );
                let report = self.coordinator.revoke_connection(user, &connection).await;
                Ok(ConnectOutcome::FailedClosed {
                    reason: FailClosedReason::HandshakeTimeout,
                    report,
                })
            },
        }
    }

    /// Deregister a closed connection.
    ///
    /// Returns `true` if the connection was registered. Group cleanup is the
    /// gateway's job.
    pub fn on_disconnect(&self, user: UserKey, connection: &ConnectionId) -> bool {
        let removed = self.registry.remove_connection(user, connection);
        if removed {
            tracing::info!(%user, %connection, "connection closed");
        }
        removed
    }

    /// Refresh every user affected by a permission change.
    ///
    /// Users are deduplicated and refreshed concurrently. Offline users are
    /// skipped without consulting the resolver.
    pub async fn on_permissions_changed(&self, change: PermissionChange) -> Vec<UserRefresh> {
        let users: BTreeSet<UserKey> = match change {
            PermissionChange::Users(users) => users.into_iter().collect(),
            PermissionChange::AllConnected => self.registry.users().into_iter().collect(),
        };

        tracing::debug!(users = users.len(), "applying permission change");

        let refreshes = users.into_iter().map(|user| async move {
            UserRefresh { user, outcome: self.refresh_user(user).await }
        });
        join_all(refreshes).await
    }

    async fn refresh_user(&self, user: UserKey) -> Result<RefreshOutcome, HubError> {
        if !self.registry.has_connections(user) {
            return Ok(RefreshOutcome::NoConnections);
        }

        match self.resolver.resolve(user).await {
            Ok(Some(principal)) if principal.user_key() == Some(user) => {
                Ok(self.coordinator.refresh(&principal).await?)
            },
            Ok(Some(_)) => {
                tracing::error!(%user, "resolver returned principal for a different user");
                self.revoke_quietly(user).await;
                Err(HubError::Resolve(ResolveError {
                    user,
                    reason: "resolved principal belongs to another user".to_string(),
                }))
            },
            Ok(None) => {
                tracing::info!(%user, "user no longer resolvable, revoking memberships");
                Ok(self.coordinator.revoke_user(user).await?)
            },
            Err(err) => {
                tracing::warn!(%user, error = %err, "principal resolution failed");
                self.revoke_quietly(user).await;
                Err(err.into())
            },
        }
    }

    /// Revoke ahead of returning a resolution error, which takes precedence.
    async fn revoke_quietly(&self, user: UserKey) {
        if let Err(err) = self.coordinator.revoke_user(user).await {
            tracing::warn!(%user, error = %err, "refresh parked behind revocation failed");
        }
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("coordinator", &self.coordinator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
