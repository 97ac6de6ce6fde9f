//! Membership coordination.
//!
//! Turns authorization results into gateway group membership. A new
//! connection joins every channel its principal is authorized for; a refresh
//! reconciles every live connection of a user, joining authorized channels and
//! leaving unauthorized ones.
//!
//! # Concurrency
//!
//! Gateway calls within one assignment or refresh are issued concurrently,
//! bounded by `max_concurrent_ops`. Refreshes and revocations for the same
//! user are single-flighted through one gate; different users run
//! independently. A pass whose caller is cancelled is finished on a spawned
//! task so parked work is never lost.

use std::sync::Arc;

use beacon_core::{AuthorizationEngine, ConnectionId, Principal, UserKey};
use futures::{StreamExt, stream};

use crate::{
    HubConfig,
    error::CoordinatorError,
    gateway::BroadcastGroupGateway,
    refresh_gate::{Pending, RefreshGate, RefreshTicket},
    registry::ConnectionRegistry,
    report::{MembershipOp, MembershipReport, RefreshOutcome},
};

/// Applies authorization results to gateway membership.
///
/// Clones share the registry, the gateway and the per-user gate.
#[derive(Clone)]
pub struct MembershipCoordinator {
    engine: AuthorizationEngine,
    registry: Arc<ConnectionRegistry>,
    gateway: Arc<dyn BroadcastGroupGateway>,
    gate: Arc<RefreshGate>,
    max_concurrent_ops: usize,
}

impl MembershipCoordinator {
    /// Create a coordinator over a shared registry and gateway.
    pub fn new(
        engine: AuthorizationEngine,
        registry: Arc<ConnectionRegistry>,
        gateway: Arc<dyn BroadcastGroupGateway>,
    ) -> Self {
        Self {
            engine,
            registry,
            gateway,
            gate: Arc::default(),
            max_concurrent_ops: HubConfig::default().max_concurrent_gateway_ops,
        }
    }

    /// Bound the number of gateway calls in flight per operation.
    ///
    /// Values below one are treated as one.
    #[must_use]
    pub fn with_max_concurrent_ops(mut self, max: usize) -> Self {
        self.max_concurrent_ops = max.max(1);
        self
    }

    /// Authorization engine.
    pub fn engine(&self) -> &AuthorizationEngine {
        &self.engine
    }

    /// Connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Join a new connection to every channel the principal is authorized
    /// for. Never issues leaves.
    ///
    /// # Errors
    ///
    /// - `CoordinatorError::UnresolvedPrincipal` if the principal has no user key
    /// - `CoordinatorError::Engine` if authorization fails
    pub async fn assign_initial(
        &self,
        principal: &Principal,
        connection: &ConnectionId,
    ) -> Result<MembershipReport, CoordinatorError> {
        let user = require_user(principal)?;
        let result = self.engine.authorize(principal).await?;

        let ops = result
            .authorized()
            .iter()
            .map(|channel| MembershipOp::Join {
                connection: connection.clone(),
                channel: channel.clone(),
            })
            .collect();

        let report = self.apply(user, 1, ops).await;

        tracing::debug!(
            %user,
            %connection,
            joined = report.joined().count(),
            failed = report.failures.len(),
            "initial membership assigned"
        );

        Ok(report)
    }

    /// Reconcile every live connection of the principal's user with a fresh
    /// authorization result.
    ///
    /// Returns `NoConnections` without authorizing when the user is offline,
    /// and `Coalesced` when membership work for the user is already running
    /// (that pass reruns with this principal before it releases the user).
    /// If authorization fails every membership of the user is revoked before
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// - `CoordinatorError::UnresolvedPrincipal` if the principal has no user key
    /// - `CoordinatorError::Engine` if authorization fails
    pub async fn refresh(&self, principal: &Principal) -> Result<RefreshOutcome, CoordinatorError> {
        let user = require_user(principal)?;

        if !self.registry.has_connections(user) {
            tracing::trace!(%user, "refresh skipped, user offline");
            return Ok(RefreshOutcome::NoConnections);
        }

        self.run(user, Pending::Refresh(principal.clone())).await
    }

    /// Leave every indexed channel on one connection without consulting
    /// authorizers.
    ///
    /// Not serialized with refreshes of the same user.
    pub async fn revoke_connection(
        &self,
        user: UserKey,
        connection: &ConnectionId,
    ) -> MembershipReport {
        let ops = self.leave_all(connection).collect();
        let report = self.apply(user, 1, ops).await;

        tracing::warn!(
            %user,
            %connection,
            left = report.left().count(),
            failed = report.failures.len(),
            "connection memberships revoked"
        );

        report
    }

    /// Leave every indexed channel on every live connection of a user.
    ///
    /// Serialized with refreshes of the same user: if one is running the
    /// revocation is parked and applied by it, and `Coalesced` is returned.
    ///
    /// # Errors
    ///
    /// - `CoordinatorError::Engine` if a refresh parked behind the revocation
    ///   fails to authorize
    pub async fn revoke_user(&self, user: UserKey) -> Result<RefreshOutcome, CoordinatorError> {
        if !self.registry.has_connections(user) {
            return Ok(RefreshOutcome::NoConnections);
        }

        self.run(user, Pending::Revoke).await
    }

    /// Run `work` for `user` under the gate, then every pass parked behind it.
    async fn run(&self, user: UserKey, work: Pending) -> Result<RefreshOutcome, CoordinatorError> {
        let Some(ticket) = self.gate.enter(user, &work) else {
            tracing::debug!(%user, "membership work coalesced into running pass");
            return Ok(RefreshOutcome::Coalesced);
        };

        let mut lease = Lease { coordinator: self.clone(), ticket, current: None };
        let mut work = work;
        let mut passes = 0usize;
        let result = loop {
            passes += 1;
            lease.current = Some(work.clone());
            let result = self.run_once(user, &work).await;
            match lease.ticket.next() {
                Some(next) => work = next,
                None => {
                    lease.current = None;
                    break result;
                },
            }
        };

        if let Ok(RefreshOutcome::Applied(report)) = &result {
            tracing::info!(
                %user,
                connections = report.connections,
                joined = report.joined().count(),
                left = report.left().count(),
                failed = report.failures.len(),
                passes,
                "memberships refreshed"
            );
        }

        result
    }

    async fn run_once(
        &self,
        user: UserKey,
        work: &Pending,
    ) -> Result<RefreshOutcome, CoordinatorError> {
        match work {
            Pending::Refresh(principal) => match self.refresh_once(user, principal).await {
                Ok(report) if report.connections == 0 => Ok(RefreshOutcome::NoConnections),
                Ok(report) => Ok(RefreshOutcome::Applied(report)),
                Err(err) => {
                    tracing::error!(%user, error = %err, "refresh failed, revoking memberships");
                    self.revoke_all(user).await;
                    Err(err)
                },
            },
            Pending::Revoke => Ok(RefreshOutcome::Revoked(self.revoke_all(user).await)),
        }
    }

    async fn revoke_all(&self, user: UserKey) -> MembershipReport {
        let connections = self.registry.connections(user);
        let ops = connections.iter().flat_map(|connection| self.leave_all(connection)).collect();
        let report = self.apply(user, connections.len(), ops).await;

        tracing::warn!(
            %user,
            connections = report.connections,
            left = report.left().count(),
            failed = report.failures.len(),
            "user memberships revoked"
        );

        report
    }

    async fn refresh_once(
        &self,
        user: UserKey,
        principal: &Principal,
    ) -> Result<MembershipReport, CoordinatorError> {
        let connections = self.registry.connections(user);
        if connections.is_empty() {
            return Ok(MembershipReport::new(user, 0));
        }

        let result = self.engine.authorize(principal).await?;

        let mut ops = Vec::with_capacity(connections.len() * self.engine.index().len());
        for connection in &connections {
            ops.extend(result.authorized().iter().map(|channel| MembershipOp::Join {
                connection: connection.clone(),
                channel: channel.clone(),
            }));
            ops.extend(result.unauthorized().iter().map(|channel| MembershipOp::Leave {
                connection: connection.clone(),
                channel: channel.clone(),
            }));
        }

        Ok(self.apply(user, connections.len(), ops).await)
    }

    fn leave_all<'a>(
        &'a self,
        connection: &'a ConnectionId,
    ) -> impl Iterator<Item = MembershipOp> + 'a {
        self.engine.index().channels().map(move |channel| MembershipOp::Leave {
            connection: connection.clone(),
            channel: channel.clone(),
        })
    }

    /// Issue `ops` concurrently. Failures are recorded, never propagated.
    async fn apply(
        &self,
        user: UserKey,
        connections: usize,
        ops: Vec<MembershipOp>,
    ) -> MembershipReport {
        let gateway = &self.gateway;

        let outcomes: Vec<_> = stream::iter(ops)
            .map(|op| async move {
                let outcome = match &op {
                    MembershipOp::Join { connection, channel } => {
                        gateway.join(connection, channel).await
                    },
                    MembershipOp::Leave { connection, channel } => {
                        gateway.leave(connection, channel).await
                    },
                };
                (op, outcome)
            })
            .buffer_unordered(self.max_concurrent_ops)
            .collect()
            .await;

        let mut report = MembershipReport::new(user, connections);
        for (op, outcome) in outcomes {
            match &outcome {
                Ok(()) => tracing::trace!(
                    %user,
                    connection = %op.connection(),
                    channel = %op.channel(),
                    join = op.is_join(),
                    "membership applied"
                ),
                Err(err) => tracing::warn!(
                    %user,
                    connection = %op.connection(),
                    channel = %op.channel(),
                    join = op.is_join(),
                    error = %err,
                    "gateway membership operation failed"
                ),
            }
            report.record(op, outcome);
        }
        report
    }
}

impl std::fmt::Debug for MembershipCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipCoordinator")
            .field("engine", &self.engine)
            .field("registry", &self.registry)
            .field("max_concurrent_ops", &self.max_concurrent_ops)
            .finish_non_exhaustive()
    }
}

/// Holds a user's gate while membership work runs.
///
/// Dropped before the gate is released, it resumes the parked work (or the
/// interrupted pass when nothing is parked) on a spawned task.
struct Lease {
    coordinator: MembershipCoordinator,
    ticket: RefreshTicket,
    current: Option<Pending>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        let Some(work) = self.ticket.abandon().or_else(|| self.current.take()) else {
            return;
        };
        let user = self.ticket.user();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(%user, "membership work interrupted, resuming in background");
                let coordinator = self.coordinator.clone();
                handle.spawn(async move {
                    if let Err(err) = coordinator.run(user, work).await {
                        tracing::error!(%user, error = %err, "resumed membership work failed");
                    }
                });
            },
            Err(_) => {
                tracing::error!(%user, "membership work interrupted outside a runtime, dropped");
            },
        }
    }
}

fn require_user(principal: &Principal) -> Result<UserKey, CoordinatorError> {
    principal.user_key().ok_or_else(|| {
        tracing::error!("membership requested for principal without user key");
        CoordinatorError::UnresolvedPrincipal
    })
}
