//! Outcomes of membership operations.

use beacon_core::{Channel, ConnectionId, UserKey};

use crate::gateway::GatewayError;

/// A single gateway membership change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MembershipOp {
    /// Add the connection to the channel's group
    Join {
        /// Target connection
        connection: ConnectionId,
        /// Target channel
        channel: Channel,
    },
    /// Remove the connection from the channel's group
    Leave {
        /// Target connection
        connection: ConnectionId,
        /// Target channel
        channel: Channel,
    },
}

impl MembershipOp {
    /// Connection this operation targets.
    pub fn connection(&self) -> &ConnectionId {
        match self {
            Self::Join { connection, .. } | Self::Leave { connection, .. } => connection,
        }
    }

    /// Channel this operation targets.
    pub fn channel(&self) -> &Channel {
        match self {
            Self::Join { channel, .. } | Self::Leave { channel, .. } => channel,
        }
    }

    /// Whether this is a join.
    pub fn is_join(&self) -> bool {
        matches!(self, Self::Join { .. })
    }
}

/// A membership operation the gateway rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayFailure {
    /// Operation that failed
    pub op: MembershipOp,
    /// Gateway error
    pub error: GatewayError,
}

/// What a single assignment or refresh did to the gateway.
///
/// Failed operations do not abort the rest; they are collected here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipReport {
    /// User the operations were applied for
    pub user: Option<UserKey>,
    /// Connections covered
    pub connections: usize,
    /// Operations that succeeded
    pub applied: Vec<MembershipOp>,
    /// Operations that failed
    pub failures: Vec<GatewayFailure>,
}

impl MembershipReport {
    pub(crate) fn new(user: UserKey, connections: usize) -> Self {
        Self { user: Some(user), connections, ..Self::default() }
    }

    pub(crate) fn record(&mut self, op: MembershipOp, outcome: Result<(), GatewayError>) {
        match outcome {
            Ok(()) => self.applied.push(op),
            Err(error) => self.failures.push(GatewayFailure { op, error }),
        }
    }

    /// Successful joins.
    pub fn joined(&self) -> impl Iterator<Item = &MembershipOp> + '_ {
        self.applied.iter().filter(|op| op.is_join())
    }

    /// Successful leaves.
    pub fn left(&self) -> impl Iterator<Item = &MembershipOp> + '_ {
        self.applied.iter().filter(|op| !op.is_join())
    }

    /// Whether every operation succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of [`MembershipCoordinator::refresh`](crate::MembershipCoordinator::refresh).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// User has no live connections. No authorizer or gateway call was made.
    NoConnections,
    /// Membership work for this user was already running. The request was
    /// parked behind it and is applied before the user is released.
    Coalesced,
    /// Memberships were reconciled.
    Applied(MembershipReport),
    /// Every membership was revoked without consulting authorizers.
    Revoked(MembershipReport),
}

impl RefreshOutcome {
    /// The gateway report, if operations were issued.
    pub fn report(&self) -> Option<&MembershipReport> {
        match self {
            Self::Applied(report) | Self::Revoked(report) => Some(report),
            Self::NoConnections | Self::Coalesced => None,
        }
    }
}
