//! Server error types.
//!
//! Provides strongly-typed errors for server operations:
//! - Membership coordination (assignment, refresh)
//! - Event routing
//! - Connection lifecycle (connect, permission changes)

use std::fmt;

use beacon_core::{Channel, ConnectionId, EngineError, UserKey};

use crate::gateway::GatewayError;

/// Errors from [`MembershipCoordinator`](crate::MembershipCoordinator).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    /// The principal carries no user key.
    ///
    /// Callers must always supply a resolvable principal. Fatal - indicates
    /// a wiring bug in the caller.
    #[error("principal has no resolvable user key")]
    UnresolvedPrincipal,

    /// Authorization engine failed.
    ///
    /// Fatal - see `EngineError`.
    #[error("authorization failed: {0}")]
    Engine(#[from] EngineError),
}

/// Errors from [`EventRouter`](crate::EventRouter).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// No authorizer governs the event's channel.
    ///
    /// Events are only routed on indexed channels, so nobody could be
    /// authorized to receive this one.
    #[error("no authorizer governs channel {0}")]
    UnknownChannel(Channel),

    /// Gateway failed to publish.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

/// Failure of a [`PrincipalResolver`](crate::PrincipalResolver).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to resolve principal for user {user}: {reason}")]
pub struct ResolveError {
    /// User whose principal could not be rebuilt
    pub user: UserKey,
    /// Error message
    pub reason: String,
}

/// Errors from [`Hub`](crate::Hub) lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Connecting principal has no user key.
    ///
    /// The connection was not registered. The transport should close it.
    Unauthenticated(ConnectionId),

    /// Membership coordination failed.
    ///
    /// Wraps errors from `MembershipCoordinator`. Memberships of the affected
    /// connections were revoked before this was returned.
    Coordinator(CoordinatorError),

    /// Principal resolution failed.
    ///
    /// Memberships of the affected user were revoked before this was
    /// returned. Transient if the user store recovers - the next permission
    /// change restores them.
    Resolve(ResolveError),
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated(connection) => {
                write!(f, "connection {connection} has no authenticated user")
            },
            Self::Coordinator(err) => write!(f, "coordinator error: {err}"),
            Self::Resolve(err) => write!(f, "resolver error: {err}"),
        }
    }
}

impl std::error::Error for HubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unauthenticated(_) => None,
            Self::Coordinator(err) => Some(err),
            Self::Resolve(err) => Some(err),
        }
    }
}

impl From<CoordinatorError> for HubError {
    fn from(err: CoordinatorError) -> Self {
        Self::Coordinator(err)
    }
}

impl From<ResolveError> for HubError {
    fn from(err: ResolveError) -> Self {
        Self::Resolve(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_error_display() {
        let err = HubError::Unauthenticated(ConnectionId::new("conn-1"));
        assert_eq!(err.to_string(), "connection conn-1 has no authenticated user");

        let err = HubError::Coordinator(CoordinatorError::UnresolvedPrincipal);
        assert_eq!(err.to_string(), "coordinator error: principal has no resolvable user key");

        let err = HubError::from(ResolveError { user: UserKey(1), reason: "db down".to_string() });
        assert_eq!(
            err.to_string(),
            "resolver error: failed to resolve principal for user \
             00000000000000000000000000000001: db down"
        );
    }

    #[test]
    fn router_error_display() {
        let err = RouterError::UnknownChannel(Channel::from_static("backoffice:nowhere"));
        assert_eq!(err.to_string(), "no authorizer governs channel backoffice:nowhere");
    }
}
